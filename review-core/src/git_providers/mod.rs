//! Forge Client (C1): webhook signature verification plus provider facade.
//!
//! No async-trait, no dynamic trait objects. `ProviderClient` is a thin enum
//! with one concrete implementation per forge; dispatch is a plain match.

pub mod github;
pub mod gitlab;
pub mod types;

pub use types::*;

use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::errors::{AuthError, Error, Result};

/// Runtime configuration for any provider client.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// API base, e.g. "https://gitlab.com/api/v4" or "https://api.github.com".
    pub base_api: String,
    /// Access token for the provider (PAT or app token).
    pub token: String,
}

/// Where an inline comment anchors, independent of forge wire shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Provider-agnostic inline-comment position; each client maps this onto its
/// own wire shape (GitHub: `{commit_id, path, line, side}`; GitLab: a
/// `position` object carrying the three SHAs plus one of `new_line`/`old_line`).
#[derive(Debug, Clone)]
pub struct InlinePosition {
    pub new_path: Option<String>,
    pub old_path: Option<String>,
    pub line: u32,
    pub side: Side,
    pub diff_refs: DiffRefs,
}

/// Concrete provider client (enum-dispatch).
#[derive(Debug, Clone)]
pub enum ProviderClient {
    GitLab(gitlab::GitLabClient),
    GitHub(github::GitHubClient),
}

impl ProviderClient {
    /// Constructs a concrete client from generic config.
    pub fn from_config(cfg: ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("seele-review/0.1")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(match cfg.kind {
            ProviderKind::GitLab => {
                Self::GitLab(gitlab::GitLabClient::new(client, cfg.base_api, cfg.token))
            }
            ProviderKind::GitHub => {
                Self::GitHub(github::GitHubClient::new(client, cfg.base_api, cfg.token))
            }
        })
    }

    pub async fn fetch_meta(&self, id: &ChangeRequestId) -> Result<ChangeRequest> {
        match self {
            Self::GitLab(c) => c.get_meta(id).await,
            Self::GitHub(c) => c.get_meta(id).await,
        }
    }

    pub async fn fetch_changes(&self, id: &ChangeRequestId) -> Result<ChangeSet> {
        match self {
            Self::GitLab(c) => c.get_changeset(id).await,
            Self::GitHub(c) => c.get_changeset(id).await,
        }
    }

    pub async fn post_inline_comment(
        &self,
        id: &ChangeRequestId,
        position: &InlinePosition,
        body: &str,
    ) -> Result<()> {
        match self {
            Self::GitLab(c) => c.post_inline_comment(id, position, body).await,
            Self::GitHub(c) => c.post_inline_comment(id, position, body).await,
        }
    }

    pub async fn post_general_comment(&self, id: &ChangeRequestId, body: &str) -> Result<()> {
        match self {
            Self::GitLab(c) => c.post_general_comment(id, body).await,
            Self::GitHub(c) => c.post_general_comment(id, body).await,
        }
    }

    /// Lists `(comment_id, body)` pairs already posted on this MR/PR, used
    /// by the Publisher to locate the idempotency marker before posting.
    pub async fn list_comments(&self, id: &ChangeRequestId) -> Result<Vec<(String, String)>> {
        match self {
            Self::GitLab(c) => c.list_comments(id).await,
            Self::GitHub(c) => c.list_comments(id).await,
        }
    }

    /// Updates an existing general comment in place.
    pub async fn update_general_comment(
        &self,
        id: &ChangeRequestId,
        comment_id: &str,
        body: &str,
    ) -> Result<()> {
        match self {
            Self::GitLab(c) => c.update_general_comment(id, comment_id, body).await,
            Self::GitHub(c) => c.update_general_comment(id, comment_id, body).await,
        }
    }

    /// Updates an existing inline (per-line) comment in place.
    pub async fn update_inline_comment(
        &self,
        id: &ChangeRequestId,
        comment_id: &str,
        body: &str,
    ) -> Result<()> {
        match self {
            Self::GitLab(c) => c.update_inline_comment(id, comment_id, body).await,
            Self::GitHub(c) => c.update_inline_comment(id, comment_id, body).await,
        }
    }
}

/// Verifies a GitHub-style webhook: HMAC-SHA256 of the raw body under the
/// configured secret, compared against the `sha256=<hex>` signature header
/// using constant-time equality. An unconfigured secret fails closed.
pub fn verify_github_signature(
    secret: &str,
    body: &[u8],
    signature_header: Option<&str>,
) -> Result<()> {
    if secret.is_empty() {
        warn!("github webhook secret is not configured; rejecting");
        return Err(Error::Auth(AuthError::SecretNotConfigured));
    }
    let header = signature_header.ok_or(AuthError::MissingSignature)?;
    let hex_sig = header
        .strip_prefix("sha256=")
        .ok_or(AuthError::BadSignature)?;
    let expected = hex::decode(hex_sig).map_err(|_| AuthError::BadSignature)?;

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::BadSignature)?;
    mac.update(body);
    let computed = mac.finalize().into_bytes();

    if computed.as_slice().ct_eq(&expected).unwrap_u8() == 1 {
        Ok(())
    } else {
        Err(Error::Auth(AuthError::BadSignature))
    }
}

/// Verifies a GitLab-style webhook: the configured secret compared against
/// the plaintext `X-Gitlab-Token` header using constant-time equality. An
/// unconfigured secret fails closed.
pub fn verify_gitlab_token(secret: &str, token_header: Option<&str>) -> Result<()> {
    if secret.is_empty() {
        warn!("gitlab webhook secret is not configured; rejecting");
        return Err(Error::Auth(AuthError::SecretNotConfigured));
    }
    let token = token_header.ok_or(AuthError::MissingToken)?;
    if token.as_bytes().ct_eq(secret.as_bytes()).unwrap_u8() == 1 {
        Ok(())
    } else {
        Err(Error::Auth(AuthError::BadToken))
    }
}
