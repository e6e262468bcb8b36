//! Webhook Envelope (C9): per-forge handlers verify, filter, and dispatch
//! into the shared pipeline. Each handler is a thin shell; all the review
//! logic lives in [`crate::pipeline`].

pub mod github;
pub mod gitlab;

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use review_core::git_providers::{ChangeRequestId, ProviderKind};
use review_core::publish::PublishMode;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Per-request mode override, from `?mode=` (GitHub) or `X-Ai-Mode` (GitLab).
/// Defaults to comment mode per §4.9.
pub fn parse_mode(raw: Option<&str>) -> PublishMode {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        Some("report") => PublishMode::Report,
        _ => PublishMode::Comment,
    }
}

/// A draft/WIP change request is never reviewed, per invariant 10.
pub fn is_draft(draft_flag: bool, title: &str) -> bool {
    if draft_flag {
        return true;
    }
    let lower = title.trim().to_ascii_lowercase();
    lower.starts_with("wip") || lower.starts_with("draft")
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub findings: Option<usize>,
}

impl WebhookResponse {
    fn skipped(reason: &'static str) -> Self {
        Self {
            ok: true,
            skipped: Some(reason),
            findings: None,
        }
    }

    fn reviewed(findings: usize) -> Self {
        Self {
            ok: true,
            skipped: None,
            findings: Some(findings),
        }
    }
}

/// Per-request overrides carried by either webhook's query/headers: a
/// notifier destination and, for GitLab, a forge token. Both are optional
/// and fall back to the configured defaults when absent.
#[derive(Debug, Clone, Default)]
pub struct RequestOverrides {
    pub push_url: Option<String>,
    pub api_token: Option<String>,
}

/// Shared tail of both handlers once the webhook has been verified,
/// schema-validated, and filtered down to an in-scope change request.
pub async fn dispatch(
    state: &Arc<AppState>,
    kind: ProviderKind,
    id: ChangeRequestId,
    mode: PublishMode,
    overrides: RequestOverrides,
) -> AppResult<WebhookResponse> {
    let outcome = crate::pipeline::run_review(
        state,
        kind,
        id,
        mode,
        state.config.review_language,
        overrides.api_token.as_deref(),
    )
    .await?;

    let ctx = notifier::ReviewContext {
        forge: match kind {
            ProviderKind::GitHub => "github",
            ProviderKind::GitLab => "gitlab",
        },
        project: &outcome.cr.id.project,
        source_branch: outcome.cr.source_branch.as_deref().unwrap_or(""),
        target_branch: outcome.cr.target_branch.as_deref().unwrap_or(""),
        title: &outcome.cr.title,
        web_url: &outcome.cr.web_url,
    };
    state
        .notifier
        .send_review_notification(&ctx, outcome.finding_count, overrides.push_url.as_deref())
        .await;

    info!(
        project = %outcome.cr.id.project,
        finding_count = outcome.finding_count,
        posted = outcome.summary.posted,
        "webhook dispatch complete"
    );

    Ok(WebhookResponse::reviewed(outcome.finding_count))
}

pub fn skip(reason: &'static str) -> WebhookResponse {
    WebhookResponse::skipped(reason)
}

pub fn bad_request(message: impl Into<String>) -> AppError {
    AppError::BadRequest(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mode_is_comment() {
        assert_eq!(parse_mode(None), PublishMode::Comment);
        assert_eq!(parse_mode(Some("bogus")), PublishMode::Comment);
    }

    #[test]
    fn report_mode_is_case_insensitive() {
        assert_eq!(parse_mode(Some("Report")), PublishMode::Report);
    }

    #[test]
    fn draft_flag_alone_is_draft() {
        assert!(is_draft(true, "Add feature"));
    }

    #[test]
    fn wip_title_prefix_is_draft_case_insensitively() {
        assert!(is_draft(false, "WIP: add feature"));
        assert!(is_draft(false, "draft: add feature"));
        assert!(!is_draft(false, "Add feature"));
    }

    #[test]
    fn default_overrides_are_absent() {
        let overrides = RequestOverrides::default();
        assert!(overrides.push_url.is_none());
        assert!(overrides.api_token.is_none());
    }
}
