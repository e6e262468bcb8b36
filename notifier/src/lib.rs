//! Notifier (C8): best-effort delivery of a short status message to a chat
//! platform after a review run finishes. Grounded on the project's original
//! `slack.py`/`lark.py` notifiers — plain-text for Slack, an interactive
//! card for Lark. A failed notification is logged and swallowed; it must
//! never fail the review pipeline itself.

mod lark;
mod slack;

use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Which chat platform (if any) to notify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifyPlatform {
    #[default]
    None,
    Slack,
    Lark,
}

impl NotifyPlatform {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "slack" => Self::Slack,
            "lark" | "feishu" => Self::Lark,
            _ => Self::None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub platform: NotifyPlatform,
    pub webhook_url: Option<String>,
}

/// Identifying details of the change request a notification describes.
/// Kept independent of `review-core`'s `ChangeRequest` so this crate has no
/// knowledge of either forge's wire format.
#[derive(Debug, Clone)]
pub struct ReviewContext<'a> {
    pub forge: &'a str,
    pub project: &'a str,
    pub source_branch: &'a str,
    pub target_branch: &'a str,
    pub title: &'a str,
    pub web_url: &'a str,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("http status {0}")]
    HttpStatus(u16),
}

pub struct Notifier {
    http: reqwest::Client,
    config: NotifyConfig,
}

impl Notifier {
    pub fn new(config: NotifyConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client builder with only a timeout cannot fail");
        Self { http, config }
    }

    /// Sends a success notification naming how many findings were posted.
    /// `push_url` overrides the configured destination for this call only,
    /// per the webhook's own per-request push-url contract; falls back to
    /// the configured `webhook_url` when absent. Never returns an error to
    /// the caller's orchestration path; failures are logged and absorbed
    /// here.
    pub async fn send_review_notification(
        &self,
        ctx: &ReviewContext<'_>,
        finding_count: usize,
        push_url: Option<&str>,
    ) {
        if let Err(e) = self
            .dispatch(ctx, Outcome::Reviewed { finding_count }, push_url)
            .await
        {
            warn!(error = %e, platform = ?self.config.platform, "notification delivery failed");
        }
    }

    /// Sends a failure notification carrying the error message the pipeline
    /// aborted with. See [`Self::send_review_notification`] for `push_url`.
    pub async fn send_error_notification(
        &self,
        ctx: &ReviewContext<'_>,
        error_message: &str,
        push_url: Option<&str>,
    ) {
        if let Err(e) = self
            .dispatch(ctx, Outcome::Failed { error_message }, push_url)
            .await
        {
            warn!(error = %e, platform = ?self.config.platform, "notification delivery failed");
        }
    }

    async fn dispatch(
        &self,
        ctx: &ReviewContext<'_>,
        outcome: Outcome<'_>,
        push_url: Option<&str>,
    ) -> Result<(), NotifyError> {
        let Some(url) = push_url.or(self.config.webhook_url.as_deref()) else {
            return Ok(());
        };

        let payload = match self.config.platform {
            NotifyPlatform::None => return Ok(()),
            NotifyPlatform::Slack => slack::payload(ctx, &outcome),
            NotifyPlatform::Lark => lark::payload(ctx, &outcome),
        };

        let resp = self.http.post(url).json(&payload).send().await?;
        if !resp.status().is_success() {
            return Err(NotifyError::HttpStatus(resp.status().as_u16()));
        }
        Ok(())
    }
}

/// What happened, shared between the two platform renderers.
pub(crate) enum Outcome<'a> {
    Reviewed { finding_count: usize },
    Failed { error_message: &'a str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_platform_names_case_insensitively() {
        assert_eq!(NotifyPlatform::parse("Slack"), NotifyPlatform::Slack);
        assert_eq!(NotifyPlatform::parse("LARK"), NotifyPlatform::Lark);
        assert_eq!(NotifyPlatform::parse("feishu"), NotifyPlatform::Lark);
        assert_eq!(NotifyPlatform::parse("nonsense"), NotifyPlatform::None);
        assert_eq!(NotifyPlatform::parse(""), NotifyPlatform::None);
    }

    #[tokio::test]
    async fn none_platform_never_sends() {
        let notifier = Notifier::new(NotifyConfig {
            platform: NotifyPlatform::None,
            webhook_url: Some("http://127.0.0.1:1/unreachable".into()),
        });
        let ctx = ReviewContext {
            forge: "gitlab",
            project: "group/proj",
            source_branch: "feature",
            target_branch: "main",
            title: "Add widget",
            web_url: "https://gitlab.example.com/group/proj/-/merge_requests/1",
        };
        // Should resolve immediately without attempting the unreachable URL.
        notifier.send_review_notification(&ctx, 3, None).await;
    }

    #[tokio::test]
    async fn missing_webhook_url_is_a_noop() {
        let notifier = Notifier::new(NotifyConfig {
            platform: NotifyPlatform::Slack,
            webhook_url: None,
        });
        let ctx = ReviewContext {
            forge: "github",
            project: "org/repo",
            source_branch: "feature",
            target_branch: "main",
            title: "Add widget",
            web_url: "https://github.com/org/repo/pull/1",
        };
        notifier.send_error_notification(&ctx, "llm timed out", None).await;
    }

    #[tokio::test]
    async fn push_url_override_takes_precedence_over_configured_url() {
        let notifier = Notifier::new(NotifyConfig {
            platform: NotifyPlatform::None,
            webhook_url: Some("http://127.0.0.1:1/unreachable".into()),
        });
        let ctx = ReviewContext {
            forge: "github",
            project: "org/repo",
            source_branch: "feature",
            target_branch: "main",
            title: "Add widget",
            web_url: "https://github.com/org/repo/pull/1",
        };
        // None platform short-circuits before the override URL is ever dialed.
        notifier
            .send_review_notification(&ctx, 1, Some("http://127.0.0.1:1/override"))
            .await;
    }
}
