//! Slack incoming-webhook payload, adapted from the project's original
//! `slack.py` notifier: a single plain-text message, no blocks or
//! attachments.

use serde_json::{json, Value};

use crate::{Outcome, ReviewContext};

pub(crate) fn payload(ctx: &ReviewContext<'_>, outcome: &Outcome<'_>) -> Value {
    json!({ "text": message(ctx, outcome) })
}

fn message(ctx: &ReviewContext<'_>, outcome: &Outcome<'_>) -> String {
    match outcome {
        Outcome::Reviewed { finding_count } => format!(
            "✅ Review complete for *{}* ({} → {}) on {}: \"{}\" — {} finding(s)\n{}",
            ctx.project, ctx.source_branch, ctx.target_branch, ctx.forge, ctx.title, finding_count, ctx.web_url
        ),
        Outcome::Failed { error_message } => format!(
            "❌ Review failed for *{}* ({} → {}) on {}: \"{}\"\n{}\n{}",
            ctx.project, ctx.source_branch, ctx.target_branch, ctx.forge, ctx.title, error_message, ctx.web_url
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ReviewContext<'static> {
        ReviewContext {
            forge: "gitlab",
            project: "group/proj",
            source_branch: "feature",
            target_branch: "main",
            title: "Add widget",
            web_url: "https://gitlab.example.com/group/proj/-/merge_requests/1",
        }
    }

    #[test]
    fn review_payload_is_plain_text() {
        let v = payload(&ctx(), &Outcome::Reviewed { finding_count: 2 });
        let text = v["text"].as_str().unwrap();
        assert!(text.contains("2 finding"));
        assert!(text.contains("group/proj"));
        assert_eq!(v.as_object().unwrap().len(), 1);
    }

    #[test]
    fn error_payload_includes_message() {
        let v = payload(&ctx(), &Outcome::Failed { error_message: "timeout" });
        assert!(v["text"].as_str().unwrap().contains("timeout"));
    }
}
