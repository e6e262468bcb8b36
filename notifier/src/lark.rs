//! Lark (Feishu) custom-bot webhook payload, adapted from the project's
//! original `lark.py` notifier: an interactive card rather than plain text,
//! with a colored header and a handful of fields.

use serde_json::{json, Value};

use crate::{Outcome, ReviewContext};

pub(crate) fn payload(ctx: &ReviewContext<'_>, outcome: &Outcome<'_>) -> Value {
    let (template, title, body) = match outcome {
        Outcome::Reviewed { finding_count } => (
            "green",
            "Review complete".to_string(),
            format!("{} finding(s)", finding_count),
        ),
        Outcome::Failed { error_message } => (
            "red",
            "Review failed".to_string(),
            error_message.to_string(),
        ),
    };

    json!({
        "msg_type": "interactive",
        "card": {
            "header": {
                "title": { "tag": "plain_text", "content": title },
                "template": template,
            },
            "elements": [
                {
                    "tag": "div",
                    "text": {
                        "tag": "lark_md",
                        "content": format!(
                            "**Project:** {}\n**Branch:** {} → {}\n**Title:** {}\n**Result:** {}",
                            ctx.project, ctx.source_branch, ctx.target_branch, ctx.title, body
                        )
                    }
                },
                {
                    "tag": "action",
                    "actions": [
                        {
                            "tag": "button",
                            "text": { "tag": "plain_text", "content": "Open" },
                            "url": ctx.web_url,
                            "type": "default"
                        }
                    ]
                }
            ]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ReviewContext<'static> {
        ReviewContext {
            forge: "github",
            project: "org/repo",
            source_branch: "feature",
            target_branch: "main",
            title: "Add widget",
            web_url: "https://github.com/org/repo/pull/1",
        }
    }

    #[test]
    fn review_card_uses_green_template() {
        let v = payload(&ctx(), &Outcome::Reviewed { finding_count: 4 });
        assert_eq!(v["msg_type"], "interactive");
        assert_eq!(v["card"]["header"]["template"], "green");
        let content = v["card"]["elements"][0]["text"]["content"].as_str().unwrap();
        assert!(content.contains("4 finding"));
    }

    #[test]
    fn error_card_uses_red_template_and_includes_message() {
        let v = payload(&ctx(), &Outcome::Failed { error_message: "rate limited" });
        assert_eq!(v["card"]["header"]["template"], "red");
        let content = v["card"]["elements"][0]["text"]["content"].as_str().unwrap();
        assert!(content.contains("rate limited"));
    }
}
