//! `ReviewItem`: one LLM finding, plus tolerant ingestion from the model's
//! YAML output (camelCase or snake_case field names, per C4's field
//! aliasing rule).

use serde::{Deserialize, Serialize};

/// Which file a finding's line numbers reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewType {
    New,
    Old,
}

impl Default for ReviewType {
    fn default() -> Self {
        ReviewType::New
    }
}

/// A single finding from the LLM, anchored to a file and line range.
///
/// Identity key for dedup during merge is `(new_path, start_line, end_line, type)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewItem {
    pub new_path: Option<String>,
    pub old_path: Option<String>,
    #[serde(default)]
    pub r#type: ReviewType,
    pub start_line: u32,
    pub end_line: u32,
    pub issue_header: String,
    pub issue_content: String,
}

/// Raw shape straight off the model's YAML, tolerant of both naming
/// conventions the original Python prompt examples taught the model to use.
#[derive(Debug, Deserialize)]
struct RawReviewItem {
    #[serde(alias = "newPath")]
    new_path: Option<String>,
    #[serde(alias = "oldPath")]
    old_path: Option<String>,
    #[serde(default, alias = "kind")]
    r#type: Option<String>,
    #[serde(alias = "startLine", alias = "line_number", default)]
    start_line: Option<u32>,
    #[serde(alias = "endLine", default)]
    end_line: Option<u32>,
    #[serde(alias = "issueHeader", default)]
    issue_header: Option<String>,
    #[serde(alias = "issueContent", default)]
    issue_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawReviewsDoc {
    reviews: Vec<RawReviewItem>,
}

/// Parses `{reviews: [...]}` YAML text into normalized `ReviewItem`s.
///
/// Each item is normalized per C6: newlines stripped from `new_path`,
/// `old_path`, `type`; missing `type` defaults to `new`; missing
/// `start_line`/`end_line` fall back to each other so a single-line finding
/// only needs one of them.
pub fn parse_reviews_yaml(yaml: &str) -> Result<Vec<ReviewItem>, serde_yaml::Error> {
    let doc: RawReviewsDoc = serde_yaml::from_str(yaml)?;
    Ok(doc.reviews.into_iter().map(normalize).collect())
}

fn strip_newlines(s: Option<String>) -> Option<String> {
    s.map(|s| s.replace(['\n', '\r'], ""))
}

fn normalize(raw: RawReviewItem) -> ReviewItem {
    let start_line = raw.start_line.or(raw.end_line).unwrap_or(1);
    let end_line = raw.end_line.or(raw.start_line).unwrap_or(start_line);
    let r#type = match raw.r#type.as_deref().map(str::trim) {
        Some(t) if t.eq_ignore_ascii_case("old") => ReviewType::Old,
        _ => ReviewType::New,
    };
    ReviewItem {
        new_path: strip_newlines(raw.new_path),
        old_path: strip_newlines(raw.old_path),
        r#type,
        start_line,
        end_line,
        issue_header: raw.issue_header.unwrap_or_default(),
        issue_content: raw.issue_content.unwrap_or_default(),
    }
}

impl ReviewItem {
    /// Identity key used for merge-time dedup: `(new_path, start_line, end_line, type)`.
    pub fn identity_key(&self) -> (String, u32, u32, ReviewType) {
        (
            self.new_path.clone().unwrap_or_default(),
            self.start_line,
            self.end_line,
            self.r#type,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_fields() {
        let yaml = r#"
reviews:
  - newPath: "src/lib.rs"
    oldPath: "src/lib.rs"
    type: new
    startLine: 10
    endLine: 12
    issueHeader: "unwrap in hot path"
    issueContent: "consider propagating the error instead"
"#;
        let items = parse_reviews_yaml(yaml).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].new_path.as_deref(), Some("src/lib.rs"));
        assert_eq!(items[0].start_line, 10);
        assert_eq!(items[0].end_line, 12);
    }

    #[test]
    fn parses_snake_case_fields() {
        let yaml = r#"
reviews:
  - new_path: "src/lib.rs"
    start_line: 5
    end_line: 5
    issue_header: "h"
    issue_content: "c"
"#;
        let items = parse_reviews_yaml(yaml).unwrap();
        assert_eq!(items[0].start_line, 5);
        assert_eq!(items[0].r#type, ReviewType::New);
    }

    #[test]
    fn strips_newlines_and_defaults_type() {
        let yaml = "reviews:\n  - newPath: \"src/a.rs\\n\"\n    startLine: 1\n    endLine: 1\n    issueHeader: h\n    issueContent: c\n";
        let items = parse_reviews_yaml(yaml).unwrap();
        assert_eq!(items[0].new_path.as_deref(), Some("src/a.rs"));
        assert_eq!(items[0].r#type, ReviewType::New);
    }
}
