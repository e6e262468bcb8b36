//! Agent (C6), non-transport half: YAML block extraction, the repair pass,
//! and item normalization. The streaming chat-completion call itself lives
//! in the `llm-client` crate; this module only consumes the accumulated
//! response text.

use regex::Regex;

use crate::errors::{Error, ParseError, Result};
use crate::review_item::{parse_reviews_yaml, ReviewItem};

/// Outcome of parsing one chunk's model response.
pub struct AgentOutcome {
    pub reviews: Vec<ReviewItem>,
    pub fix_applied: bool,
}

/// Extracts the first fenced ` ```yaml … ``` ` block from a model response.
pub fn extract_yaml_block(response: &str) -> Option<&str> {
    let start_fence = response.find("```yaml")?;
    let body_start = start_fence + "```yaml".len();
    let rest = &response[body_start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim_matches('\n'))
}

/// Parses the model response end-to-end: extract the YAML block, parse it,
/// and on failure run the best-effort repair pass once before giving up.
pub fn parse_agent_response(response: &str) -> Result<AgentOutcome> {
    let block = extract_yaml_block(response).ok_or(ParseError::NoYamlBlock)?;

    match parse_reviews_yaml(block) {
        Ok(reviews) => Ok(AgentOutcome {
            reviews,
            fix_applied: false,
        }),
        Err(first_err) => {
            let repaired = repair_yaml(block);
            match parse_reviews_yaml(&repaired) {
                Ok(reviews) => Ok(AgentOutcome {
                    reviews,
                    fix_applied: true,
                }),
                Err(_) => Err(Error::Parse(ParseError::InvalidYaml(first_err.to_string()))),
            }
        }
    }
}

/// Best-effort reformatter for common shapes the model drifts into:
/// a list item whose leading `-` is glued to the key (`-newPath:`),
/// numeric fields quoted as strings (`startLine: "10"`), and free-text
/// fields (`issueHeader`, `issueContent`, `oldPath`...) that contain stray
/// colons or newlines that break the surrounding mapping.
fn repair_yaml(raw: &str) -> String {
    let missing_space = Regex::new(r"(?m)^(\s*)-([A-Za-z])").expect("valid regex");
    let mut out = missing_space.replace_all(raw, "$1- $2").into_owned();

    let quoted_number = Regex::new(
        r#"(?m)^(\s*(?:startLine|endLine|start_line|end_line)\s*:\s*)"(\d+)""#,
    )
    .expect("valid regex");
    out = quoted_number.replace_all(&out, "$1$2").into_owned();

    rebuild_review_items(&out)
}

const BLOCK_SCALAR_FIELDS: &[&str] = &["newPath", "oldPath", "type", "issueHeader", "issueContent"];
const NUMERIC_FIELDS: &[&str] = &["startLine", "endLine"];

/// Walks each review item line by line and rewrites it onto a fixed
/// skeleton: the item marker becomes `- newPath: |`, known string fields
/// become block scalars (`field: |`) with their value carried on
/// following lines, numeric fields are assigned directly, and anything
/// else is indentation-normalized. This lets a value with an embedded
/// colon or line break live under its field instead of corrupting the
/// mapping it sits in.
fn rebuild_review_items(yaml_content: &str) -> String {
    let lines: Vec<&str> = yaml_content.split('\n').collect();
    let mut fixed_lines: Vec<String> = Vec::with_capacity(lines.len());
    let mut in_review_item = false;

    let is_item_marker = |s: &str| s.starts_with("- newPath:") || s.starts_with("-newPath:");

    for (i, &line) in lines.iter().enumerate() {
        let trimmed = line.trim();

        let fixed_line = if is_item_marker(trimmed) {
            in_review_item = true;
            "  - newPath: |".to_string()
        } else if in_review_item {
            let rewritten = if let Some(colon_index) = trimmed.find(':') {
                let field_name = trimmed[..colon_index].trim();
                let field_value = trimmed[colon_index + 1..].trim();

                if BLOCK_SCALAR_FIELDS.contains(&field_name) {
                    format!("    {field_name}: |")
                } else if NUMERIC_FIELDS.contains(&field_name) {
                    format!("    {field_name}: {field_value}")
                } else {
                    format!("    {trimmed}")
                }
            } else if !trimmed.is_empty() {
                format!("      {trimmed}")
            } else {
                line.to_string()
            };

            if lines.get(i + 1).is_some_and(|next| is_item_marker(next.trim())) {
                in_review_item = false;
            }

            rewritten
        } else {
            line.to_string()
        };

        fixed_lines.push(fixed_line);
    }

    fixed_lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_yaml_block() {
        let response = "some preamble\n```yaml\nreviews: []\n```\ntrailing text";
        assert_eq!(extract_yaml_block(response), Some("reviews: []"));
    }

    #[test]
    fn no_block_returns_none() {
        assert_eq!(extract_yaml_block("no fenced block here"), None);
    }

    #[test]
    fn repairs_missing_space_after_dash() {
        let raw = "reviews:\n  -newPath:\n   a.rs\n   startLine: 1\n   endLine: 1\n   issueHeader: h\n   issueContent: c\n";
        let response = format!("```yaml\n{raw}```");
        let outcome = parse_agent_response(&response).expect("should repair and parse");
        assert!(outcome.fix_applied);
        assert_eq!(outcome.reviews.len(), 1);
        assert_eq!(outcome.reviews[0].new_path.as_deref(), Some("a.rs"));
    }

    #[test]
    fn rebuilds_under_indented_continuation_lines_onto_block_scalars() {
        let raw = "reviews:\n- newPath:\n  src/main.rs\n  oldPath:\n  src/main.rs\n  startLine: 10\n  endLine: 12\n  type:\n  modification\n  issueHeader:\n  off-by-one bound\n  issueContent:\n  loop should stop one earlier\n";
        let response = format!("```yaml\n{raw}```");
        let outcome = parse_agent_response(&response).expect("should repair and parse");
        assert!(outcome.fix_applied);
        assert_eq!(outcome.reviews.len(), 1);
        assert_eq!(outcome.reviews[0].new_path.as_deref(), Some("src/main.rs"));
        assert_eq!(outcome.reviews[0].start_line, 10);
    }

    #[test]
    fn recovers_from_embedded_colon_that_breaks_direct_parsing() {
        let raw = "reviews:\n  - newPath: a.rs\n    startLine: 3\n    endLine: 3\n    issueHeader: bad bound\n    issueContent: loop runs while i < len: should be i <= len\n";
        let response = format!("```yaml\n{raw}```");
        assert!(parse_reviews_yaml(raw).is_err(), "embedded colon should break direct parsing");
        let outcome = parse_agent_response(&response).expect("repair pass should recover a parseable document");
        assert!(outcome.fix_applied);
        assert_eq!(outcome.reviews.len(), 1);
    }

    #[test]
    fn well_formed_yaml_parses_without_repair() {
        let response = "```yaml\nreviews:\n  - newPath: a.rs\n    startLine: 1\n    endLine: 1\n    issueHeader: h\n    issueContent: c\n```";
        let outcome = parse_agent_response(response).unwrap();
        assert!(!outcome.fix_applied);
        assert_eq!(outcome.reviews.len(), 1);
    }

    #[test]
    fn missing_yaml_block_is_fatal_for_the_chunk() {
        let err = parse_agent_response("no yaml here at all").unwrap_err();
        matches!(err, Error::Parse(ParseError::NoYamlBlock));
    }
}
