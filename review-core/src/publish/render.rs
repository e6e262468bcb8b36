//! Markdown/HTML rendering for the two publish modes, grounded on the
//! original Python publishers' templates.

use std::fmt::Write as _;

use crate::git_providers::{ChangeRequest, DiffItem, ProviderKind};
use crate::review_item::{ReviewItem, ReviewType};

use super::marker::{build_marker, build_marker_for_item};

const CONTEXT_LINES: u32 = 3;

/// Renders one inline comment body: a small header/content table plus the
/// idempotency marker keyed to this finding's identity.
pub fn render_comment_body(item: &ReviewItem) -> String {
    let marker = build_marker_for_item(item);
    format!(
        "| {} | {} |\n|---|---|\n\n{}",
        item.issue_header, item.issue_content, marker
    )
}

/// Renders the single report-mode document: one HTML table with a row per
/// finding, each carrying a deep link pinned to the diff's stable
/// `head_sha` (never a branch ref, which can move) and a collapsible diff
/// snippet with `CONTEXT_LINES` of padding on either side.
pub fn render_report(cr: &ChangeRequest, items: &[DiffItem], reviews: &[ReviewItem]) -> String {
    let mut out = String::new();
    out.push_str("<table>\n<tr><th>Issue</th><th>Location</th><th>Description</th></tr>\n");

    for review in reviews {
        let link = code_location_link(cr, review);
        let snippet = find_diff_item(items, review)
            .map(|item| diff_snippet(item, review))
            .unwrap_or_default();
        let _ = write!(
            out,
            "<tr><td>{}</td><td><a href=\"{}\">{}</a></td><td>{}{}</td></tr>\n",
            review.issue_header,
            link,
            review.new_path.as_deref().or(review.old_path.as_deref()).unwrap_or(""),
            review.issue_content,
            snippet
        );
    }

    out.push_str("</table>\n\n");
    out.push_str(&build_marker("report"));
    out
}

fn find_diff_item<'a>(items: &'a [DiffItem], review: &ReviewItem) -> Option<&'a DiffItem> {
    let path = match review.r#type {
        ReviewType::New => review.new_path.as_deref(),
        ReviewType::Old => review.old_path.as_deref(),
    }?;
    items.iter().find(|it| it.path() == path)
}

/// Deep-link to the forge's blob view, pinned at `head_sha` per the
/// decision to prefer the stable diff ref over a moving branch name.
fn code_location_link(cr: &ChangeRequest, review: &ReviewItem) -> String {
    let path = review
        .new_path
        .as_deref()
        .or(review.old_path.as_deref())
        .unwrap_or("");
    let sha = &cr.diff_refs.head_sha;
    match cr.provider {
        ProviderKind::GitLab => format!(
            "{}/-/blob/{}/{}?ref_type=heads#L{}-{}",
            cr.web_url.trim_end_matches('/'),
            sha,
            path,
            review.start_line,
            review.end_line
        ),
        ProviderKind::GitHub => format!(
            "{}/blob/{}/{}#L{}-L{}",
            cr.web_url.trim_end_matches('/'),
            sha,
            path,
            review.start_line,
            review.end_line
        ),
    }
}

/// Reconstructs a collapsible diff snippet with `CONTEXT_LINES` of padding
/// before `start_line` and after `end_line`, walking the line maps the
/// Patch Extender filled in.
fn diff_snippet(item: &DiffItem, review: &ReviewItem) -> String {
    let lines = match review.r#type {
        ReviewType::New => &item.new_lines,
        ReviewType::Old => &item.old_lines,
    };
    if lines.is_empty() {
        return String::new();
    }

    let lo = review.start_line.saturating_sub(CONTEXT_LINES).max(1);
    let hi = review.end_line + CONTEXT_LINES;

    let mut body = String::new();
    for (line_no, content) in lines.range(lo..=hi) {
        let _ = writeln!(body, "{line_no}: {content}");
    }
    if body.is_empty() {
        return String::new();
    }

    format!("\n<details><summary>diff</summary>\n\n```\n{body}```\n</details>\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git_providers::{AuthorInfo, ChangeRequestId, DiffRefs, FileStatus};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn make_cr(provider: ProviderKind) -> ChangeRequest {
        ChangeRequest {
            provider,
            id: ChangeRequestId {
                project: "acme/widgets".into(),
                iid: 7,
            },
            title: "fix bug".into(),
            description: None,
            author: AuthorInfo {
                id: "1".into(),
                username: None,
                name: None,
                web_url: None,
            },
            state: "opened".into(),
            web_url: "https://git.example.com/acme/widgets".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            source_branch: Some("feature".into()),
            target_branch: Some("main".into()),
            diff_refs: DiffRefs {
                base_sha: "base".into(),
                start_sha: Some("start".into()),
                head_sha: "deadbeef".into(),
            },
            draft: false,
        }
    }

    fn review() -> ReviewItem {
        ReviewItem {
            new_path: Some("src/a.rs".into()),
            old_path: Some("src/a.rs".into()),
            r#type: ReviewType::New,
            start_line: 10,
            end_line: 10,
            issue_header: "possible panic".into(),
            issue_content: "unwrap on untrusted input".into(),
        }
    }

    #[test]
    fn comment_body_contains_marker_and_table() {
        let body = render_comment_body(&review());
        assert!(body.contains("possible panic"));
        assert!(body.contains("powered by seele-review"));
    }

    #[test]
    fn gitlab_link_uses_head_sha_not_branch() {
        let cr = make_cr(ProviderKind::GitLab);
        let link = code_location_link(&cr, &review());
        assert!(link.contains("/-/blob/deadbeef/"));
        assert!(!link.contains("feature"));
        assert!(!link.contains("main"));
    }

    #[test]
    fn github_link_uses_head_sha() {
        let cr = make_cr(ProviderKind::GitHub);
        let link = code_location_link(&cr, &review());
        assert!(link.contains("/blob/deadbeef/"));
    }

    #[test]
    fn report_contains_single_marker() {
        let cr = make_cr(ProviderKind::GitHub);
        let mut item = DiffItem {
            old_path: Some("src/a.rs".into()),
            new_path: Some("src/a.rs".into()),
            status: FileStatus::Modified,
            patch: String::new(),
            is_binary: false,
            too_large: false,
            generated: false,
            hunks: Vec::new(),
            annotated_diff: None,
            new_lines: BTreeMap::new(),
            old_lines: BTreeMap::new(),
        };
        for i in 5..=15 {
            item.new_lines.insert(i, format!("line {i}"));
        }
        let report = render_report(&cr, &[item], &[review()]);
        assert_eq!(report.matches("powered by seele-review").count(), 1);
        assert!(report.contains("<details><summary>diff</summary>"));
    }
}
