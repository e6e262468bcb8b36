//! Unified diff parsing and patch extension (C3).
//!
//! Parsing is adapted from the project's original extended unified-diff
//! parser (robust to missing `---`/`+++` file headers, tolerant of `\ No
//! newline at end of file` markers). Annotation (per-line numbering and
//! assembly into the model-facing extended diff) is new: the original
//! codebase never annotated diffs for an LLM, it built a symbol index.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::git_providers::{ChangeRequest, DiffHunk, DiffItem, DiffLine};

/// Parses a unified diff string into hunks. Robust to missing file headers;
/// only `@@` headers are required to locate hunk boundaries.
pub fn parse_unified_diff(s: &str) -> Option<Vec<DiffHunk>> {
    let mut hunks = Vec::new();
    let mut cur_old_start = 1u32;
    let mut cur_old_lines = 0u32;
    let mut cur_new_start = 1u32;
    let mut cur_new_lines = 0u32;
    let mut lines_buf: Vec<DiffLine> = Vec::new();
    let mut old_no = 1u32;
    let mut new_no = 1u32;
    let mut in_hunk = false;

    for line in s.lines() {
        if let Some(header) = line.strip_prefix("@@") {
            if in_hunk {
                hunks.push(DiffHunk {
                    old_start: cur_old_start,
                    old_lines: cur_old_lines,
                    new_start: cur_new_start,
                    new_lines: cur_new_lines,
                    lines: std::mem::take(&mut lines_buf),
                });
            }
            let header = header.trim_end_matches('@').trim();
            if let Some((left, right)) = header.split_once('+') {
                let (o_start, o_len) = split_hunk_range(left.trim().trim_start_matches('-'));
                let (n_start, n_len) = split_hunk_range(right.trim());
                cur_old_start = o_start;
                cur_old_lines = o_len;
                cur_new_start = n_start;
                cur_new_lines = n_len;
                old_no = o_start;
                new_no = n_start;
                in_hunk = true;
            }
            continue;
        }

        if line.starts_with("\\ ") {
            continue;
        }
        if !in_hunk {
            continue;
        }

        if let Some(rest) = line.strip_prefix('+') {
            lines_buf.push(DiffLine::Added {
                new_line: new_no,
                content: rest.to_string(),
            });
            new_no += 1;
        } else if let Some(rest) = line.strip_prefix('-') {
            lines_buf.push(DiffLine::Removed {
                old_line: old_no,
                content: rest.to_string(),
            });
            old_no += 1;
        } else {
            let rest = line.strip_prefix(' ').unwrap_or(line);
            lines_buf.push(DiffLine::Context {
                old_line: old_no,
                new_line: new_no,
                content: rest.to_string(),
            });
            old_no += 1;
            new_no += 1;
        }
    }

    if in_hunk {
        hunks.push(DiffHunk {
            old_start: cur_old_start,
            old_lines: cur_old_lines,
            new_start: cur_new_start,
            new_lines: cur_new_lines,
            lines: lines_buf,
        });
    }

    if hunks.is_empty() { None } else { Some(hunks) }
}

fn split_hunk_range(s: &str) -> (u32, u32) {
    let s = s.trim();
    if let Some((a, b)) = s.split_once(',') {
        (a.parse().unwrap_or(1), b.parse().unwrap_or(0))
    } else {
        (s.parse().unwrap_or(1), 1)
    }
}

/// Heuristic for detecting binary patches the forge didn't flag explicitly.
pub fn looks_like_binary_patch(s: &str) -> bool {
    s.contains("GIT binary patch")
        || s.starts_with("Binary files ")
        || (s.starts_with("Files ") && s.contains(" differ"))
}

/// Annotates a single item's hunks with `(old_no, new_no)` prefixes, padded
/// to a common width per hunk, and fills in `new_lines`/`old_lines`.
///
/// Returns `None` when the item has no hunks (nothing to annotate).
pub fn annotate_item(item: &DiffItem) -> Option<(String, BTreeMap<u32, String>, BTreeMap<u32, String>)> {
    if item.hunks.is_empty() {
        return None;
    }

    let mut new_lines = BTreeMap::new();
    let mut old_lines = BTreeMap::new();
    let mut out = String::new();

    for hunk in &item.hunks {
        let width = hunk_prefix_width(hunk);
        writeln!(
            out,
            "@@ -{},{} +{},{} @@",
            hunk.old_start, hunk.old_lines, hunk.new_start, hunk.new_lines
        )
        .ok();

        for line in &hunk.lines {
            match line {
                DiffLine::Removed { old_line, content } => {
                    writeln!(out, "({old_line:>width$},{:width$}) -{content}", "").ok();
                    old_lines.insert(*old_line, content.clone());
                }
                DiffLine::Added { new_line, content } => {
                    writeln!(out, "({:width$},{new_line:>width$}) +{content}", "").ok();
                    new_lines.insert(*new_line, content.clone());
                }
                DiffLine::Context {
                    old_line,
                    new_line,
                    content,
                } => {
                    writeln!(out, "({old_line:>width$},{new_line:>width$})  {content}").ok();
                    old_lines.insert(*old_line, content.clone());
                    new_lines.insert(*new_line, content.clone());
                }
            }
        }
    }

    Some((out, new_lines, old_lines))
}

fn hunk_prefix_width(hunk: &DiffHunk) -> usize {
    let max_line = hunk
        .lines
        .iter()
        .map(|l| match l {
            DiffLine::Added { new_line, .. } => *new_line,
            DiffLine::Removed { old_line, .. } => *old_line,
            DiffLine::Context {
                old_line, new_line, ..
            } => (*old_line).max(*new_line),
        })
        .max()
        .unwrap_or(1);
    max_line.to_string().len()
}

/// Extends every item of a changeset in place, writing `annotated_diff`,
/// `new_lines`, and `old_lines`. Items without hunks (pure renames, empty
/// patches) are left untouched.
pub fn extend_changeset(items: &mut [DiffItem]) {
    for item in items.iter_mut() {
        if let Some((annotated, new_lines, old_lines)) = annotate_item(item) {
            item.annotated_diff = Some(annotated);
            item.new_lines = new_lines;
            item.old_lines = old_lines;
        }
    }
}

/// Assembles the full model-facing extended diff: a one-line commit-message
/// header, then per file a two-line `## new_path: …` / `## old_path: …`
/// header followed by its annotated diff. Items with no annotated diff
/// (nothing survived extension) are omitted.
pub fn build_extended_diff(cr: &ChangeRequest, items: &[DiffItem]) -> String {
    let mut out = String::new();
    writeln!(out, "commit message: {}", cr.title).ok();

    for item in items {
        let Some(annotated) = &item.annotated_diff else {
            continue;
        };
        if annotated.trim().is_empty() {
            continue;
        }
        writeln!(out, "## new_path: {}", item.new_path.as_deref().unwrap_or("")).ok();
        writeln!(out, "## old_path: {}", item.old_path.as_deref().unwrap_or("")).ok();
        out.push_str(annotated);
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "@@ -10,3 +10,4 @@\n context one\n-removed line\n+added line\n+another added\n context two\n";

    #[test]
    fn parses_single_hunk_line_numbers() {
        let hunks = parse_unified_diff(SAMPLE).expect("hunks");
        assert_eq!(hunks.len(), 1);
        let h = &hunks[0];
        assert_eq!(h.old_start, 10);
        assert_eq!(h.new_start, 10);
        assert_eq!(h.lines.len(), 5);
        match &h.lines[1] {
            DiffLine::Removed { old_line, content } => {
                assert_eq!(*old_line, 11);
                assert_eq!(content, "removed line");
            }
            other => panic!("unexpected: {other:?}"),
        }
        match &h.lines[2] {
            DiffLine::Added { new_line, content } => {
                assert_eq!(*new_line, 11);
                assert_eq!(content, "added line");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn missing_header_defaults_to_one() {
        let hunks = parse_unified_diff("@@ -1 +1 @@\n-a\n+b\n").expect("hunks");
        assert_eq!(hunks[0].old_start, 1);
        assert_eq!(hunks[0].new_start, 1);
    }

    #[test]
    fn detects_binary_markers() {
        assert!(looks_like_binary_patch("GIT binary patch\n..."));
        assert!(looks_like_binary_patch("Binary files a/x.png and b/x.png differ"));
        assert!(!looks_like_binary_patch("@@ -1 +1 @@\n-a\n+b\n"));
    }

    #[test]
    fn annotation_fills_line_maps() {
        let mut item = DiffItem {
            old_path: Some("a.rs".into()),
            new_path: Some("a.rs".into()),
            status: crate::git_providers::FileStatus::Modified,
            patch: SAMPLE.into(),
            is_binary: false,
            too_large: false,
            generated: false,
            hunks: parse_unified_diff(SAMPLE).unwrap(),
            annotated_diff: None,
            new_lines: BTreeMap::new(),
            old_lines: BTreeMap::new(),
        };
        let (annotated, new_lines, old_lines) = annotate_item(&item).unwrap();
        assert!(annotated.contains("@@ -10,3 +10,4 @@"));
        assert_eq!(new_lines.get(&11).unwrap(), "added line");
        assert_eq!(old_lines.get(&11).unwrap(), "removed line");
        item.annotated_diff = Some(annotated);
        assert!(item.annotated_diff.is_some());
    }
}
