//! Token Budgeter (C4): counting, splitting along file boundaries, and
//! merging per-chunk review lists with dedup.

use tracing::warn;

use crate::review_item::ReviewItem;

/// Tokens reserved for the `\n\n` separator the original splitter counted
/// between packed files.
const SEPARATOR_TOKENS: usize = 2;

/// Token-window overlap used when a single file alone exceeds the budget.
const CHUNK_OVERLAP_TOKENS: usize = 200;

/// Fraction of the configured budget actually usable, leaving a safety
/// margin against pessimistic encoder overhead the original splitter never
/// accounted for.
const SAFETY_MARGIN: f64 = 0.95;

/// Model-aware token counter; falls back to a 4-chars-per-token estimate
/// for models tiktoken doesn't recognize.
pub struct TokenCounter {
    bpe: Option<tiktoken_rs::CoreBPE>,
}

impl TokenCounter {
    pub fn for_model(model: &str) -> Self {
        let bpe = tiktoken_rs::get_bpe_from_model(model).ok();
        Self { bpe }
    }

    pub fn count(&self, text: &str) -> usize {
        match &self.bpe {
            Some(bpe) => bpe.encode_with_special_tokens(text).len(),
            None => estimate_tokens(text),
        }
    }

    fn encode(&self, text: &str) -> Option<Vec<usize>> {
        self.bpe
            .as_ref()
            .map(|bpe| bpe.encode_with_special_tokens(text))
    }

    fn decode(&self, tokens: &[usize]) -> Option<String> {
        self.bpe.as_ref().and_then(|bpe| bpe.decode(tokens.to_vec()).ok())
    }
}

fn estimate_tokens(text: &str) -> usize {
    (text.len() as f64 / 4.0).ceil() as usize
}

/// One prompt-sized piece of the extended diff plus its parsed result.
pub struct ChunkResult {
    pub chunk_index: usize,
    pub text: String,
    pub token_count: usize,
    pub reviews: Result<Vec<ReviewItem>, String>,
}

/// Splits `extended_diff` into prompt-sized chunks, each carrying the
/// leading `commit message: …` header, per C4's splitting rules.
pub fn split_extended_diff(extended_diff: &str, budget: usize, counter: &TokenCounter) -> Vec<String> {
    let effective_budget = ((budget as f64) * SAFETY_MARGIN).floor() as usize;

    if counter.count(extended_diff) <= effective_budget {
        return vec![extended_diff.to_string()];
    }

    let (header, blocks) = split_header_and_file_blocks(extended_diff);
    let header_tokens = counter.count(&header);

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_tokens = header_tokens;

    let flush = |current: &mut String, current_tokens: &mut usize, chunks: &mut Vec<String>, header: &str, header_tokens: usize| {
        if !current.is_empty() {
            chunks.push(format!("{header}{current}"));
        }
        current.clear();
        *current_tokens = header_tokens;
    };

    for block in blocks {
        let block_tokens = counter.count(&block);

        if header_tokens + block_tokens > effective_budget {
            flush(&mut current, &mut current_tokens, &mut chunks, &header, header_tokens);
            warn!(
                tokens = block_tokens,
                budget = effective_budget,
                "single file exceeds token budget, sub-splitting by token window"
            );
            for sub in sub_split_oversized_block(&block, effective_budget.saturating_sub(header_tokens), counter) {
                chunks.push(format!("{header}{sub}"));
            }
            continue;
        }

        if current_tokens + block_tokens + SEPARATOR_TOKENS > effective_budget {
            flush(&mut current, &mut current_tokens, &mut chunks, &header, header_tokens);
        }

        current.push_str(&block);
        current_tokens += block_tokens + SEPARATOR_TOKENS;
    }

    flush(&mut current, &mut current_tokens, &mut chunks, &header, header_tokens);

    if chunks.is_empty() {
        chunks.push(header);
    }
    chunks
}

/// Splits the assembled extended diff into its leading commit-message
/// header and a list of complete `## new_path: …` file blocks.
fn split_header_and_file_blocks(extended_diff: &str) -> (String, Vec<String>) {
    let marker = "## new_path:";
    match extended_diff.find(marker) {
        None => (extended_diff.to_string(), Vec::new()),
        Some(idx) => {
            let header = extended_diff[..idx].to_string();
            let rest = &extended_diff[idx..];
            let mut blocks = Vec::new();
            let mut start = 0;
            let positions: Vec<usize> = rest.match_indices(marker).map(|(i, _)| i).collect();
            for (n, &pos) in positions.iter().enumerate() {
                if n == 0 {
                    start = pos;
                    continue;
                }
                blocks.push(rest[start..pos].to_string());
                start = pos;
            }
            blocks.push(rest[start..].to_string());
            (header, blocks)
        }
    }
}

/// Sub-splits one oversized file block into raw token windows with overlap,
/// so a hunk is never cut exactly in half without any shared context.
fn sub_split_oversized_block(block: &str, budget: usize, counter: &TokenCounter) -> Vec<String> {
    let budget = budget.max(CHUNK_OVERLAP_TOKENS + 1);
    let Some(tokens) = counter.encode(block) else {
        // No BPE available: fall back to a byte-based window split.
        return sub_split_by_bytes(block, budget * 4, CHUNK_OVERLAP_TOKENS * 4);
    };

    if tokens.len() <= budget {
        return vec![block.to_string()];
    }

    let mut out = Vec::new();
    let step = budget.saturating_sub(CHUNK_OVERLAP_TOKENS).max(1);
    let mut pos = 0;
    while pos < tokens.len() {
        let end = (pos + budget).min(tokens.len());
        let window = &tokens[pos..end];
        if let Some(text) = counter.decode(window) {
            out.push(text);
        }
        if end == tokens.len() {
            break;
        }
        pos += step;
    }
    out
}

fn sub_split_by_bytes(text: &str, window: usize, overlap: usize) -> Vec<String> {
    let bytes = text.as_bytes();
    if bytes.len() <= window {
        return vec![text.to_string()];
    }
    let step = window.saturating_sub(overlap).max(1);
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let end = (pos + window).min(bytes.len());
        // Clamp to a char boundary so we never split inside a UTF-8 sequence.
        let mut end = end;
        while end > pos && !text.is_char_boundary(end) {
            end -= 1;
        }
        out.push(text[pos..end].to_string());
        if end == bytes.len() {
            break;
        }
        pos += step;
    }
    out
}

/// Merges per-chunk review lists, deduping by identity key and appending
/// duplicate content with a `---` separator (skipped if already a substring).
pub fn merge_reviews(results: &[ChunkResult]) -> Vec<ReviewItem> {
    let mut merged: Vec<ReviewItem> = Vec::new();

    for result in results {
        let Ok(reviews) = &result.reviews else {
            continue;
        };
        for item in reviews {
            let key = item.identity_key();
            if let Some(existing) = merged.iter_mut().find(|e| e.identity_key() == key) {
                if !existing.issue_content.contains(&item.issue_content) {
                    existing.issue_content.push_str("\n---\n");
                    existing.issue_content.push_str(&item.issue_content);
                }
            } else {
                merged.push(item.clone());
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review_item::ReviewType;

    fn item(path: &str, start: u32, end: u32, content: &str) -> ReviewItem {
        ReviewItem {
            new_path: Some(path.to_string()),
            old_path: Some(path.to_string()),
            r#type: ReviewType::New,
            start_line: start,
            end_line: end,
            issue_header: "h".into(),
            issue_content: content.into(),
        }
    }

    #[test]
    fn small_diff_is_a_single_chunk() {
        let counter = TokenCounter::for_model("gpt-4o");
        let diff = "commit message: fix bug\n## new_path: a.rs\n## old_path: a.rs\n@@ -1,1 +1,1 @@\n(1,1) -x\n(1,1) +y\n";
        let chunks = split_extended_diff(diff, 6000, &counter);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn splits_many_files_across_chunks_preserving_header() {
        let counter = TokenCounter::for_model("gpt-4o");
        let mut diff = String::from("commit message: big change\n");
        for i in 0..50 {
            diff.push_str(&format!(
                "## new_path: file{i}.rs\n## old_path: file{i}.rs\n@@ -1,1 +1,1 @@\n(1,1) -old line {i}\n(1,1) +new line number {i} with some extra padding text to inflate tokens\n"
            ));
        }
        let chunks = split_extended_diff(&diff, 200, &counter);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.starts_with("commit message: big change\n"));
        }
    }

    #[test]
    fn merge_dedups_by_identity_key_and_appends_content() {
        let results = vec![
            ChunkResult {
                chunk_index: 0,
                text: String::new(),
                token_count: 0,
                reviews: Ok(vec![item("foo.py", 42, 42, "first finding")]),
            },
            ChunkResult {
                chunk_index: 1,
                text: String::new(),
                token_count: 0,
                reviews: Ok(vec![item("foo.py", 42, 42, "second finding")]),
            },
        ];
        let merged = merge_reviews(&results);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].issue_content.contains("first finding"));
        assert!(merged[0].issue_content.contains("second finding"));
        assert!(merged[0].issue_content.contains("---"));
    }

    #[test]
    fn merge_skips_failed_chunks() {
        let results = vec![ChunkResult {
            chunk_index: 0,
            text: String::new(),
            token_count: 0,
            reviews: Err("no yaml block".into()),
        }];
        assert!(merge_reviews(&results).is_empty());
    }
}
