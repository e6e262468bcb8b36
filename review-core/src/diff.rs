//! Diff Normalizer (C2).
//!
//! Filters the raw per-file records from either forge down to the set that
//! should reach the LLM, per the unified keep-rule below.

use std::collections::HashSet;

use crate::git_providers::DiffItem;

/// Extensions always kept regardless of exclude-set membership.
const CODE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "jsx", "ts", "tsx", "go", "java", "kt", "kts", "c", "h", "cc", "cpp", "hpp",
    "cs", "rb", "php", "swift", "scala", "sh", "bash", "sql", "yaml", "yml", "json", "toml",
    "proto", "graphql", "vue", "lua", "pl", "ex", "exs", "erl", "hs", "clj", "dart", "m", "mm",
];

/// Extensions always dropped: images, archives, fonts, and other binary formats.
const EXCLUDE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "svg", "zip", "tar", "gz", "bz2", "7z",
    "rar", "jar", "war", "woff", "woff2", "ttf", "otf", "eot", "pdf", "exe", "dll", "so", "dylib",
    "class", "pyc", "o", "a", "lock",
];

/// Applies the Diff Normalizer's keep-rule to one item:
/// keep iff (extension ∈ code set) OR (not in exclude set AND patch is
/// non-empty AND UTF-8 decodable). `too_large`/`generated`/binary items are
/// always dropped first.
pub fn should_keep(item: &DiffItem) -> bool {
    if item.too_large || item.generated || item.is_binary {
        return false;
    }

    let ext = item.extension().map(|e| e.to_ascii_lowercase());
    let code_set: HashSet<&str> = CODE_EXTENSIONS.iter().copied().collect();
    let exclude_set: HashSet<&str> = EXCLUDE_EXTENSIONS.iter().copied().collect();

    if let Some(ext) = &ext {
        if code_set.contains(ext.as_str()) {
            return true;
        }
        if exclude_set.contains(ext.as_str()) {
            return false;
        }
    }

    !item.patch.is_empty() && std::str::from_utf8(item.patch.as_bytes()).is_ok()
}

/// Normalizes a changeset's file list down to the items that should reach
/// the LLM, preserving order.
pub fn normalize(items: Vec<DiffItem>) -> Vec<DiffItem> {
    items.into_iter().filter(should_keep).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git_providers::FileStatus;

    fn item(path: &str, patch: &str) -> DiffItem {
        DiffItem {
            old_path: Some(path.into()),
            new_path: Some(path.into()),
            status: FileStatus::Modified,
            patch: patch.into(),
            is_binary: false,
            too_large: false,
            generated: false,
            hunks: Vec::new(),
            annotated_diff: None,
            new_lines: std::collections::BTreeMap::new(),
            old_lines: std::collections::BTreeMap::new(),
        }
    }

    #[test]
    fn keeps_known_code_extension() {
        assert!(should_keep(&item("src/main.rs", "@@ -1 +1 @@\n-a\n+b\n")));
    }

    #[test]
    fn drops_known_binary_extension_even_with_patch_text() {
        assert!(!should_keep(&item("assets/logo.png", "GIT binary patch")));
    }

    #[test]
    fn drops_too_large() {
        let mut it = item("src/big.rs", "@@ -1 +1 @@\n-a\n+b\n");
        it.too_large = true;
        assert!(!should_keep(&it));
    }

    #[test]
    fn keeps_unknown_extension_with_nonempty_utf8_patch() {
        assert!(should_keep(&item("Makefile.inc", "@@ -1 +1 @@\n-a\n+b\n")));
    }

    #[test]
    fn drops_unknown_extension_with_empty_patch() {
        assert!(!should_keep(&item("Dockerfile.unknown_ext_xyz", "")));
    }
}
