//! Provider-agnostic data model for change requests (MR/PR) and diffs.
//!
//! This is the normalized output of the Forge Client (C1); the Diff
//! Normalizer (C2) and Patch Extender (C3) operate on it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two supported hosted-forge flavors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    GitLab,
    GitHub,
}

/// A unique reference to a change request inside a provider.
///
/// * `project` — GitLab: numeric ID or "group/project"; GitHub: "owner/repo".
/// * `iid` — GitLab MR IID or GitHub PR number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRequestId {
    pub project: String,
    pub iid: u64,
}

/// Triple of SHAs used to bind inline comments reliably.
///
/// GitLab exposes base/start/head; GitHub exposes only head (the PR's
/// latest commit), so `start_sha` stays `None` there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffRefs {
    pub base_sha: String,
    pub start_sha: Option<String>,
    pub head_sha: String,
}

/// Minimal author info about the human who created the MR/PR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorInfo {
    pub id: String,
    pub username: Option<String>,
    pub name: Option<String>,
    pub web_url: Option<String>,
}

/// High-level metadata for a change request (title, state, URLs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub provider: ProviderKind,
    pub id: ChangeRequestId,
    pub title: String,
    pub description: Option<String>,
    pub author: AuthorInfo,
    pub state: String,
    pub web_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub source_branch: Option<String>,
    pub target_branch: Option<String>,
    pub diff_refs: DiffRefs,
    /// `work_in_progress` (GitLab) / `draft` (GitHub) flag.
    pub draft: bool,
}

/// One changed line inside a diff hunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DiffLine {
    Added { new_line: u32, content: String },
    Removed { old_line: u32, content: String },
    Context { old_line: u32, new_line: u32, content: String },
}

/// A diff hunk (continuous block of changes), parsed from a single
/// `@@ -o,ol +n,nl @@` header plus its lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffHunk {
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
    pub lines: Vec<DiffLine>,
}

/// Per-file change status, derived from explicit provider flags.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

/// Per-file change record as delivered by the forge, before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffItem {
    pub old_path: Option<String>,
    pub new_path: Option<String>,
    pub status: FileStatus,
    /// Raw unified-diff patch text for this file (empty for pure renames).
    pub patch: String,
    pub is_binary: bool,
    pub too_large: bool,
    pub generated: bool,
    /// Parsed hunks; populated once the patch has been run through the parser.
    pub hunks: Vec<DiffHunk>,
    /// Filled in by the Patch Extender (C3).
    pub annotated_diff: Option<String>,
    /// New-file line number -> raw line content. Filled in by the Patch Extender.
    #[serde(default)]
    pub new_lines: BTreeMap<u32, String>,
    /// Old-file line number -> raw line content. Filled in by the Patch Extender.
    #[serde(default)]
    pub old_lines: BTreeMap<u32, String>,
}

impl DiffItem {
    pub fn path(&self) -> &str {
        self.new_path
            .as_deref()
            .or(self.old_path.as_deref())
            .unwrap_or("")
    }

    pub fn extension(&self) -> Option<&str> {
        self.path().rsplit('.').next().filter(|e| *e != self.path())
    }
}

/// The full set of changes for a MR/PR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSet {
    pub files: Vec<DiffItem>,
    /// True if the provider truncated diffs due to size/limits.
    pub is_truncated: bool,
}
