//! GitLab forge client, adapted from the project's original GitLab MR
//! reviewer against the trimmed `review-core` data model.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::{Error, ProviderError, Result};
use crate::parser::{looks_like_binary_patch, parse_unified_diff};

use super::{ChangeRequest, ChangeRequestId, ChangeSet, DiffItem, DiffRefs, FileStatus};
use super::{AuthorInfo, InlinePosition, ProviderKind, Side};

#[derive(Debug, Clone)]
pub struct GitLabClient {
    http: reqwest::Client,
    base_api: String,
    token: String,
}

impl GitLabClient {
    pub fn new(http: reqwest::Client, base_api: String, token: String) -> Self {
        Self {
            http,
            base_api: base_api.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn project_path(&self, project: &str) -> String {
        urlencoding::encode(project).into_owned()
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        vec![("PRIVATE-TOKEN", self.token.clone())]
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let mut req = self.http.get(url);
        for (k, v) in self.headers() {
            req = req.header(k, v);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Provider(map_status(status.as_u16())));
        }
        Ok(resp.json::<T>().await?)
    }

    pub async fn get_meta(&self, id: &ChangeRequestId) -> Result<ChangeRequest> {
        let url = format!(
            "{}/projects/{}/merge_requests/{}",
            self.base_api,
            self.project_path(&id.project),
            id.iid
        );
        let mr: GitLabMr = self.get_json(&url).await?;
        Ok(ChangeRequest {
            provider: ProviderKind::GitLab,
            id: id.clone(),
            title: mr.title,
            description: mr.description,
            author: AuthorInfo {
                id: mr.author.id.to_string(),
                username: Some(mr.author.username),
                name: Some(mr.author.name),
                web_url: Some(mr.author.web_url),
            },
            state: mr.state,
            web_url: mr.web_url,
            created_at: mr.created_at,
            updated_at: mr.updated_at,
            source_branch: Some(mr.source_branch),
            target_branch: Some(mr.target_branch),
            diff_refs: DiffRefs {
                base_sha: mr.diff_refs.base_sha,
                start_sha: Some(mr.diff_refs.start_sha),
                head_sha: mr.diff_refs.head_sha,
            },
            draft: mr.work_in_progress || mr.draft.unwrap_or(false),
        })
    }

    pub async fn get_changeset(&self, id: &ChangeRequestId) -> Result<ChangeSet> {
        let url = format!(
            "{}/projects/{}/merge_requests/{}/diffs?per_page=100",
            self.base_api,
            self.project_path(&id.project),
            id.iid
        );
        let files: Vec<GitLabMrDiffFile> = self.get_json(&url).await?;

        let mut is_truncated = false;
        let mut out = Vec::with_capacity(files.len());
        for f in files {
            let too_large = f.too_large.unwrap_or(false);
            let generated = f.generated_file.unwrap_or(false);
            if too_large {
                is_truncated = true;
            }
            let patch = f.diff.clone().unwrap_or_default();
            let is_binary = looks_like_binary_patch(&patch);
            let hunks = if is_binary || patch.is_empty() {
                Vec::new()
            } else {
                parse_unified_diff(&patch).unwrap_or_default()
            };
            let status = if f.new_file {
                FileStatus::Added
            } else if f.deleted_file {
                FileStatus::Deleted
            } else if f.renamed_file {
                FileStatus::Renamed
            } else {
                FileStatus::Modified
            };
            out.push(DiffItem {
                old_path: f.old_path,
                new_path: f.new_path,
                status,
                patch,
                is_binary,
                too_large,
                generated,
                hunks,
                annotated_diff: None,
                new_lines: std::collections::BTreeMap::new(),
                old_lines: std::collections::BTreeMap::new(),
            });
        }

        Ok(ChangeSet {
            files: out,
            is_truncated,
        })
    }

    pub async fn post_inline_comment(
        &self,
        id: &ChangeRequestId,
        position: &InlinePosition,
        body: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/projects/{}/merge_requests/{}/discussions",
            self.base_api,
            self.project_path(&id.project),
            id.iid
        );

        let mut pos = serde_json::json!({
            "position_type": "text",
            "base_sha": position.diff_refs.base_sha,
            "head_sha": position.diff_refs.head_sha,
            "start_sha": position.diff_refs.start_sha.clone().unwrap_or_default(),
        });
        let obj = pos.as_object_mut().expect("position object");
        match position.side {
            Side::Right => {
                obj.insert(
                    "new_path".into(),
                    serde_json::Value::String(position.new_path.clone().unwrap_or_default()),
                );
                obj.insert("new_line".into(), serde_json::Value::from(position.line));
                if let Some(old) = &position.old_path {
                    obj.insert("old_path".into(), serde_json::Value::String(old.clone()));
                }
            }
            Side::Left => {
                obj.insert(
                    "old_path".into(),
                    serde_json::Value::String(position.old_path.clone().unwrap_or_default()),
                );
                obj.insert("old_line".into(), serde_json::Value::from(position.line));
                if let Some(new) = &position.new_path {
                    obj.insert("new_path".into(), serde_json::Value::String(new.clone()));
                }
            }
        }

        let payload = serde_json::json!({ "body": body, "position": pos });

        let mut req = self.http.post(&url).json(&payload);
        for (k, v) in self.headers() {
            req = req.header(k, v);
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(Error::Provider(map_status(resp.status().as_u16())));
        }
        Ok(())
    }

    pub async fn post_general_comment(&self, id: &ChangeRequestId, body: &str) -> Result<()> {
        let url = format!(
            "{}/projects/{}/merge_requests/{}/notes",
            self.base_api,
            self.project_path(&id.project),
            id.iid
        );
        let mut req = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "body": body }));
        for (k, v) in self.headers() {
            req = req.header(k, v);
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(Error::Provider(map_status(resp.status().as_u16())));
        }
        Ok(())
    }

    pub async fn list_comments(&self, id: &ChangeRequestId) -> Result<Vec<(String, String)>> {
        let project = self.project_path(&id.project);

        let discussions_url = format!(
            "{}/projects/{}/merge_requests/{}/discussions?per_page=100",
            self.base_api, project, id.iid
        );
        let discussions: Vec<GitLabDiscussion> = self.get_json(&discussions_url).await?;
        let mut out: Vec<(String, String)> = discussions
            .into_iter()
            .flat_map(|d| d.notes)
            .map(|n| (n.id.to_string(), n.body))
            .collect();

        let notes_url = format!(
            "{}/projects/{}/merge_requests/{}/notes?per_page=100",
            self.base_api, project, id.iid
        );
        let notes: Vec<GitLabNote> = self.get_json(&notes_url).await?;
        out.extend(notes.into_iter().map(|n| (n.id.to_string(), n.body)));

        Ok(out)
    }

    pub async fn update_general_comment(
        &self,
        id: &ChangeRequestId,
        comment_id: &str,
        body: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/projects/{}/merge_requests/{}/notes/{}",
            self.base_api,
            self.project_path(&id.project),
            id.iid,
            comment_id
        );
        let mut req = self
            .http
            .put(&url)
            .json(&serde_json::json!({ "body": body }));
        for (k, v) in self.headers() {
            req = req.header(k, v);
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(Error::Provider(map_status(resp.status().as_u16())));
        }
        Ok(())
    }

    /// Inline discussion notes share the same note-id namespace as general
    /// notes, so updating one in place uses the same `/notes/{id}` endpoint.
    pub async fn update_inline_comment(
        &self,
        id: &ChangeRequestId,
        comment_id: &str,
        body: &str,
    ) -> Result<()> {
        self.update_general_comment(id, comment_id, body).await
    }
}

fn map_status(code: u16) -> ProviderError {
    match code {
        401 => ProviderError::Unauthorized,
        403 => ProviderError::Forbidden,
        404 => ProviderError::NotFound,
        429 => ProviderError::RateLimited {
            retry_after_secs: None,
        },
        500..=599 => ProviderError::Server(code),
        _ => ProviderError::HttpStatus(code),
    }
}

#[derive(Debug, Deserialize)]
struct GitLabUser {
    id: u64,
    username: String,
    name: String,
    web_url: String,
}

#[derive(Debug, Deserialize)]
struct GitLabDiffRefs {
    base_sha: String,
    head_sha: String,
    start_sha: String,
}

#[derive(Debug, Deserialize)]
struct GitLabMr {
    title: String,
    description: Option<String>,
    web_url: String,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    source_branch: String,
    target_branch: String,
    work_in_progress: bool,
    #[serde(default)]
    draft: Option<bool>,
    diff_refs: GitLabDiffRefs,
    author: GitLabUser,
}

#[derive(Debug, Deserialize)]
struct GitLabMrDiffFile {
    old_path: Option<String>,
    new_path: Option<String>,
    new_file: bool,
    renamed_file: bool,
    deleted_file: bool,
    too_large: Option<bool>,
    generated_file: Option<bool>,
    diff: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitLabDiscussion {
    notes: Vec<GitLabNote>,
}

#[derive(Debug, Deserialize)]
struct GitLabNote {
    id: u64,
    body: String,
}
