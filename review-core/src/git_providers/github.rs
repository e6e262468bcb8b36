//! GitHub forge client.
//!
//! The project's own mr-reviewer left this provider unimplemented; built
//! fresh here against the GitHub REST API (`pulls`, `pulls/.../files`,
//! `pulls/.../comments`, `issues/.../comments`) using the same request
//! shapes the legacy Python publisher used against github.com.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::{Error, ProviderError, Result};
use crate::parser::{looks_like_binary_patch, parse_unified_diff};

use super::{ChangeRequest, ChangeRequestId, ChangeSet, DiffItem, DiffRefs, FileStatus};
use super::{AuthorInfo, InlinePosition, ProviderKind, Side};

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base_api: String,
    token: String,
}

impl GitHubClient {
    pub fn new(http: reqwest::Client, base_api: String, token: String) -> Self {
        Self {
            http,
            base_api: base_api.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Authorization", Self::auth_header(&self.token)),
            ("Accept", "application/vnd.github+json".to_string()),
            ("X-GitHub-Api-Version", "2022-11-28".to_string()),
        ]
    }

    /// Classic personal access tokens (`ghp_…`, `github_pat_…`) use the
    /// legacy `token` scheme; everything else (GitHub App installation
    /// tokens, fine-grained tokens without that prefix) uses `Bearer`.
    fn auth_header(token: &str) -> String {
        if token.starts_with("ghp_") || token.starts_with("github_pat_") {
            format!("token {token}")
        } else {
            format!("Bearer {token}")
        }
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

    async fn get_json_paged<T: for<'de> Deserialize<'de>>(&self, base_url: &str) -> Result<Vec<T>> {
        let mut out = Vec::new();
        let mut page = 1u32;
        loop {
            let url = format!(
                "{base_url}{sep}per_page=100&page={page}",
                sep = if base_url.contains('?') { "&" } else { "?" }
            );
            let batch: Vec<T> = self.get_json(&url).await?;
            let got = batch.len();
            out.extend(batch);
            if got < 100 {
                break;
            }
            page += 1;
        }
        Ok(out)
    }

    /// `owner/repo` -> (owner, repo).
    fn split_project(id: &ChangeRequestId) -> Result<(&str, &str)> {
        id.project
            .split_once('/')
            .ok_or_else(|| Error::Validation(format!("invalid github project id: {}", id.project)))
    }

    pub async fn get_meta(&self, id: &ChangeRequestId) -> Result<ChangeRequest> {
        let (owner, repo) = Self::split_project(id)?;
        let url = format!("{}/repos/{}/{}/pulls/{}", self.base_api, owner, repo, id.iid);
        let pr: GitHubPull = self.get_json(&url).await?;
        Ok(ChangeRequest {
            provider: ProviderKind::GitHub,
            id: id.clone(),
            title: pr.title,
            description: pr.body,
            author: AuthorInfo {
                id: pr.user.id.to_string(),
                username: Some(pr.user.login.clone()),
                name: Some(pr.user.login),
                web_url: pr.user.html_url,
            },
            state: pr.state,
            web_url: pr.html_url,
            created_at: pr.created_at,
            updated_at: pr.updated_at,
            source_branch: Some(pr.head.r#ref),
            target_branch: Some(pr.base.r#ref),
            diff_refs: DiffRefs {
                base_sha: pr.base.sha,
                start_sha: None,
                head_sha: pr.head.sha,
            },
            draft: pr.draft.unwrap_or(false),
        })
    }

    pub async fn get_changeset(&self, id: &ChangeRequestId) -> Result<ChangeSet> {
        let (owner, repo) = Self::split_project(id)?;
        let url = format!(
            "{}/repos/{}/{}/pulls/{}/files",
            self.base_api, owner, repo, id.iid
        );
        let files: Vec<GitHubPrFile> = self.get_json_paged(&url).await?;

        let mut out = Vec::with_capacity(files.len());
        for f in files {
            let patch = f.patch.unwrap_or_default();
            // GitHub simply omits `patch` for binary files, unlike GitLab's
            // explicit flags; absence plus a non-"removed" status is the
            // closest available signal.
            let is_binary = patch.is_empty() && f.status != "removed" || looks_like_binary_patch(&patch);
            let hunks = if is_binary {
                Vec::new()
            } else {
                parse_unified_diff(&patch).unwrap_or_default()
            };
            let status = match f.status.as_str() {
                "added" => FileStatus::Added,
                "removed" => FileStatus::Deleted,
                "renamed" => FileStatus::Renamed,
                _ => FileStatus::Modified,
            };
            out.push(DiffItem {
                old_path: f.previous_filename.or_else(|| Some(f.filename.clone())),
                new_path: Some(f.filename),
                status,
                patch,
                is_binary,
                too_large: false,
                generated: false,
                hunks,
                annotated_diff: None,
                new_lines: std::collections::BTreeMap::new(),
                old_lines: std::collections::BTreeMap::new(),
            });
        }

        Ok(ChangeSet {
            files: out,
            is_truncated: false,
        })
    }

    pub async fn post_inline_comment(
        &self,
        id: &ChangeRequestId,
        position: &InlinePosition,
        body: &str,
    ) -> Result<()> {
        let (owner, repo) = Self::split_project(id)?;
        let url = format!(
            "{}/repos/{}/{}/pulls/{}/comments",
            self.base_api, owner, repo, id.iid
        );
        let path = match position.side {
            Side::Right => position.new_path.clone(),
            Side::Left => position.old_path.clone(),
        }
        .unwrap_or_default();
        let payload = serde_json::json!({
            "body": body,
            "commit_id": position.diff_refs.head_sha,
            "path": path,
            "line": position.line,
            "side": if position.side == Side::Right { "RIGHT" } else { "LEFT" },
        });
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
        let (owner, repo) = Self::split_project(id)?;
        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.base_api, owner, repo, id.iid
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

    /// Issue comments (general/report) and review comments (inline) are
    /// separate GitHub resources; idempotency markers can land in either
    /// depending on publish mode, so both are listed here.
    pub async fn list_comments(&self, id: &ChangeRequestId) -> Result<Vec<(String, String)>> {
        let (owner, repo) = Self::split_project(id)?;

        let issue_url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.base_api, owner, repo, id.iid
        );
        let issue_comments: Vec<GitHubComment> = self.get_json_paged(&issue_url).await?;

        let review_url = format!(
            "{}/repos/{}/{}/pulls/{}/comments",
            self.base_api, owner, repo, id.iid
        );
        let review_comments: Vec<GitHubComment> = self.get_json_paged(&review_url).await?;

        Ok(issue_comments
            .into_iter()
            .chain(review_comments)
            .map(|c| (c.id.to_string(), c.body))
            .collect())
    }

    pub async fn update_general_comment(
        &self,
        id: &ChangeRequestId,
        comment_id: &str,
        body: &str,
    ) -> Result<()> {
        let (owner, repo) = Self::split_project(id)?;
        let url = format!(
            "{}/repos/{}/{}/issues/comments/{}",
            self.base_api, owner, repo, comment_id
        );
        let mut req = self
            .http
            .patch(&url)
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

    /// Review (inline) comments are a distinct resource from issue comments
    /// and live under `pulls/comments`, not `issues/comments`.
    pub async fn update_inline_comment(
        &self,
        id: &ChangeRequestId,
        comment_id: &str,
        body: &str,
    ) -> Result<()> {
        let (owner, repo) = Self::split_project(id)?;
        let url = format!(
            "{}/repos/{}/{}/pulls/comments/{}",
            self.base_api, owner, repo, comment_id
        );
        let mut req = self
            .http
            .patch(&url)
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
struct GitHubUser {
    id: u64,
    login: String,
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubRef {
    r#ref: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GitHubPull {
    title: String,
    body: Option<String>,
    html_url: String,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    head: GitHubRef,
    base: GitHubRef,
    user: GitHubUser,
    #[serde(default)]
    draft: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct GitHubPrFile {
    filename: String,
    previous_filename: Option<String>,
    status: String,
    patch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubComment {
    id: u64,
    body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_pat_uses_token_scheme() {
        assert_eq!(GitHubClient::auth_header("ghp_abc123"), "token ghp_abc123");
        assert_eq!(
            GitHubClient::auth_header("github_pat_abc123"),
            "token github_pat_abc123"
        );
    }

    #[test]
    fn other_tokens_use_bearer_scheme() {
        assert_eq!(GitHubClient::auth_header("ghs_installation"), "Bearer ghs_installation");
        assert_eq!(GitHubClient::auth_header("arbitrary"), "Bearer arbitrary");
    }
}
