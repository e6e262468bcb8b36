//! `POST /webhook/github` — verifies `X-Hub-Signature-256`, filters to
//! `pull_request` events with action ∈ {opened, reopened, synchronize} and
//! `draft = false`, then dispatches into the pipeline.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;

use review_core::git_providers::{verify_github_signature, ChangeRequestId, ProviderKind};
use serde::Deserialize;

use crate::error::AppResult;
use crate::state::AppState;
use crate::webhook::{bad_request, dispatch, is_draft, parse_mode, skip, RequestOverrides, WebhookResponse};

#[derive(Debug, Deserialize)]
pub struct GitHubQuery {
    pub mode: Option<String>,
    /// Per-request notifier destination override (§6 External Interfaces).
    pub push_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PullRequestEvent {
    action: String,
    pull_request: PullRequestPayload,
    repository: RepositoryPayload,
}

#[derive(Debug, Deserialize)]
struct PullRequestPayload {
    number: u64,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    full_name: String,
}

const HANDLED_ACTIONS: &[&str] = &["opened", "reopened", "synchronize"];

pub async fn handle(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GitHubQuery>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> AppResult<Json<WebhookResponse>> {
    let signature = headers
        .get("X-Hub-Signature-256")
        .and_then(|v| v.to_str().ok());
    let secret = state
        .config
        .github
        .as_ref()
        .map(|gh| gh.webhook_secret.as_str())
        .unwrap_or("");
    verify_github_signature(secret, &body, signature)?;

    let event_name = headers
        .get("X-GitHub-Event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if event_name != "pull_request" {
        return Ok(Json(skip("unhandled event type")));
    }

    let payload: PullRequestEvent =
        serde_json::from_slice(&body).map_err(|e| bad_request(format!("invalid webhook body: {e}")))?;

    if !HANDLED_ACTIONS.contains(&payload.action.as_str()) {
        return Ok(Json(skip("unhandled action")));
    }
    if is_draft(payload.pull_request.draft, &payload.pull_request.title) {
        return Ok(Json(skip("draft/WIP")));
    }

    let id = ChangeRequestId {
        project: payload.repository.full_name,
        iid: payload.pull_request.number,
    };
    let mode = parse_mode(query.mode.as_deref());
    let overrides = RequestOverrides {
        push_url: query.push_url,
        api_token: None,
    };

    Ok(Json(
        dispatch(&state, ProviderKind::GitHub, id, mode, overrides).await?,
    ))
}
