//! `POST /webhook/gitlab` — verifies `X-Gitlab-Token`, filters to
//! `merge_request` events with action ∈ {open, reopen, update}, state ∈
//! {opened, open}, and not WIP, then dispatches into the pipeline.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;

use review_core::git_providers::{verify_gitlab_token, ChangeRequestId, ProviderKind};
use serde::Deserialize;

use crate::error::AppResult;
use crate::state::AppState;
use crate::webhook::{bad_request, dispatch, is_draft, parse_mode, skip, RequestOverrides, WebhookResponse};

#[derive(Debug, Deserialize)]
struct MergeRequestEvent {
    object_kind: String,
    project: ProjectPayload,
    object_attributes: ObjectAttributes,
}

#[derive(Debug, Deserialize)]
struct ProjectPayload {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct ObjectAttributes {
    iid: u64,
    action: Option<String>,
    state: String,
    #[serde(default)]
    work_in_progress: bool,
    #[serde(default)]
    title: String,
}

const HANDLED_ACTIONS: &[&str] = &["open", "reopen", "update"];
const HANDLED_STATES: &[&str] = &["opened", "open"];

pub async fn handle(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> AppResult<Json<WebhookResponse>> {
    let token = headers.get("X-Gitlab-Token").and_then(|v| v.to_str().ok());
    let secret = state
        .config
        .gitlab
        .as_ref()
        .map(|gl| gl.webhook_secret.as_str())
        .unwrap_or("");
    verify_gitlab_token(secret, token)?;

    let payload: MergeRequestEvent =
        serde_json::from_slice(&body).map_err(|e| bad_request(format!("invalid webhook body: {e}")))?;

    if payload.object_kind != "merge_request" {
        return Ok(Json(skip("unhandled event type")));
    }

    let action_handled = payload
        .object_attributes
        .action
        .as_deref()
        .map(|a| HANDLED_ACTIONS.contains(&a))
        .unwrap_or(false);
    if !action_handled || !HANDLED_STATES.contains(&payload.object_attributes.state.as_str()) {
        return Ok(Json(skip("unhandled action/state")));
    }
    if is_draft(payload.object_attributes.work_in_progress, &payload.object_attributes.title) {
        return Ok(Json(skip("draft/WIP")));
    }

    let id = ChangeRequestId {
        project: payload.project.id.to_string(),
        iid: payload.object_attributes.iid,
    };
    let mode = parse_mode(headers.get("X-Ai-Mode").and_then(|v| v.to_str().ok()));
    let overrides = RequestOverrides {
        push_url: headers
            .get("X-Push-Url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        api_token: headers
            .get("X-Gitlab-Api-Token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };

    Ok(Json(
        dispatch(&state, ProviderKind::GitLab, id, mode, overrides).await?,
    ))
}
