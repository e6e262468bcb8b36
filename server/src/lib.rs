//! Webhook Envelope (C9) and process entry point. The binary crate only
//! calls [`Config::from_env`] and [`run`]; everything else (routing,
//! handlers, pipeline orchestration) lives here.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod state;
pub mod webhook;

use std::sync::Arc;

use axum::Json;
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use tracing::info;

pub use config::Config;
pub use error::AppError;
use state::AppState;

/// Builds the router and serves it until the process is signaled to stop.
pub async fn run(config: Config) -> Result<(), AppError> {
    let port = config.port;
    let state = Arc::new(AppState::new(config)?);

    let app = build_router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(AppError::Bind)?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .await
        .map_err(AppError::Server)?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/webhook/github", post(webhook::github::handle))
        .route("/webhook/gitlab", post(webhook::gitlab::handle))
        .with_state(state)
}

async fn liveness() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::config::{Config, ForgeConfig};
    use notifier::{NotifyConfig, NotifyPlatform};
    use review_core::prompt::Language;
    use std::collections::HashSet;

    fn test_config() -> Config {
        let mut targets = HashSet::new();
        targets.insert(review_core::git_providers::ProviderKind::GitHub);
        targets.insert(review_core::git_providers::ProviderKind::GitLab);
        Config {
            port: 0,
            github: Some(ForgeConfig {
                base_api: "https://api.github.com".into(),
                token: "gh-token".into(),
                webhook_secret: "gh-secret".into(),
            }),
            gitlab: Some(ForgeConfig {
                base_api: "https://gitlab.com/api/v4".into(),
                token: "gl-token".into(),
                webhook_secret: "gl-secret".into(),
            }),
            llm: llm_client::LlmConfig {
                endpoint: "https://api.openai.com/v1".into(),
                api_key: "sk-test".into(),
                model: "gpt-4o".into(),
                temperature: 0.2,
                max_tokens: 6000,
                timeout_secs: 120,
            },
            review_language: Language::En,
            token_budget: 6000,
            notify: NotifyConfig {
                platform: NotifyPlatform::None,
                webhook_url: None,
            },
            targets,
        }
    }

    fn test_router() -> Router {
        let state = Arc::new(AppState::new(test_config()).expect("valid test config"));
        build_router(state)
    }

    #[tokio::test]
    async fn liveness_endpoint_returns_ok() {
        let response = test_router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn github_webhook_rejects_bad_signature() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook/github")
                    .header("X-GitHub-Event", "pull_request")
                    .header("X-Hub-Signature-256", "sha256=deadbeef")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn gitlab_webhook_rejects_bad_token() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook/gitlab")
                    .header("X-Gitlab-Token", "wrong-token")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
