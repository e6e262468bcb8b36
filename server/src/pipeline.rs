//! Orchestrates C1–C8 for one change request: fetch, normalize, extend,
//! budget/split, review each chunk, merge, publish, notify. Mirrors the
//! state machine in §4.9: received → verified → filtered → fetched →
//! extended → chunked → reviewed → published → notified → done.

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use review_core::budget::{self, ChunkResult};
use review_core::diff;
use review_core::errors::{Error as CoreError, ProviderError};
use review_core::git_providers::{ChangeRequest, ChangeRequestId, ProviderClient, ProviderConfig, ProviderKind};
use review_core::parser;
use review_core::prompt::{Language, PromptStore};
use review_core::publish::{self, PublishMode, PublishSummary};

use llm_client::{LlmError, Message as LlmMessage};

use crate::error::AppError;
use crate::state::AppState;

const MAX_ATTEMPTS: u32 = 3;

pub struct PipelineOutcome {
    pub cr: ChangeRequest,
    pub summary: PublishSummary,
    pub finding_count: usize,
}

/// Runs the full review pipeline for one already-filtered change request.
/// `api_token_override` is the per-request forge token carried by
/// `X-Gitlab-Api-Token` (GitLab only per the webhook contract); when
/// present it supersedes the configured token for every forge call this
/// request makes.
pub async fn run_review(
    state: &AppState,
    kind: ProviderKind,
    id: ChangeRequestId,
    mode: PublishMode,
    language: Language,
    api_token_override: Option<&str>,
) -> Result<PipelineOutcome, AppError> {
    let not_configured = || AppError::BadRequest(format!("{kind:?} is not a configured target platform"));

    let client = match api_token_override {
        Some(token) => {
            let base_api = match kind {
                ProviderKind::GitHub => state.config.github.as_ref(),
                ProviderKind::GitLab => state.config.gitlab.as_ref(),
            }
            .ok_or_else(not_configured)?
            .base_api
            .clone();
            ProviderClient::from_config(ProviderConfig {
                kind,
                base_api,
                token: token.to_string(),
            })?
        }
        None => state.provider(kind).cloned().ok_or_else(not_configured)?,
    };
    let client = &client;

    let cr = with_retry(|| client.fetch_meta(&id), is_retryable_core).await?;
    let changeset = with_retry(|| client.fetch_changes(&id), is_retryable_core).await?;

    info!(project = %id.project, iid = id.iid, files = changeset.files.len(), "fetched change request");

    let mut items = diff::normalize(changeset.files);
    parser::extend_changeset(&mut items);
    let extended_diff = parser::build_extended_diff(&cr, &items);

    let chunks = budget::split_extended_diff(&extended_diff, state.config.token_budget, &state.counter);
    info!(chunk_count = chunks.len(), "split extended diff into chunks");

    let mut chunk_results = Vec::with_capacity(chunks.len());
    for (chunk_index, text) in chunks.into_iter().enumerate() {
        let token_count = state.counter.count(&text);
        let messages = PromptStore::build_messages(language, &text);
        let llm_messages: Vec<LlmMessage> = messages
            .into_iter()
            .map(|m| LlmMessage {
                role: m.role.to_string(),
                content: m.content,
            })
            .collect();

        let reviews = match with_retry(|| state.llm.stream_chat(&llm_messages), is_retryable_llm).await {
            Ok(response) => match review_core::agent::parse_agent_response(&response) {
                Ok(outcome) => {
                    if outcome.fix_applied {
                        warn!(chunk_index, "model response required yaml repair");
                    }
                    Ok(outcome.reviews)
                }
                Err(e) => {
                    warn!(chunk_index, error = %e, "chunk yielded zero findings: parse failed after repair");
                    Err(e.to_string())
                }
            },
            Err(e) => {
                warn!(chunk_index, error = %e, "chunk yielded zero findings: llm call failed");
                Err(e.to_string())
            }
        };

        chunk_results.push(ChunkResult {
            chunk_index,
            text,
            token_count,
            reviews,
        });
    }

    let reviews = budget::merge_reviews(&chunk_results);
    let finding_count = reviews.len();

    let summary = publish::publish(client, &id, &cr, &items, &reviews, mode).await?;
    info!(
        posted = summary.posted,
        updated = summary.updated,
        skipped = summary.skipped,
        failed = summary.failed,
        finding_count,
        "publish finished"
    );

    Ok(PipelineOutcome {
        cr,
        summary,
        finding_count,
    })
}

fn is_retryable_core(e: &CoreError) -> bool {
    matches!(
        e,
        CoreError::Provider(ProviderError::RateLimited { .. })
            | CoreError::Provider(ProviderError::Server(_))
            | CoreError::Provider(ProviderError::Timeout)
            | CoreError::Provider(ProviderError::Network(_))
    )
}

fn is_retryable_llm(e: &LlmError) -> bool {
    matches!(e, LlmError::Timeout | LlmError::Transport(_))
        || matches!(e, LlmError::HttpStatus { status, .. } if *status == 429 || (500..600).contains(status))
}

/// Retries a fallible async operation up to [`MAX_ATTEMPTS`] times with
/// exponential backoff and jitter in `[0, 250ms]`, per §5's rate-limit
/// handling. Only retries errors `retryable` accepts as transient.
async fn with_retry<F, Fut, T, E>(mut op: F, retryable: fn(&E) -> bool) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < MAX_ATTEMPTS && retryable(&e) => {
                let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 1)) + jitter();
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn jitter() -> Duration {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    Duration::from_millis((nanos % 250) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn retries_transient_errors_up_to_max_attempts() {
        let mut calls = 0;
        let result: Result<(), &'static str> = with_retry(
            || {
                calls += 1;
                async move { Err("transient") }
            },
            |_| true,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls, MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn does_not_retry_non_retryable_errors() {
        let mut calls = 0;
        let result: Result<(), &'static str> = with_retry(
            || {
                calls += 1;
                async move { Err("fatal") }
            },
            |_| false,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn succeeds_without_retry_when_first_call_is_ok() {
        let mut calls = 0;
        let result: Result<i32, &'static str> = with_retry(
            || {
                calls += 1;
                async move { Ok(42) }
            },
            |_| true,
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 1);
    }
}
