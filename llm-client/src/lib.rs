//! Streaming OpenAI-compatible chat completion client (C6's transport
//! half). Built against the same minimal request/response shapes the
//! project's original non-streaming `OpenAiService` used, extended with
//! SSE delta accumulation since the review Agent needs the full response
//! text before handing it to the YAML extractor.

pub mod config;
pub mod errors;

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use config::LlmConfig;
pub use errors::{LlmError, Result};

/// One chat message. Only `system` and `user` roles are ever sent by this
/// service; `assistant` appears in parsed stream deltas only.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

pub struct LlmClient {
    http: reqwest::Client,
    cfg: LlmConfig,
    url: String,
}

impl LlmClient {
    pub fn new(cfg: LlmConfig) -> Result<Self> {
        cfg.validate()?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", cfg.api_key))
                .map_err(|e| LlmError::Decode(format!("invalid api key header: {e}")))?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .default_headers(headers)
            .build()?;

        let url = format!("{}/chat/completions", cfg.endpoint.trim_end_matches('/'));

        Ok(Self { http, cfg, url })
    }

    /// Streams one chat completion, concatenating delta tokens into a
    /// single response string. On client disconnect or timeout, whatever
    /// text accumulated so far is discarded — callers get an error, never
    /// a silently-truncated partial response.
    pub async fn stream_chat(&self, messages: &[Message]) -> Result<String> {
        let body = ChatCompletionRequest {
            model: &self.cfg.model,
            messages,
            temperature: self.cfg.temperature,
            max_tokens: self.cfg.max_tokens,
            stream: true,
        };

        debug!(model = %self.cfg.model, url = %self.url, "starting streaming chat completion");

        let resp = self.http.post(&self.url).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::HttpStatus {
                status,
                snippet: snippet(&text),
            });
        }

        let mut stream = resp.bytes_stream();
        let mut buf = String::new();
        let mut accumulated = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buf.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buf.find('\n') {
                let line = buf[..pos].trim_end_matches('\r').to_string();
                buf.drain(..=pos);

                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim();
                if data.is_empty() {
                    continue;
                }
                if data == "[DONE]" {
                    return finish(accumulated);
                }

                match serde_json::from_str::<StreamChunk>(data) {
                    Ok(parsed) => {
                        if let Some(choice) = parsed.choices.into_iter().next() {
                            if let Some(content) = choice.delta.content {
                                accumulated.push_str(&content);
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to decode stream chunk, skipping");
                    }
                }
            }
        }

        finish(accumulated)
    }
}

fn finish(accumulated: String) -> Result<String> {
    if accumulated.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(accumulated)
}

fn snippet(text: &str) -> String {
    const MAX: usize = 300;
    if text.len() > MAX {
        format!("{}…", &text[..MAX])
    } else {
        text.to_string()
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_api_key() {
        let cfg = LlmConfig {
            endpoint: "https://api.openai.com/v1".into(),
            api_key: String::new(),
            model: "gpt-4o".into(),
            temperature: 0.2,
            max_tokens: 6000,
            timeout_secs: 120,
        };
        assert!(matches!(LlmClient::new(cfg), Err(LlmError::MissingApiKey)));
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let cfg = LlmConfig {
            endpoint: "ftp://example.com".into(),
            api_key: "key".into(),
            model: "gpt-4o".into(),
            temperature: 0.2,
            max_tokens: 6000,
            timeout_secs: 120,
        };
        assert!(matches!(
            LlmClient::new(cfg),
            Err(LlmError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn parses_stream_chunk_shape() {
        let raw = r#"{"choices":[{"delta":{"content":"hello"}}]}"#;
        let parsed: StreamChunk = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].delta.content.as_deref(), Some("hello"));
    }
}
