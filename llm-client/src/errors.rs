//! Error taxonomy for the LLM client, adapted from the project's original
//! `ai-llm-service` error handler to the single OpenAI-compatible
//! streaming contract this crate needs.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("missing api key")]
    MissingApiKey,

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("http status {status}: {snippet}")]
    HttpStatus { status: u16, snippet: String },

    #[error("response decode error: {0}")]
    Decode(String),

    #[error("stream ended with no content")]
    EmptyResponse,

    #[error("request timed out")]
    Timeout,
}
