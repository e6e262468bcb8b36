//! Application error type and its `IntoResponse` mapping, following the
//! project's original error-handler shape: one status + machine-readable
//! code + human message per error, never a stack trace to the caller.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use review_core::errors::{AuthError, ConfigError, Error as CoreError, ParseError, ProviderError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Llm(#[from] llm_client::LlmError),

    #[error("failed to bind listener")]
    Bind(#[source] std::io::Error),

    #[error("server error")]
    Server(#[source] std::io::Error),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Core(CoreError::Auth(_)) => StatusCode::UNAUTHORIZED,
            AppError::Core(CoreError::Validation(_)) => StatusCode::BAD_REQUEST,
            AppError::Core(CoreError::Provider(e)) => provider_status(e),
            AppError::Core(CoreError::Parse(_)) => StatusCode::BAD_GATEWAY,
            AppError::Core(CoreError::Config(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Core(CoreError::Other(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Llm(_) => StatusCode::BAD_GATEWAY,
            AppError::Bind(_) | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Core(CoreError::Auth(e)) => auth_code(e),
            AppError::Core(CoreError::Validation(_)) => "VALIDATION_ERROR",
            AppError::Core(CoreError::Provider(_)) => "PROVIDER_ERROR",
            AppError::Core(CoreError::Parse(e)) => parse_code(e),
            AppError::Core(CoreError::Config(_)) => "CONFIG_ERROR",
            AppError::Core(CoreError::Other(_)) => "INTERNAL_ERROR",
            AppError::Llm(_) => "LLM_ERROR",
            AppError::Bind(_) => "BIND_ERROR",
            AppError::Server(_) => "SERVER_ERROR",
        }
    }
}

fn provider_status(e: &ProviderError) -> StatusCode {
    match e {
        ProviderError::Unauthorized => StatusCode::BAD_GATEWAY,
        ProviderError::Forbidden => StatusCode::BAD_GATEWAY,
        ProviderError::NotFound => StatusCode::BAD_GATEWAY,
        ProviderError::RateLimited { .. } => StatusCode::BAD_GATEWAY,
        ProviderError::Server(_) => StatusCode::BAD_GATEWAY,
        ProviderError::HttpStatus(_) => StatusCode::BAD_GATEWAY,
        ProviderError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ProviderError::Network(_) => StatusCode::BAD_GATEWAY,
        ProviderError::Serde(_) => StatusCode::BAD_GATEWAY,
        ProviderError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
        ProviderError::Unsupported => StatusCode::NOT_IMPLEMENTED,
    }
}

fn auth_code(e: &AuthError) -> &'static str {
    match e {
        AuthError::MissingSignature | AuthError::MissingToken => "MISSING_AUTH",
        AuthError::BadSignature | AuthError::BadToken => "BAD_AUTH",
        AuthError::SecretNotConfigured => "SECRET_NOT_CONFIGURED",
    }
}

fn parse_code(e: &ParseError) -> &'static str {
    match e {
        ParseError::InvalidHunkHeader(_) => "INVALID_HUNK_HEADER",
        ParseError::UnexpectedEof => "UNEXPECTED_EOF",
        ParseError::NoYamlBlock => "NO_YAML_BLOCK",
        ParseError::InvalidYaml(_) => "INVALID_YAML",
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.error_code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
