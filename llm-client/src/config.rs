//! Plain configuration record for the LLM client. No ambient globals: the
//! caller (the `server` crate) is responsible for loading these from the
//! environment and passing them in, keeping this crate testable in
//! isolation.

#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API, e.g. "https://api.openai.com/v1".
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    /// Fixed low per C6's contract (≈ 0.2).
    pub temperature: f32,
    /// Output token ceiling (≈ 6,000 per C6).
    pub max_tokens: u32,
    /// Overall deadline for one streaming call, default 120s per §5.
    pub timeout_secs: u64,
}

impl LlmConfig {
    pub fn validate(&self) -> Result<(), crate::errors::LlmError> {
        if self.api_key.is_empty() {
            return Err(crate::errors::LlmError::MissingApiKey);
        }
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(crate::errors::LlmError::InvalidEndpoint(self.endpoint.clone()));
        }
        Ok(())
    }
}
