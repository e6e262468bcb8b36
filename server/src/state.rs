//! Shared state for handlers, built once at startup and handed to every
//! request behind an `Arc`. Holds the process-wide singletons §5 calls for:
//! HTTP client pools (inside each provider client and the LLM client) and
//! the token encoder.

use std::collections::HashMap;

use review_core::budget::TokenCounter;
use review_core::git_providers::{ProviderClient, ProviderConfig, ProviderKind};

use llm_client::LlmClient;
use notifier::Notifier;

use crate::config::Config;
use crate::error::AppError;

pub struct AppState {
    pub config: Config,
    pub providers: HashMap<ProviderKind, ProviderClient>,
    pub llm: LlmClient,
    pub notifier: Notifier,
    pub counter: TokenCounter,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, AppError> {
        let mut providers = HashMap::new();

        if let Some(gh) = &config.github {
            providers.insert(
                ProviderKind::GitHub,
                ProviderClient::from_config(ProviderConfig {
                    kind: ProviderKind::GitHub,
                    base_api: gh.base_api.clone(),
                    token: gh.token.clone(),
                })?,
            );
        }
        if let Some(gl) = &config.gitlab {
            providers.insert(
                ProviderKind::GitLab,
                ProviderClient::from_config(ProviderConfig {
                    kind: ProviderKind::GitLab,
                    base_api: gl.base_api.clone(),
                    token: gl.token.clone(),
                })?,
            );
        }

        let counter = TokenCounter::for_model(&config.llm.model);
        let llm = LlmClient::new(config.llm.clone())?;
        let notifier = Notifier::new(config.notify.clone());

        Ok(Self {
            config,
            providers,
            llm,
            notifier,
            counter,
        })
    }

    pub fn provider(&self, kind: ProviderKind) -> Option<&ProviderClient> {
        self.providers.get(&kind)
    }
}
