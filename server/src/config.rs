//! Typed, env-driven configuration. No ambient globals: `Config` is built
//! once at startup via [`Config::from_env`] and threaded through the
//! application as shared state, per §6's enumerated-options contract.

use std::collections::HashSet;

use review_core::errors::ConfigError;
use review_core::git_providers::ProviderKind;
use review_core::prompt::Language;

use notifier::{NotifyConfig, NotifyPlatform};

/// Per-forge credentials and endpoints.
#[derive(Debug, Clone)]
pub struct ForgeConfig {
    pub base_api: String,
    pub token: String,
    pub webhook_secret: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub github: Option<ForgeConfig>,
    pub gitlab: Option<ForgeConfig>,
    pub llm: llm_client::LlmConfig,
    pub review_language: Language,
    pub token_budget: usize,
    pub notify: NotifyConfig,
    pub targets: HashSet<ProviderKind>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = env_or("PORT", "8000")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidValue {
                var: "PORT",
                reason: "must be an integer in 0..=65535",
            })?;

        let targets = parse_targets(&env_or("TARGET_PLATFORMS", "github,gitlab"))?;

        let github = if targets.contains(&ProviderKind::GitHub) {
            Some(ForgeConfig {
                base_api: env_or("GITHUB_API_BASE", "https://api.github.com"),
                token: required_var("GITHUB_TOKEN")?,
                webhook_secret: required_var("GITHUB_WEBHOOK_SECRET")?,
            })
        } else {
            None
        };

        let gitlab = if targets.contains(&ProviderKind::GitLab) {
            Some(ForgeConfig {
                base_api: env_or("GITLAB_API_BASE", "https://gitlab.com/api/v4"),
                token: required_var("GITLAB_TOKEN")?,
                webhook_secret: required_var("GITLAB_WEBHOOK_SECRET")?,
            })
        } else {
            None
        };

        let llm = llm_client::LlmConfig {
            endpoint: required_var("LLM_BASE_URL")?,
            api_key: required_var("LLM_API_KEY")?,
            model: env_or("LLM_MODEL", "gpt-4o"),
            temperature: env_or("LLM_TEMPERATURE", "0.2")
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    var: "LLM_TEMPERATURE",
                    reason: "must be a float",
                })?,
            max_tokens: env_or("LLM_MAX_TOKENS", "6000")
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    var: "LLM_MAX_TOKENS",
                    reason: "must be a non-negative integer",
                })?,
            timeout_secs: env_or("LLM_TIMEOUT_SECS", "120")
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    var: "LLM_TIMEOUT_SECS",
                    reason: "must be a non-negative integer",
                })?,
        };

        let review_language = Language::parse(&env_or("REVIEW_LANGUAGE", "en"))
            .ok_or(ConfigError::InvalidValue {
                var: "REVIEW_LANGUAGE",
                reason: "must be one of en, zh, ja",
            })?;

        let token_budget = env_or("TOKEN_BUDGET", "6000")
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                var: "TOKEN_BUDGET",
                reason: "must be a positive integer",
            })?;

        let notify = NotifyConfig {
            platform: NotifyPlatform::parse(&env_or("NOTIFY_PLATFORM", "none")),
            webhook_url: std::env::var("NOTIFY_WEBHOOK_URL").ok(),
        };

        Ok(Config {
            port,
            github,
            gitlab,
            llm,
            review_language,
            token_budget,
            notify,
            targets,
        })
    }
}

fn env_or(key: &'static str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn required_var(key: &'static str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingVar(key))
}

fn parse_targets(raw: &str) -> Result<HashSet<ProviderKind>, ConfigError> {
    let mut set = HashSet::new();
    for part in raw.split(',') {
        let part = part.trim().to_ascii_lowercase();
        if part.is_empty() {
            continue;
        }
        match part.as_str() {
            "github" => {
                set.insert(ProviderKind::GitHub);
            }
            "gitlab" => {
                set.insert(ProviderKind::GitLab);
            }
            _ => {
                return Err(ConfigError::InvalidValue {
                    var: "TARGET_PLATFORMS",
                    reason: "must be a comma-separated subset of github, gitlab",
                });
            }
        }
    }
    if set.is_empty() {
        return Err(ConfigError::InvalidValue {
            var: "TARGET_PLATFORMS",
            reason: "must name at least one of github, gitlab",
        });
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_targets() {
        let set = parse_targets("github, gitlab").unwrap();
        assert!(set.contains(&ProviderKind::GitHub));
        assert!(set.contains(&ProviderKind::GitLab));
    }

    #[test]
    fn rejects_unknown_target() {
        assert!(parse_targets("bitbucket").is_err());
    }

    #[test]
    fn rejects_empty_target_set() {
        assert!(parse_targets("").is_err());
    }
}
