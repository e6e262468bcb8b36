//! Prompt Store (C5): language-selected system prompt plus message assembly.
//!
//! The original prompt service loaded `prompt-{lang}.txt` off disk at
//! startup with an English fallback; here the prompts are embedded at
//! compile time since the service ships as a single static binary.

/// Supported review languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    En,
    Zh,
    Ja,
}

impl Language {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Some(Language::En),
            "zh" => Some(Language::Zh),
            "ja" => Some(Language::Ja),
            _ => None,
        }
    }
}

const PROMPT_EN: &str = include_str!("prompts/en.txt");
const PROMPT_ZH: &str = include_str!("prompts/zh.txt");
const PROMPT_JA: &str = include_str!("prompts/ja.txt");

/// One chat message, matching the two roles the Agent ever sends.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: &'static str,
    pub content: String,
}

/// Holds the embedded system prompts and assembles per-review messages.
pub struct PromptStore;

impl PromptStore {
    /// Returns the system prompt for `lang`, falling back to English if the
    /// requested language has no prompt (never happens for the three
    /// supported languages, but keeps the contract explicit).
    pub fn system_prompt(lang: Language) -> &'static str {
        match lang {
            Language::En => PROMPT_EN,
            Language::Zh => PROMPT_ZH,
            Language::Ja => PROMPT_JA,
        }
    }

    /// Assembles the exact two-message sequence the Agent sends: system
    /// prompt then the extended diff as the user turn. No other roles.
    pub fn build_messages(lang: Language, extended_diff: &str) -> Vec<Message> {
        vec![
            Message {
                role: "system",
                content: Self::system_prompt(lang).to_string(),
            },
            Message {
                role: "user",
                content: extended_diff.to_string(),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_exactly_two_messages() {
        let msgs = PromptStore::build_messages(Language::En, "diff text");
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, "system");
        assert_eq!(msgs[1].role, "user");
        assert_eq!(msgs[1].content, "diff text");
    }

    #[test]
    fn parses_language_codes_case_insensitively() {
        assert_eq!(Language::parse("ZH"), Some(Language::Zh));
        assert_eq!(Language::parse("ja"), Some(Language::Ja));
        assert_eq!(Language::parse("fr"), None);
    }

    #[test]
    fn each_embedded_prompt_is_nonempty() {
        assert!(!PromptStore::system_prompt(Language::En).trim().is_empty());
        assert!(!PromptStore::system_prompt(Language::Zh).trim().is_empty());
        assert!(!PromptStore::system_prompt(Language::Ja).trim().is_empty());
    }
}
