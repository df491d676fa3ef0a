//! Canonical, provider-agnostic request

use crate::config::Config;
use serde::{Deserialize, Serialize};

/// Sensitivity above which the prompt head is repeated as system text
pub const SYSTEM_TEXT_THRESHOLD: u8 = 50;

/// Characters of the prompt carried into the system text
pub const SYSTEM_TEXT_CHARS: usize = 100;

/// Request to send to a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiRequest {
    /// The full prompt text
    pub prompt: String,

    /// Provider name as configured by the host (parsed at dispatch time)
    pub provider: String,

    /// Model name; empty means the provider's configured model
    pub model: String,

    /// Sampling temperature, 0.0 - 1.0
    pub temperature: f32,

    /// Maximum tokens for the response
    pub max_tokens: u32,

    /// Optional system text
    pub system_text: Option<String>,
}

impl AiRequest {
    pub fn new(prompt: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            provider: provider.into(),
            model: String::new(),
            temperature: 0.7,
            max_tokens: 4096,
            system_text: None,
        }
    }

    /// Build a request for the host's active provider
    pub fn from_config(prompt: impl Into<String>, config: &Config) -> Self {
        let prompt = prompt.into();
        let system_text = system_text_for(&prompt, config.context_sensitivity);
        let model = config
            .active_provider
            .parse()
            .map(|id| config.provider(id).model_or_default(id))
            .unwrap_or_default();

        Self {
            prompt,
            provider: config.active_provider.clone(),
            model,
            temperature: config.temperature.clamp(0.0, 1.0),
            max_tokens: config.max_tokens.max(1),
            system_text,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens.max(1);
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system_text = Some(system.into());
        self
    }

    /// Rough input token count: one token per four bytes, rounded up.
    ///
    /// This is a heuristic, not a tokenizer. It is only used to pace requests
    /// against per-minute caps and as a fallback when a provider omits usage.
    pub fn estimated_input_tokens(&self) -> u64 {
        let bytes = self.system_text.as_deref().map_or(0, str::len) + self.prompt.len();
        estimate_tokens_from_bytes(bytes)
    }
}

/// Four-bytes-per-token estimate, rounded up
pub fn estimate_tokens(text: &str) -> u64 {
    estimate_tokens_from_bytes(text.len())
}

fn estimate_tokens_from_bytes(bytes: usize) -> u64 {
    (bytes as u64).div_ceil(4)
}

/// System text derived from the context sensitivity setting
pub fn system_text_for(prompt: &str, sensitivity: u8) -> Option<String> {
    if sensitivity <= SYSTEM_TEXT_THRESHOLD {
        return None;
    }
    let head: String = prompt.chars().take(SYSTEM_TEXT_CHARS).collect();
    Some(format!("Use the following context: {}", head))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;

    #[test]
    fn test_token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_estimate_includes_system_text() {
        let request = AiRequest::new("abcd", "openai").with_system("efgh");
        assert_eq!(request.estimated_input_tokens(), 2);
    }

    #[test]
    fn test_system_text_threshold() {
        assert!(system_text_for("hello", 50).is_none());
        let text = system_text_for(&"x".repeat(300), 51).unwrap();
        assert!(text.ends_with(&"x".repeat(100)));
        assert!(!text.ends_with(&"x".repeat(101)));
    }

    #[test]
    fn test_from_config() {
        let config = ConfigBuilder::new()
            .active_provider("groq")
            .temperature(0.3)
            .max_tokens(512)
            .context_sensitivity(80)
            .build();

        let request = AiRequest::from_config("fix the bug", &config);
        assert_eq!(request.provider, "groq");
        assert_eq!(request.model, "llama-3.3-70b-versatile");
        assert_eq!(request.max_tokens, 512);
        assert_eq!(request.temperature, 0.3);
        assert!(request.system_text.is_some());
    }
}
