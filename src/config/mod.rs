//! Configuration management for QCode
//!
//! Supports configuration via:
//! 1. Config file (~/.config/qcode/config.toml)
//! 2. Environment variables (ANTHROPIC_API_KEY, OPENAI_API_KEY, etc.)
//! 3. CLI arguments (override file/env settings)

use crate::catalog::{self, ProviderId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// How a prompt's answer is used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PromptMode {
    /// Return the model's answer as-is
    Chat,
    /// Ask for a JSON edit array and apply it to the workspace
    #[default]
    Engine,
}

/// Main configuration structure (the host's settings)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider used for prompts (anthropic, openai, groq, ollama, deepseek, grok3)
    pub active_provider: String,

    /// Sampling temperature, 0.0 - 1.0
    pub temperature: f32,

    /// Maximum tokens for responses
    pub max_tokens: u32,

    /// How much editor context to send, 0 - 100
    pub context_sensitivity: u8,

    /// Chat or engine mode
    pub mode: PromptMode,

    /// HTTP dispatch settings
    pub dispatch: DispatchSettings,

    /// Edit application settings
    pub workspace: WorkspaceSettings,

    pub anthropic: ProviderSettings,
    pub openai: ProviderSettings,
    pub groq: ProviderSettings,
    pub ollama: ProviderSettings,
    pub deepseek: ProviderSettings,
    pub grok3: ProviderSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            active_provider: ProviderId::Anthropic.to_string(),
            temperature: 0.7,
            max_tokens: 4096,
            context_sensitivity: 50,
            mode: PromptMode::default(),
            dispatch: DispatchSettings::default(),
            workspace: WorkspaceSettings::default(),
            anthropic: ProviderSettings::for_provider(ProviderId::Anthropic),
            openai: ProviderSettings::for_provider(ProviderId::OpenAI),
            groq: ProviderSettings::for_provider(ProviderId::Groq),
            ollama: ProviderSettings::for_provider(ProviderId::Ollama),
            deepseek: ProviderSettings::for_provider(ProviderId::DeepSeek),
            grok3: ProviderSettings::for_provider(ProviderId::Grok3),
        }
    }
}

/// Settings for one provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// API key (can also come from the provider's env var)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model to use; empty means the catalog default
    pub model: String,

    /// Whether this provider may be used
    pub enabled: bool,

    /// Override for the catalog endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: String::new(),
            enabled: true,
            base_url: None,
        }
    }
}

impl ProviderSettings {
    pub fn for_provider(provider: ProviderId) -> Self {
        Self {
            api_key: None,
            model: catalog::default_model(provider).to_string(),
            enabled: true,
            base_url: None,
        }
    }

    /// The configured model, or the catalog default when unset
    pub fn model_or_default(&self, provider: ProviderId) -> String {
        if self.model.trim().is_empty() {
            catalog::default_model(provider).to_string()
        } else {
            self.model.clone()
        }
    }

    /// Endpoint to POST to
    pub fn endpoint(&self, provider: ProviderId) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| catalog::endpoint(provider).to_string())
    }

    /// Non-empty API key, if any
    pub fn key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

/// HTTP dispatch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Delay before the single retry after HTTP 429, in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            retry_delay_ms: 1000,
        }
    }
}

/// Edit application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSettings {
    /// Let `create` overwrite an existing file
    pub allow_overwrite: bool,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            allow_overwrite: true,
        }
    }
}

impl Config {
    /// Get default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("qcode")
            .join("config.toml")
    }

    /// Load config from default location
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::default_path())
    }

    /// Load config from specific path
    pub fn load_from(path: PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default().with_env_overrides());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;

        Ok(config.with_env_overrides())
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(mut self) -> Self {
        for provider in ProviderId::ALL {
            if let Ok(key) = std::env::var(provider.api_key_env()) {
                self.provider_mut(provider).api_key = Some(key);
            }
        }

        if let Ok(url) = std::env::var("OLLAMA_URL") {
            self.ollama.base_url = Some(format!("{}/api/chat", url.trim_end_matches('/')));
        }
        if let Ok(provider) = std::env::var("QCODE_PROVIDER") {
            self.active_provider = provider;
        }
        if let Ok(model) = std::env::var("QCODE_MODEL") {
            if let Ok(provider) = self.active_provider.parse::<ProviderId>() {
                self.provider_mut(provider).model = model;
            }
        }

        self
    }

    /// Save config to default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::default_path())
    }

    /// Save config to specific path
    pub fn save_to(&self, path: PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.active_provider.parse::<ProviderId>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "unknown active_provider '{}'",
                self.active_provider
            )));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be between 0 and 1, got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be positive".to_string()));
        }
        if self.context_sensitivity > 100 {
            return Err(ConfigError::Invalid(format!(
                "context_sensitivity must be at most 100, got {}",
                self.context_sensitivity
            )));
        }
        Ok(())
    }

    pub fn provider(&self, provider: ProviderId) -> &ProviderSettings {
        match provider {
            ProviderId::Anthropic => &self.anthropic,
            ProviderId::OpenAI => &self.openai,
            ProviderId::Groq => &self.groq,
            ProviderId::Ollama => &self.ollama,
            ProviderId::DeepSeek => &self.deepseek,
            ProviderId::Grok3 => &self.grok3,
        }
    }

    pub fn provider_mut(&mut self, provider: ProviderId) -> &mut ProviderSettings {
        match provider {
            ProviderId::Anthropic => &mut self.anthropic,
            ProviderId::OpenAI => &mut self.openai,
            ProviderId::Groq => &mut self.groq,
            ProviderId::Ollama => &mut self.ollama,
            ProviderId::DeepSeek => &mut self.deepseek,
            ProviderId::Grok3 => &mut self.grok3,
        }
    }

    /// Copy with API keys masked, for display
    pub fn masked(&self) -> Self {
        let mut masked = self.clone();
        for provider in ProviderId::ALL {
            let settings = masked.provider_mut(provider);
            if settings.api_key.is_some() {
                settings.api_key = Some("***".to_string());
            }
        }
        masked
    }

    /// Generate example config content
    pub fn example() -> String {
        let example = Config::default();
        toml::to_string_pretty(&example).unwrap_or_default()
    }
}

/// Builder for creating Config programmatically
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn active_provider(mut self, provider: impl Into<String>) -> Self {
        self.config.active_provider = provider.into();
        self
    }

    pub fn api_key(mut self, provider: ProviderId, key: impl Into<String>) -> Self {
        self.config.provider_mut(provider).api_key = Some(key.into());
        self
    }

    pub fn model(mut self, provider: ProviderId, model: impl Into<String>) -> Self {
        self.config.provider_mut(provider).model = model.into();
        self
    }

    pub fn base_url(mut self, provider: ProviderId, url: impl Into<String>) -> Self {
        self.config.provider_mut(provider).base_url = Some(url.into());
        self
    }

    pub fn enabled(mut self, provider: ProviderId, enabled: bool) -> Self {
        self.config.provider_mut(provider).enabled = enabled;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    pub fn context_sensitivity(mut self, sensitivity: u8) -> Self {
        self.config.context_sensitivity = sensitivity;
        self
    }

    pub fn mode(mut self, mode: PromptMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn retry_delay_ms(mut self, delay: u64) -> Self {
        self.config.dispatch.retry_delay_ms = delay;
        self
    }

    pub fn allow_overwrite(mut self, allow: bool) -> Self {
        self.config.workspace.allow_overwrite = allow;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.active_provider, "anthropic");
        assert_eq!(config.dispatch.timeout_secs, 60);
        assert_eq!(config.groq.model, "llama-3.3-70b-versatile");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .active_provider("groq")
            .api_key(ProviderId::Groq, "test-key")
            .temperature(0.2)
            .mode(PromptMode::Chat)
            .build();

        assert_eq!(config.groq.key(), Some("test-key"));
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.mode, PromptMode::Chat);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(ConfigBuilder::new().temperature(1.5).build().validate().is_err());
        assert!(ConfigBuilder::new().max_tokens(0).build().validate().is_err());
        assert!(ConfigBuilder::new().active_provider("mistral").build().validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            active_provider = "ollama"

            [ollama]
            model = "codellama"
            "#,
        )
        .unwrap();

        assert_eq!(config.active_provider, "ollama");
        assert_eq!(config.ollama.model, "codellama");
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.dispatch.retry_delay_ms, 1000);
    }

    #[test]
    fn test_empty_model_falls_back_to_catalog() {
        let settings = ProviderSettings::default();
        assert_eq!(settings.model_or_default(ProviderId::DeepSeek), "deepseek-chat");
        assert_eq!(
            settings.endpoint(ProviderId::DeepSeek),
            "https://api.deepseek.com/chat/completions"
        );
    }

    #[test]
    fn test_masked_hides_keys() {
        let config = ConfigBuilder::new()
            .api_key(ProviderId::OpenAI, "sk-secret")
            .build()
            .masked();
        assert_eq!(config.openai.api_key.as_deref(), Some("***"));
        assert!(config.anthropic.api_key.is_none());
    }

    #[test]
    fn test_example_config() {
        let example = Config::example();
        assert!(example.contains("[anthropic]"));
        assert!(example.contains("[dispatch]"));
    }
}
