//! Provider dispatch: one canonical request, six providers, three wire formats

mod adapter;
mod client;
mod request;
mod response;

pub use adapter::{adapter_for, ChatCompletionsAdapter, MessagesAdapter, OllamaAdapter, ProviderAdapter};
pub use client::RequestDispatcher;
pub use request::{estimate_tokens, system_text_for, AiRequest};
pub use response::{AiResponse, Cost, TokenUsage};

use crate::catalog::ProviderId;
use crate::config::Config;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Prompt is empty. Type a question or instruction before sending")]
    EmptyPrompt,

    #[error("Unknown provider '{0}'. Choose one of: anthropic, openai, groq, ollama, deepseek, grok3")]
    UnknownProvider(String),

    #[error("Provider {0} is disabled. Enable it in settings or pick another provider")]
    InactiveProvider(ProviderId),

    #[error("No API key configured for {provider}. Add a key via settings or set {env_var}")]
    MissingApiKey {
        provider: ProviderId,
        env_var: &'static str,
    },

    #[error("Request exceeds the per-minute caps of {provider}/{model}. Lower max tokens or shorten the prompt")]
    RequestTooLarge { provider: ProviderId, model: String },

    #[error("{provider} is still rate limiting after a retry. Wait a minute and try again")]
    RateLimited { provider: ProviderId },

    #[error("{provider} API error: {detail}")]
    Provider { provider: ProviderId, detail: String },

    #[error("Could not set up the HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

impl ApiError {
    /// Whether the error was raised before any network I/O
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ApiError::EmptyPrompt
                | ApiError::UnknownProvider(_)
                | ApiError::InactiveProvider(_)
                | ApiError::MissingApiKey { .. }
        )
    }
}

/// Anything that can answer an [`AiRequest`]
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, request: &AiRequest, config: &Config) -> Result<AiResponse, ApiError>;
}
