//! Static provider data: endpoints, default models, rate limits and pricing
//!
//! Every lookup is total. Unknown models fall back to "no rate limit" and
//! zero cost so that a missing table entry never blocks a request.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported LLM backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Anthropic,
    OpenAI,
    Groq,
    Ollama,
    DeepSeek,
    Grok3,
}

impl ProviderId {
    pub const ALL: [ProviderId; 6] = [
        ProviderId::Anthropic,
        ProviderId::OpenAI,
        ProviderId::Groq,
        ProviderId::Ollama,
        ProviderId::DeepSeek,
        ProviderId::Grok3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Anthropic => "anthropic",
            ProviderId::OpenAI => "openai",
            ProviderId::Groq => "groq",
            ProviderId::Ollama => "ollama",
            ProviderId::DeepSeek => "deepseek",
            ProviderId::Grok3 => "grok3",
        }
    }

    /// Whether requests to this provider need an API key
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, ProviderId::Ollama)
    }

    /// Environment variable consulted for this provider's key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderId::Anthropic => "ANTHROPIC_API_KEY",
            ProviderId::OpenAI => "OPENAI_API_KEY",
            ProviderId::Groq => "GROQ_API_KEY",
            ProviderId::Ollama => "OLLAMA_API_KEY",
            ProviderId::DeepSeek => "DEEPSEEK_API_KEY",
            ProviderId::Grok3 => "XAI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ProviderId::Anthropic),
            "openai" => Ok(ProviderId::OpenAI),
            "groq" => Ok(ProviderId::Groq),
            "ollama" => Ok(ProviderId::Ollama),
            "deepseek" => Ok(ProviderId::DeepSeek),
            "grok3" | "grok" | "xai" => Ok(ProviderId::Grok3),
            other => Err(other.to_string()),
        }
    }
}

/// Per-minute caps for one provider/model pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimits {
    pub requests_per_minute: u32,
    pub input_tokens_per_minute: u64,
    pub output_tokens_per_minute: u64,
}

/// USD price per million tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub input_cost_per_million: f64,
    pub output_cost_per_million: f64,
}

struct ModelEntry {
    model: &'static str,
    limits: Option<RateLimits>,
    pricing: Option<Pricing>,
}

/// Immutable description of one backend
pub struct ProviderSpec {
    pub id: ProviderId,
    pub endpoint: &'static str,
    pub default_model: &'static str,
    models: &'static [ModelEntry],
}

impl ProviderSpec {
    /// Models with at least one table entry
    pub fn known_models(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.models.iter().map(|m| m.model)
    }

    fn entry(&self, model: &str) -> Option<&'static ModelEntry> {
        self.models.iter().find(|m| m.model == model)
    }
}

const fn limits(rpm: u32, input: u64, output: u64) -> Option<RateLimits> {
    Some(RateLimits {
        requests_per_minute: rpm,
        input_tokens_per_minute: input,
        output_tokens_per_minute: output,
    })
}

const fn price(input: f64, output: f64) -> Option<Pricing> {
    Some(Pricing {
        input_cost_per_million: input,
        output_cost_per_million: output,
    })
}

static ANTHROPIC_MODELS: [ModelEntry; 3] = [
    ModelEntry {
        model: "claude-3-7-sonnet-20250219",
        limits: limits(50, 20_000, 8_000),
        pricing: price(3.0, 15.0),
    },
    ModelEntry {
        model: "claude-3-5-sonnet-20241022",
        limits: limits(50, 40_000, 8_000),
        pricing: price(3.0, 15.0),
    },
    ModelEntry {
        model: "claude-3-5-haiku-20241022",
        limits: limits(50, 50_000, 10_000),
        pricing: price(0.8, 4.0),
    },
];

static OPENAI_MODELS: [ModelEntry; 3] = [
    ModelEntry {
        model: "gpt-4o",
        limits: limits(500, 30_000, 30_000),
        pricing: price(2.5, 10.0),
    },
    ModelEntry {
        model: "gpt-4o-mini",
        limits: limits(500, 200_000, 200_000),
        pricing: price(0.15, 0.6),
    },
    ModelEntry {
        model: "o3-mini",
        limits: limits(500, 200_000, 100_000),
        pricing: price(1.1, 4.4),
    },
];

static GROQ_MODELS: [ModelEntry; 2] = [
    ModelEntry {
        model: "llama-3.3-70b-versatile",
        limits: limits(30, 6_000, 6_000),
        pricing: price(0.59, 0.79),
    },
    ModelEntry {
        model: "llama-3.1-8b-instant",
        limits: limits(30, 20_000, 20_000),
        pricing: price(0.05, 0.08),
    },
];

static DEEPSEEK_MODELS: [ModelEntry; 2] = [
    ModelEntry {
        model: "deepseek-chat",
        limits: None,
        pricing: price(0.27, 1.10),
    },
    ModelEntry {
        model: "deepseek-reasoner",
        limits: None,
        pricing: price(0.55, 2.19),
    },
];

static GROK3_MODELS: [ModelEntry; 2] = [
    ModelEntry {
        model: "grok-3-beta",
        limits: limits(60, 100_000, 50_000),
        pricing: price(3.0, 15.0),
    },
    ModelEntry {
        model: "grok-3-mini-beta",
        limits: limits(60, 100_000, 50_000),
        pricing: price(0.3, 0.5),
    },
];

static PROVIDERS: [ProviderSpec; 6] = [
    ProviderSpec {
        id: ProviderId::Anthropic,
        endpoint: "https://api.anthropic.com/v1/messages",
        default_model: "claude-3-5-sonnet-20241022",
        models: &ANTHROPIC_MODELS,
    },
    ProviderSpec {
        id: ProviderId::OpenAI,
        endpoint: "https://api.openai.com/v1/chat/completions",
        default_model: "gpt-4o",
        models: &OPENAI_MODELS,
    },
    ProviderSpec {
        id: ProviderId::Groq,
        endpoint: "https://api.groq.com/openai/v1/chat/completions",
        default_model: "llama-3.3-70b-versatile",
        models: &GROQ_MODELS,
    },
    // Local models are free and unthrottled
    ProviderSpec {
        id: ProviderId::Ollama,
        endpoint: "http://localhost:11434/api/chat",
        default_model: "llama3.2",
        models: &[],
    },
    ProviderSpec {
        id: ProviderId::DeepSeek,
        endpoint: "https://api.deepseek.com/chat/completions",
        default_model: "deepseek-chat",
        models: &DEEPSEEK_MODELS,
    },
    ProviderSpec {
        id: ProviderId::Grok3,
        endpoint: "https://api.x.ai/v1/messages",
        default_model: "grok-3-beta",
        models: &GROK3_MODELS,
    },
];

/// Full catalog entry for a provider
pub fn spec(provider: ProviderId) -> &'static ProviderSpec {
    // PROVIDERS is declared in ProviderId::ALL order
    &PROVIDERS[provider as usize]
}

pub fn endpoint(provider: ProviderId) -> &'static str {
    spec(provider).endpoint
}

pub fn default_model(provider: ProviderId) -> &'static str {
    spec(provider).default_model
}

/// Rate limits for a model, `None` meaning unlimited
pub fn rate_limits(provider: ProviderId, model: &str) -> Option<RateLimits> {
    spec(provider).entry(model).and_then(|m| m.limits)
}

/// Pricing for a model, `None` meaning the call is reported as free
pub fn pricing(provider: ProviderId, model: &str) -> Option<Pricing> {
    spec(provider).entry(model).and_then(|m| m.pricing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_order_matches_ids() {
        for id in ProviderId::ALL {
            assert_eq!(spec(id).id, id);
        }
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("anthropic".parse::<ProviderId>(), Ok(ProviderId::Anthropic));
        assert_eq!(" Grok3 ".parse::<ProviderId>(), Ok(ProviderId::Grok3));
        assert!("mistral".parse::<ProviderId>().is_err());
    }

    #[test]
    fn test_unknown_model_is_unlimited_and_free() {
        assert!(rate_limits(ProviderId::OpenAI, "gpt-99").is_none());
        assert!(pricing(ProviderId::OpenAI, "gpt-99").is_none());
        assert!(rate_limits(ProviderId::Ollama, "llama3.2").is_none());
    }

    #[test]
    fn test_known_model_lookup() {
        let limits = rate_limits(ProviderId::Groq, "llama-3.3-70b-versatile").unwrap();
        assert_eq!(limits.requests_per_minute, 30);

        let pricing = pricing(ProviderId::Anthropic, "claude-3-5-sonnet-20241022").unwrap();
        assert_eq!(pricing.output_cost_per_million, 15.0);
    }

    #[test]
    fn test_default_models_are_in_catalog() {
        for id in ProviderId::ALL {
            if id == ProviderId::Ollama {
                continue;
            }
            let model = default_model(id);
            assert!(spec(id).known_models().any(|m| m == model), "{}", id);
        }
    }
}
