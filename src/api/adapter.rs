//! Per-provider wire formats
//!
//! Three request/response families cover all supported providers:
//! Anthropic-style messages (anthropic, grok3), OpenAI-style chat
//! completions (openai, deepseek, groq) and Ollama's native chat API.

use super::AiRequest;
use crate::catalog::ProviderId;
use serde_json::{json, Value};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Translates the canonical request to and from one provider's wire format
pub trait ProviderAdapter: Send + Sync {
    /// JSON body for the POST
    fn build_payload(&self, request: &AiRequest, model: &str) -> Value;

    /// Headers besides Content-Type
    fn build_headers(&self, api_key: Option<&str>) -> Vec<(&'static str, String)>;

    /// The model's answer, if the response has the expected shape
    fn extract_text(&self, response: &Value) -> Option<String>;

    /// Reported (input, output) token counts
    fn extract_usage(&self, response: &Value) -> (Option<u64>, Option<u64>);
}

/// Anthropic messages API, also spoken by grok3
pub struct MessagesAdapter {
    send_api_key_header: bool,
}

/// OpenAI chat completions API
pub struct ChatCompletionsAdapter;

/// Ollama `/api/chat`
pub struct OllamaAdapter;

static ANTHROPIC: MessagesAdapter = MessagesAdapter {
    send_api_key_header: true,
};
static GROK3: MessagesAdapter = MessagesAdapter {
    send_api_key_header: false,
};
static CHAT_COMPLETIONS: ChatCompletionsAdapter = ChatCompletionsAdapter;
static OLLAMA: OllamaAdapter = OllamaAdapter;

pub fn adapter_for(provider: ProviderId) -> &'static dyn ProviderAdapter {
    match provider {
        ProviderId::Anthropic => &ANTHROPIC,
        ProviderId::Grok3 => &GROK3,
        ProviderId::OpenAI | ProviderId::DeepSeek | ProviderId::Groq => &CHAT_COMPLETIONS,
        ProviderId::Ollama => &OLLAMA,
    }
}

fn bearer(api_key: Option<&str>) -> Vec<(&'static str, String)> {
    api_key
        .map(|key| vec![("Authorization", format!("Bearer {}", key))])
        .unwrap_or_default()
}

impl ProviderAdapter for MessagesAdapter {
    fn build_payload(&self, request: &AiRequest, model: &str) -> Value {
        let mut body = json!({
            "model": model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [{
                "role": "user",
                "content": [{ "type": "text", "text": request.prompt }]
            }],
        });

        if let Some(system) = &request.system_text {
            body["system"] = json!([{ "type": "text", "text": system }]);
        }

        body
    }

    fn build_headers(&self, api_key: Option<&str>) -> Vec<(&'static str, String)> {
        let mut headers = bearer(api_key);
        if self.send_api_key_header {
            if let Some(key) = api_key {
                headers.push(("x-api-key", key.to_string()));
            }
        }
        headers.push(("anthropic-version", ANTHROPIC_VERSION.to_string()));
        headers
    }

    fn extract_text(&self, response: &Value) -> Option<String> {
        response["content"][0]["text"].as_str().map(str::to_string)
    }

    fn extract_usage(&self, response: &Value) -> (Option<u64>, Option<u64>) {
        (
            response["usage"]["input_tokens"].as_u64(),
            response["usage"]["output_tokens"].as_u64(),
        )
    }
}

impl ProviderAdapter for ChatCompletionsAdapter {
    fn build_payload(&self, request: &AiRequest, model: &str) -> Value {
        json!({
            "model": model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        })
    }

    fn build_headers(&self, api_key: Option<&str>) -> Vec<(&'static str, String)> {
        bearer(api_key)
    }

    fn extract_text(&self, response: &Value) -> Option<String> {
        response["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
    }

    fn extract_usage(&self, response: &Value) -> (Option<u64>, Option<u64>) {
        (
            response["usage"]["prompt_tokens"].as_u64(),
            response["usage"]["completion_tokens"].as_u64(),
        )
    }
}

impl ProviderAdapter for OllamaAdapter {
    fn build_payload(&self, request: &AiRequest, model: &str) -> Value {
        json!({
            "model": model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            },
            "stream": false,
        })
    }

    // Local server, no auth
    fn build_headers(&self, _api_key: Option<&str>) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    fn extract_text(&self, response: &Value) -> Option<String> {
        response["message"]["content"].as_str().map(str::to_string)
    }

    fn extract_usage(&self, response: &Value) -> (Option<u64>, Option<u64>) {
        (
            response["prompt_eval_count"].as_u64(),
            response["eval_count"].as_u64(),
        )
    }
}
