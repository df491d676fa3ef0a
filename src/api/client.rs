//! Rate-limited HTTP dispatcher shared by all providers

use super::{adapter_for, estimate_tokens, AiRequest, AiResponse, ApiError, Cost, Dispatch, TokenUsage};
use crate::catalog::{self, ProviderId};
use crate::config::{Config, DispatchSettings};
use crate::limiter::{LimiterRegistry, Reservation, SharedLimiter};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Provider, model and credentials resolved for one request
struct Target {
    provider: ProviderId,
    model: String,
    endpoint: String,
    api_key: Option<String>,
}

/// Sends canonical requests to providers, pacing them per provider/model.
///
/// Owns its limiter registry: limiters live as long as the dispatcher, and
/// two dispatchers never share usage windows.
pub struct RequestDispatcher {
    client: Client,
    limiters: LimiterRegistry,
    timeout: Duration,
    retry_delay: Duration,
}

impl RequestDispatcher {
    pub fn new(settings: &DispatchSettings) -> Result<Self, ApiError> {
        let timeout = Duration::from_secs(settings.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::HttpClient)?;

        Ok(Self {
            client,
            limiters: LimiterRegistry::new(),
            timeout,
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
        })
    }

    pub fn limiters(&self) -> &LimiterRegistry {
        &self.limiters
    }

    fn resolve(&self, request: &AiRequest, config: &Config) -> Result<Target, ApiError> {
        if request.prompt.trim().is_empty() {
            return Err(ApiError::EmptyPrompt);
        }

        let provider: ProviderId = request
            .provider
            .parse()
            .map_err(ApiError::UnknownProvider)?;

        let settings = config.provider(provider);
        if !settings.enabled {
            return Err(ApiError::InactiveProvider(provider));
        }

        let api_key = settings.key().map(str::to_string);
        if provider.requires_api_key() && api_key.is_none() {
            return Err(ApiError::MissingApiKey {
                provider,
                env_var: provider.api_key_env(),
            });
        }

        let model = if request.model.trim().is_empty() {
            settings.model_or_default(provider)
        } else {
            request.model.clone()
        };

        Ok(Target {
            provider,
            model,
            endpoint: settings.endpoint(provider),
            api_key,
        })
    }

    /// Wait until the limiter admits the call, then hold a reservation
    async fn acquire(
        &self,
        target: &Target,
        limiter: &SharedLimiter,
        est_input: u64,
        max_output: u64,
    ) -> Result<Reservation, ApiError> {
        loop {
            let attempt = {
                let mut limiter = limiter.lock().unwrap_or_else(|p| p.into_inner());
                if limiter.exceeds_caps(est_input, max_output) {
                    return Err(ApiError::RequestTooLarge {
                        provider: target.provider,
                        model: target.model.clone(),
                    });
                }
                limiter.try_reserve(Instant::now(), est_input, max_output)
            };

            match attempt {
                Ok(reservation) => return Ok(reservation),
                Err(wait) => {
                    info!(
                        "{}/{} at its rate limit, waiting {}ms",
                        target.provider,
                        target.model,
                        wait.as_millis()
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    async fn dispatch_once(&self, request: &AiRequest, target: &Target) -> Result<AiResponse, ApiError> {
        let est_input = request.estimated_input_tokens();
        let max_output = request.max_tokens as u64;

        let limiter = self.limiters.get(target.provider, &target.model);
        let reservation = self.acquire(target, &limiter, est_input, max_output).await?;

        let result = self.send(request, target).await;

        let mut limiter = limiter.lock().unwrap_or_else(|p| p.into_inner());
        match result {
            Ok((text, raw)) => {
                let usage = self.usage(target, &raw, &text, est_input);
                limiter.settle(reservation, usage.input_tokens, usage.output_tokens);
                drop(limiter);

                let cost = Cost::from_usage(&usage, catalog::pricing(target.provider, &target.model));
                info!(
                    "{}/{} answered: {} in, {} out, ${:.6}",
                    target.provider, target.model, usage.input_tokens, usage.output_tokens, cost.sum
                );

                Ok(AiResponse {
                    text,
                    raw,
                    usage,
                    cost,
                })
            }
            Err(e) => {
                limiter.release(reservation);
                Err(e)
            }
        }
    }

    async fn send(&self, request: &AiRequest, target: &Target) -> Result<(String, Value), ApiError> {
        let adapter = adapter_for(target.provider);
        let body = adapter.build_payload(request, &target.model);

        debug!("POST {} ({})", target.endpoint, target.model);

        let mut builder = self
            .client
            .post(&target.endpoint)
            .header("Content-Type", "application/json");
        for (name, value) in adapter.build_headers(target.api_key.as_deref()) {
            builder = builder.header(name, value);
        }

        let response = builder
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(target.provider, e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::RateLimited {
                provider: target.provider,
            });
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ApiError::Provider {
                provider: target.provider,
                detail: format!("{}: {}", status, error_text),
            });
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| self.transport_error(target.provider, e))?;

        let text = adapter.extract_text(&raw).ok_or_else(|| ApiError::Provider {
            provider: target.provider,
            detail: "response did not contain any text".to_string(),
        })?;

        Ok((text, raw))
    }

    /// Reported usage, estimating whatever the provider left out
    fn usage(&self, target: &Target, raw: &Value, text: &str, est_input: u64) -> TokenUsage {
        let (input, output) = adapter_for(target.provider).extract_usage(raw);
        TokenUsage {
            input_tokens: input.unwrap_or(est_input),
            output_tokens: output.unwrap_or_else(|| estimate_tokens(text)),
            reported: input.is_some() && output.is_some(),
        }
    }

    fn transport_error(&self, provider: ProviderId, error: reqwest::Error) -> ApiError {
        let detail = if error.is_timeout() {
            format!("request timed out after {}s", self.timeout.as_secs())
        } else {
            error.to_string()
        };
        ApiError::Provider { provider, detail }
    }
}

#[async_trait]
impl Dispatch for RequestDispatcher {
    async fn dispatch(&self, request: &AiRequest, config: &Config) -> Result<AiResponse, ApiError> {
        let target = self.resolve(request, config)?;

        match self.dispatch_once(request, &target).await {
            Err(ApiError::RateLimited { provider }) => {
                warn!(
                    "{} returned 429, retrying once in {}ms",
                    provider,
                    self.retry_delay.as_millis()
                );
                tokio::time::sleep(self.retry_delay).await;
                self.dispatch_once(request, &target).await
            }
            other => other,
        }
    }
}
