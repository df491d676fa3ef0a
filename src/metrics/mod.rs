//! Token and cost accounting across dispatches

use crate::api::AiResponse;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Usage for one provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderUsage {
    pub request_count: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

/// Token usage metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageMetrics {
    /// Total input tokens used
    pub total_input_tokens: u64,
    /// Total output tokens used
    pub total_output_tokens: u64,
    /// Number of successful API requests
    pub request_count: u64,
    /// Requests whose usage had to be estimated
    pub estimated_count: u64,
    /// Total cost (USD)
    pub total_cost: f64,
    /// Per-provider breakdown
    pub providers: BTreeMap<String, ProviderUsage>,
}

impl UsageMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, provider: &str, response: &AiResponse) {
        let usage = &response.usage;
        self.total_input_tokens += usage.input_tokens;
        self.total_output_tokens += usage.output_tokens;
        self.request_count += 1;
        if !usage.reported {
            self.estimated_count += 1;
        }
        self.total_cost += response.cost.sum;

        let entry = self.providers.entry(provider.to_string()).or_default();
        entry.request_count += 1;
        entry.input_tokens += usage.input_tokens;
        entry.output_tokens += usage.output_tokens;
        entry.cost_usd += response.cost.sum;
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_input_tokens + self.total_output_tokens
    }

    pub fn average_cost_per_request(&self) -> f64 {
        if self.request_count == 0 {
            return 0.0;
        }
        self.total_cost / self.request_count as f64
    }
}

/// Thread-safe metrics tracker
#[derive(Clone, Default)]
pub struct MetricsTracker {
    inner: Arc<Mutex<UsageMetrics>>,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, provider: &str, response: &AiResponse) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.record(provider, response);
        }
    }

    pub fn get_metrics(&self) -> UsageMetrics {
        self.inner
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn summary(&self) -> MetricsSummary {
        let metrics = self.get_metrics();
        MetricsSummary {
            total_tokens: metrics.total_tokens(),
            request_count: metrics.request_count,
            estimated_count: metrics.estimated_count,
            total_cost: metrics.total_cost,
            avg_cost_per_request: metrics.average_cost_per_request(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub total_tokens: u64,
    pub request_count: u64,
    pub estimated_count: u64,
    pub total_cost: f64,
    pub avg_cost_per_request: f64,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Usage Summary ===")?;
        writeln!(f, "Total requests: {}", self.request_count)?;
        writeln!(f, "Total tokens: {}", self.total_tokens)?;
        if self.estimated_count > 0 {
            writeln!(f, "Requests with estimated usage: {}", self.estimated_count)?;
        }
        writeln!(f, "Total cost: ${:.4}", self.total_cost)?;
        writeln!(f, "Avg cost/request: ${:.4}", self.avg_cost_per_request)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Cost, TokenUsage};
    use serde_json::Value;

    fn response(input: u64, output: u64, cost: f64, reported: bool) -> AiResponse {
        AiResponse {
            text: String::new(),
            raw: Value::Null,
            usage: TokenUsage {
                input_tokens: input,
                output_tokens: output,
                reported,
            },
            cost: Cost {
                sum: cost,
                input_cost: cost,
                output_cost: 0.0,
            },
        }
    }

    #[test]
    fn test_record_accumulates_per_provider() {
        let tracker = MetricsTracker::new();
        tracker.record("openai", &response(100, 50, 0.5, true));
        tracker.record("openai", &response(10, 5, 0.25, false));
        tracker.record("ollama", &response(1, 1, 0.0, true));

        let metrics = tracker.get_metrics();
        assert_eq!(metrics.request_count, 3);
        assert_eq!(metrics.total_tokens(), 167);
        assert_eq!(metrics.estimated_count, 1);
        assert_eq!(metrics.providers["openai"].request_count, 2);
        assert_eq!(metrics.providers["openai"].cost_usd, 0.75);
    }

    #[test]
    fn test_summary_display() {
        let tracker = MetricsTracker::new();
        tracker.record("groq", &response(10, 10, 1.0, true));
        let text = tracker.summary().to_string();
        assert!(text.contains("Total requests: 1"));
        assert!(text.contains("$1.0000"));
    }
}
