//! API response structures

use crate::catalog::Pricing;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response from a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiResponse {
    /// The model's answer
    pub text: String,

    /// Untouched provider payload
    pub raw: Value,

    /// Token usage (reported or estimated)
    pub usage: TokenUsage,

    /// Cost of the call in USD
    pub cost: Cost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// False when either count had to be estimated
    pub reported: bool,
}

/// USD cost of one call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Cost {
    pub sum: f64,
    pub input_cost: f64,
    pub output_cost: f64,
}

impl Cost {
    /// Cost from catalog pricing; unknown pricing is free
    pub fn from_usage(usage: &TokenUsage, pricing: Option<Pricing>) -> Self {
        let Some(pricing) = pricing else {
            return Self::default();
        };

        let input_cost = usage.input_tokens as f64 / 1_000_000.0 * pricing.input_cost_per_million;
        let output_cost =
            usage.output_tokens as f64 / 1_000_000.0 * pricing.output_cost_per_million;

        Self {
            sum: input_cost + output_cost,
            input_cost,
            output_cost,
        }
    }
}
