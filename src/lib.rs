//! qcode - route editor prompts to LLM providers and apply the edits they return
//!
//! The pieces, from the bottom up:
//!
//! - **Catalog**: static endpoints, default models, rate limits and pricing per provider
//! - **Limiter**: sliding 60-second windows of request and token usage per provider/model
//! - **Dispatch**: one canonical request translated to each provider's wire format,
//!   throttled, retried once on HTTP 429 and priced from the catalog
//! - **Changes**: tolerant decoding of a model's JSON edit array into validated edits
//! - **Apply**: position-based text edits and file operations confined to a workspace
//! - **Engine**: the prompt-in, text-out entry point tying the above together

pub mod api;
pub mod apply;
pub mod catalog;
pub mod changes;
pub mod config;
pub mod engine;
pub mod limiter;
pub mod metrics;
pub mod tui;

pub use api::{AiRequest, AiResponse, ApiError, Cost, Dispatch, RequestDispatcher, TokenUsage};
pub use apply::{apply_edit, ApplyError, ApplyReport, Workspace};
pub use catalog::{Pricing, ProviderId, RateLimits};
pub use changes::{parse_changes, Action, CodeChange, Edit, ParseError};
pub use config::{Config, ConfigBuilder, ConfigError, PromptMode};
pub use engine::{EditorContext, Engine, EngineError, ProjectType};
pub use limiter::{LimiterRegistry, RateLimiter};
pub use metrics::{MetricsTracker, UsageMetrics};
