//! Registry of limiters keyed by provider and model

use super::RateLimiter;
use crate::catalog::{self, ProviderId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A limiter shared by every caller dispatching to the same provider/model.
///
/// The mutex is the critical section around check-then-record: hold it only
/// for a single limiter call, never across an await.
pub type SharedLimiter = Arc<Mutex<RateLimiter>>;

/// Lazily creates one limiter per provider/model pair.
///
/// Owned by a dispatcher; limiters live exactly as long as the registry.
#[derive(Default)]
pub struct LimiterRegistry {
    limiters: Mutex<HashMap<(ProviderId, String), SharedLimiter>>,
}

impl LimiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the limiter for a pair, creating it from the catalog on first use
    pub fn get(&self, provider: ProviderId, model: &str) -> SharedLimiter {
        let mut limiters = self
            .limiters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        limiters
            .entry((provider, model.to_string()))
            .or_insert_with(|| {
                Arc::new(Mutex::new(RateLimiter::new(catalog::rate_limits(
                    provider, model,
                ))))
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.limiters
            .lock()
            .map(|l| l.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
