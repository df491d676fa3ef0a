//! Client-side sliding-window rate limiting
//!
//! One [`RateLimiter`] tracks the requests and token volume sent to a single
//! provider/model pair over the last 60 seconds. Limiting is advisory: it
//! keeps us under the published caps but the provider remains the authority
//! and may still answer with HTTP 429.

mod registry;

pub use registry::{LimiterRegistry, SharedLimiter};

use crate::catalog::RateLimits;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Length of the sliding window
pub const WINDOW: Duration = Duration::from_secs(60);

/// Shortest wait ever returned, to avoid busy polling
pub const MIN_WAIT: Duration = Duration::from_millis(100);

/// One recorded (or reserved) call inside the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageEntry {
    pub timestamp: Instant,
    pub input_tokens: u64,
    pub output_tokens: u64,
    reservation: Option<u64>,
}

/// Handle to capacity claimed by [`RateLimiter::try_reserve`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a reservation must be settled or released"]
pub struct Reservation(u64);

/// Sliding-window usage counter for one provider/model pair
#[derive(Debug)]
pub struct RateLimiter {
    limits: Option<RateLimits>,
    entries: VecDeque<UsageEntry>,
    next_reservation: u64,
}

impl RateLimiter {
    /// Create a limiter; `None` limits disable all checks
    pub fn new(limits: Option<RateLimits>) -> Self {
        Self {
            limits,
            entries: VecDeque::new(),
            next_reservation: 0,
        }
    }

    pub fn limits(&self) -> Option<RateLimits> {
        self.limits
    }

    pub fn can_proceed(&mut self, est_input_tokens: u64, max_output_tokens: u64) -> bool {
        self.can_proceed_at(Instant::now(), est_input_tokens, max_output_tokens)
    }

    pub fn wait_millis(&mut self, est_input_tokens: u64, max_output_tokens: u64) -> u64 {
        self.wait_at(Instant::now(), est_input_tokens, max_output_tokens)
            .as_millis() as u64
    }

    pub fn record_usage(&mut self, input_tokens: u64, output_tokens: u64) {
        self.record_usage_at(Instant::now(), input_tokens, output_tokens)
    }

    /// Whether a call with the given token estimates fits in the window at `now`
    pub fn can_proceed_at(&mut self, now: Instant, est_input_tokens: u64, max_output_tokens: u64) -> bool {
        self.prune(now);
        let Some(limits) = self.limits else {
            return true;
        };

        let (count, input, output) = self.totals();
        count < limits.requests_per_minute as u64
            && input + est_input_tokens <= limits.input_tokens_per_minute
            && output + max_output_tokens <= limits.output_tokens_per_minute
    }

    /// Whether a call could never fit, even in an empty window
    pub fn exceeds_caps(&self, est_input_tokens: u64, max_output_tokens: u64) -> bool {
        match self.limits {
            Some(limits) => {
                limits.requests_per_minute == 0
                    || est_input_tokens > limits.input_tokens_per_minute
                    || max_output_tokens > limits.output_tokens_per_minute
            }
            None => false,
        }
    }

    /// How long to wait before the call could fit, zero if it fits now
    pub fn wait_at(&mut self, now: Instant, est_input_tokens: u64, max_output_tokens: u64) -> Duration {
        if self.can_proceed_at(now, est_input_tokens, max_output_tokens) {
            return Duration::ZERO;
        }

        // Nothing to age out: the request alone exceeds a cap
        let Some(oldest) = self.entries.front() else {
            return WINDOW;
        };

        let age = now.saturating_duration_since(oldest.timestamp);
        WINDOW.saturating_sub(age).max(MIN_WAIT)
    }

    pub fn record_usage_at(&mut self, now: Instant, input_tokens: u64, output_tokens: u64) {
        self.entries.push_back(UsageEntry {
            timestamp: now,
            input_tokens,
            output_tokens,
            reservation: None,
        });
        self.prune(now);
    }

    /// Check and claim capacity in one step.
    ///
    /// On success the estimates are entered into the window immediately, so a
    /// second caller sharing this limiter sees them. On failure returns the
    /// wait before retrying.
    pub fn try_reserve(
        &mut self,
        now: Instant,
        est_input_tokens: u64,
        max_output_tokens: u64,
    ) -> Result<Reservation, Duration> {
        let wait = self.wait_at(now, est_input_tokens, max_output_tokens);
        if !wait.is_zero() {
            return Err(wait);
        }

        let id = self.next_reservation;
        self.next_reservation += 1;
        self.entries.push_back(UsageEntry {
            timestamp: now,
            input_tokens: est_input_tokens,
            output_tokens: max_output_tokens,
            reservation: Some(id),
        });
        Ok(Reservation(id))
    }

    /// Replace a reservation's estimates with the tokens actually used.
    ///
    /// The entry keeps its original timestamp. If it has already aged out of
    /// the window nothing is recorded.
    pub fn settle(&mut self, reservation: Reservation, input_tokens: u64, output_tokens: u64) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.reservation == Some(reservation.0))
        {
            entry.input_tokens = input_tokens;
            entry.output_tokens = output_tokens;
            entry.reservation = None;
        }
    }

    /// Drop a reservation for a call that never completed
    pub fn release(&mut self, reservation: Reservation) {
        self.entries.retain(|e| e.reservation != Some(reservation.0));
    }

    /// Entries currently inside the window at `now`
    pub fn entries_at(&mut self, now: Instant) -> impl Iterator<Item = &UsageEntry> {
        self.prune(now);
        self.entries.iter()
    }

    fn totals(&self) -> (u64, u64, u64) {
        self.entries.iter().fold((0, 0, 0), |(c, i, o), e| {
            (c + 1, i + e.input_tokens, o + e.output_tokens)
        })
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.entries.front() {
            if now.saturating_duration_since(front.timestamp) >= WINDOW {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }
}
