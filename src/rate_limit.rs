//! Fixed-window request throttling.
//!
//! One counter per identifier, process-local and never shared across
//! instances. Fixed windows allow a burst of up to twice the limit at a
//! window boundary; that imprecision is accepted because the limiter exists
//! for coarse abuse protection, not metering.

use crate::clock::Clock;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Counter state for one identifier's current window.
#[derive(Debug, Clone)]
struct RateLimitWindow {
    count: u32,
    reset_at: i64,
}

/// Outcome of a rate-limit check. Exceeding the limit is a normal
/// `allowed = false` result, never an error; the caller decides how to
/// reject (HTTP 429, retry hints).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests left in the current window.
    pub remaining: u32,
    /// Epoch milliseconds at which the window resets.
    pub reset_at: i64,
}

/// Process-local fixed-window rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, RateLimitWindow>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            clock,
        }
    }

    /// Count one request against `identifier`'s current window.
    ///
    /// A fresh window starts on the first request or once the previous
    /// window's reset time has passed. Expired windows for other
    /// identifiers are swept on each call, bounding memory for identifiers
    /// no longer active.
    pub fn check(&self, identifier: &str, max_requests: u32, window_ms: i64) -> RateLimitDecision {
        let now = self.clock.now_ms();
        self.windows.retain(|_, window| window.reset_at > now);

        let mut window = self
            .windows
            .entry(identifier.to_string())
            .or_insert_with(|| RateLimitWindow {
                count: 0,
                reset_at: now + window_ms,
            });

        window.count += 1;
        if window.count > max_requests {
            debug!(identifier = identifier, "Rate limit exceeded");
            RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at: window.reset_at,
            }
        } else {
            RateLimitDecision {
                allowed: true,
                remaining: max_requests - window.count,
                reset_at: window.reset_at,
            }
        }
    }

    /// Number of identifiers with a live window.
    pub fn tracked_identifiers(&self) -> usize {
        self.windows.len()
    }

    /// Clear all window state.
    pub fn shutdown(&self) {
        self.windows.clear();
    }
}
