//! In-memory sliding-window rate limiter.
//!
//! Counters are per process: they reset on restart and are not shared
//! between instances.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Outcome of a single rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Requests counted in the current window, including this one if allowed
    pub count: u64,
    pub allowed: bool,
    /// Seconds until the oldest counted request leaves the window
    pub retry_after: u64,
}

/// Sliding-window limiter keyed by client identifier
#[derive(Debug)]
pub struct RateLimiter {
    hits: DashMap<String, VecDeque<Instant>>,
    max_requests: u64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u64, window_seconds: u64) -> Self {
        Self {
            hits: DashMap::new(),
            max_requests,
            window: Duration::from_secs(window_seconds),
        }
    }

    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    /// Record a request from `key` and decide whether it may proceed.
    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut entry = self.hits.entry(key.to_string()).or_default();
        let window = self.window;

        while entry
            .front()
            .is_some_and(|oldest| now.saturating_duration_since(*oldest) >= window)
        {
            entry.pop_front();
        }

        let count = entry.len() as u64;
        if count >= self.max_requests {
            let retry_after = entry
                .front()
                .map(|oldest| window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(window);
            return RateDecision {
                count,
                allowed: false,
                retry_after: retry_after.as_secs().max(1),
            };
        }

        entry.push_back(now);
        RateDecision {
            count: count + 1,
            allowed: true,
            retry_after: 0,
        }
    }

    /// Drop clients with no requests inside the window.
    pub fn purge_idle(&self) {
        let now = Instant::now();
        let window = self.window;
        self.hits.retain(|_, hits| {
            hits.back()
                .is_some_and(|newest| now.saturating_duration_since(*newest) < window)
        });
    }

    /// Number of tracked clients
    pub fn tracked_clients(&self) -> usize {
        self.hits.len()
    }
}
