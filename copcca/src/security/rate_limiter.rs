//! In-memory sliding-window rate limiter for login and password-reset attempts.
//!
//! Each identifier (an email, phone or client IP) keeps the timestamps of its recent attempts.
//! Once `max_attempts` fall inside the window the identifier is blocked for `block_duration`.
//! State is per process and is lost on restart.

use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::RateLimitConfig;
use crate::errors::{Error, Result};

#[derive(Debug, Clone, Default)]
struct Entry {
    attempts: Vec<DateTime<Utc>>,
    blocked_until: Option<DateTime<Utc>>,
}

impl Entry {
    fn blocked_at(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until.is_some_and(|until| until > now)
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    entries: Arc<DashMap<String, Entry>>,
    window: Duration,
    max_attempts: usize,
    block_duration: Duration,
}

fn to_chrono(duration: std::time::Duration) -> Duration {
    Duration::from_std(duration).unwrap_or_else(|_| Duration::days(365))
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            window: to_chrono(config.window),
            max_attempts: config.max_attempts,
            block_duration: to_chrono(config.block_duration),
        }
    }

    /// Count an attempt. Returns false when the identifier is blocked or has just used up its
    /// allowance; the rejected attempt itself is not recorded.
    pub fn check_limit(&self, identifier: &str) -> bool {
        self.check_limit_at(identifier, Utc::now())
    }

    fn check_limit_at(&self, identifier: &str, now: DateTime<Utc>) -> bool {
        let mut entry = self.entries.entry(identifier.to_string()).or_default();

        if entry.blocked_at(now) {
            return false;
        }
        entry.blocked_until = None;

        let window_start = now - self.window;
        entry.attempts.retain(|t| *t > window_start);

        if entry.attempts.len() >= self.max_attempts {
            entry.blocked_until = Some(now + self.block_duration);
            debug!(identifier, "Rate limit exceeded, blocking");
            return false;
        }

        entry.attempts.push(now);
        true
    }

    /// Failed logins count exactly like any other attempt.
    pub fn record_failed_attempt(&self, identifier: &str) -> bool {
        self.check_limit(identifier)
    }

    pub fn reset(&self, identifier: &str) {
        self.entries.remove(identifier);
    }

    pub fn remaining_attempts(&self, identifier: &str) -> usize {
        self.remaining_attempts_at(identifier, Utc::now())
    }

    fn remaining_attempts_at(&self, identifier: &str, now: DateTime<Utc>) -> usize {
        let Some(entry) = self.entries.get(identifier) else {
            return self.max_attempts;
        };
        let window_start = now - self.window;
        let recent = entry.attempts.iter().filter(|t| **t > window_start).count();
        self.max_attempts.saturating_sub(recent)
    }

    /// Whole seconds until the block lifts, rounded up; 0 when not blocked.
    pub fn blocked_time_remaining(&self, identifier: &str) -> u64 {
        self.blocked_time_remaining_at(identifier, Utc::now())
    }

    fn blocked_time_remaining_at(&self, identifier: &str, now: DateTime<Utc>) -> u64 {
        let Some(until) = self.entries.get(identifier).and_then(|e| e.blocked_until) else {
            return 0;
        };
        if until <= now {
            return 0;
        }
        let millis = (until - now).num_milliseconds();
        ((millis + 999) / 1000) as u64
    }

    pub fn is_blocked(&self, identifier: &str) -> bool {
        self.entries.get(identifier).is_some_and(|e| e.blocked_at(Utc::now()))
    }

    /// Drop entries with nothing left inside the window that are not blocked. Returns the
    /// number of entries removed.
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Utc::now())
    }

    fn cleanup_at(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.window;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.blocked_at(now) || entry.attempts.iter().any(|t| *t > cutoff));
        before - self.entries.len()
    }

    /// Count an attempt, turning a rejection into a 429 with a retry hint.
    pub fn check_rate_limit(&self, identifier: &str) -> Result<()> {
        if self.check_limit(identifier) {
            return Ok(());
        }
        Err(self.too_many_attempts(identifier))
    }

    /// Like [`check_rate_limit`](Self::check_rate_limit) but without counting an attempt.
    pub fn ensure_not_blocked(&self, identifier: &str) -> Result<()> {
        if self.is_blocked(identifier) {
            Err(self.too_many_attempts(identifier))
        } else {
            Ok(())
        }
    }

    fn too_many_attempts(&self, identifier: &str) -> Error {
        let retry_after_secs = self.blocked_time_remaining(identifier);
        let minutes = retry_after_secs.div_ceil(60);
        Error::TooManyRequests {
            message: format!("Too many attempts. Please try again in {minutes} minutes."),
            retry_after_secs,
        }
    }

    pub fn spawn_cleanup(&self, interval: std::time::Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Rate limiter cleanup stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = limiter.cleanup();
                        if removed > 0 {
                            debug!(removed, "Swept stale rate limiter entries");
                        }
                    }
                }
            }
        })
    }
}

/// Best-effort client address from proxy headers.
pub fn client_ip(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    header("cf-connecting-ip")
        .or_else(|| header("x-real-ip"))
        .or_else(|| {
            header("x-forwarded-for").and_then(|v| v.split(',').next().map(|first| first.trim().to_string()))
        })
        .or_else(|| header("x-client-ip"))
        .unwrap_or_else(|| "0.0.0.0".to_string())
}
