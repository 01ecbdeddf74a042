use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use super::clock::Clock;

/// Outcome of counting one request against an identifier's window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32, reset_at: DateTime<Utc> },
    Limited { retry_after_secs: u64 },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

/// Fixed-window request counter keyed by an identifier (usually IP + route).
///
/// The in-memory implementation serves a single process; a shared backend
/// can implement the same trait for multi-instance deployments.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Count one request. A window that has elapsed is replaced, not extended.
    async fn hit(&self, key: &str, max_requests: u32, window: Duration) -> RateDecision;

    /// Evict expired windows, touching at most `batch` keys per lock pass.
    /// Returns how many entries were removed.
    async fn sweep(&self, batch: usize) -> usize;

    async fn len(&self) -> usize;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: DateTime<Utc>,
}

pub struct InMemoryRateLimiter {
    windows: DashMap<String, Window>,
    clock: Arc<dyn Clock>,
    /// Extra lifetime past `reset_at` before a window is swept
    grace: Duration,
}

impl InMemoryRateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            clock,
            grace: Duration::seconds(60),
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimiter {
    async fn hit(&self, key: &str, max_requests: u32, window: Duration) -> RateDecision {
        let now = self.clock.now();
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            reset_at: now + window,
        });

        if now > entry.reset_at {
            *entry = Window {
                count: 0,
                reset_at: now + window,
            };
        }
        entry.count = entry.count.saturating_add(1);

        if entry.count > max_requests {
            let remaining_ms = (entry.reset_at - now).num_milliseconds().max(0) as u64;
            let retry_after_secs = remaining_ms.div_ceil(1000).max(1);
            RateDecision::Limited { retry_after_secs }
        } else {
            RateDecision::Allowed {
                remaining: max_requests - entry.count,
                reset_at: entry.reset_at,
            }
        }
    }

    async fn sweep(&self, batch: usize) -> usize {
        let cutoff = self.clock.now() - self.grace;
        let expired: Vec<String> = self
            .windows
            .iter()
            .filter(|e| e.reset_at < cutoff)
            .map(|e| e.key().clone())
            .collect();

        let mut removed = 0;
        for chunk in expired.chunks(batch.max(1)) {
            for key in chunk {
                if self.windows.remove_if(key, |_, w| w.reset_at < cutoff).is_some() {
                    removed += 1;
                }
            }
            tokio::task::yield_now().await;
        }
        removed
    }

    async fn len(&self) -> usize {
        self.windows.len()
    }
}
