use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

use super::clock::Clock;
use crate::config::AbuseConfig;

#[derive(Debug, Clone, Copy)]
struct Attempts {
    count: u32,
    last_attempt: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockedIp {
    pub ip: String,
    pub reason: String,
    pub blocked_at: DateTime<Utc>,
}

/// Result of recording a failed login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginFailure {
    /// Failures accumulated for this IP + email pair
    pub attempts: u32,
    /// The IP is blocked after this failure
    pub blocked: bool,
}

/// Failed-login tracker keyed by IP + email, plus the IP block list it feeds.
///
/// Failures accumulate while each one lands within `horizon` of the previous
/// one; a success clears the pair. Reaching `threshold` blocks the IP until
/// [`AbuseGuard::unblock`] is called.
pub struct AbuseGuard {
    attempts: DashMap<String, Attempts>,
    blocked: DashMap<String, BlockedIp>,
    clock: Arc<dyn Clock>,
    threshold: u32,
    horizon: Duration,
}

impl AbuseGuard {
    pub fn new(config: &AbuseConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            attempts: DashMap::new(),
            blocked: DashMap::new(),
            clock,
            threshold: config.failed_login_threshold.max(1),
            horizon: Duration::seconds(config.failed_login_horizon_secs as i64),
        }
    }

    fn key(ip: &str, email: &str) -> String {
        format!("{}|{}", ip, email.trim().to_ascii_lowercase())
    }

    pub fn record_failure(&self, ip: &str, email: &str) -> LoginFailure {
        let now = self.clock.now();
        let attempts = {
            let mut entry = self.attempts.entry(Self::key(ip, email)).or_insert(Attempts {
                count: 0,
                last_attempt: now,
            });
            if now - entry.last_attempt > self.horizon {
                entry.count = 0;
            }
            entry.count = entry.count.saturating_add(1);
            entry.last_attempt = now;
            entry.count
        };

        let blocked = attempts >= self.threshold;
        if blocked && !self.blocked.contains_key(ip) {
            tracing::warn!(ip = %ip, attempts, "Blocking IP after repeated failed logins");
            self.block(ip, format!("{} failed login attempts", attempts));
        }

        LoginFailure { attempts, blocked }
    }

    pub fn record_success(&self, ip: &str, email: &str) {
        self.attempts.remove(&Self::key(ip, email));
    }

    /// Failures currently counted for the pair, ignoring an elapsed horizon
    pub fn attempts(&self, ip: &str, email: &str) -> u32 {
        let now = self.clock.now();
        self.attempts
            .get(&Self::key(ip, email))
            .filter(|a| now - a.last_attempt <= self.horizon)
            .map(|a| a.count)
            .unwrap_or(0)
    }

    pub fn block(&self, ip: &str, reason: impl Into<String>) {
        self.blocked.insert(
            ip.to_string(),
            BlockedIp {
                ip: ip.to_string(),
                reason: reason.into(),
                blocked_at: self.clock.now(),
            },
        );
    }

    pub fn is_blocked(&self, ip: &str) -> bool {
        self.blocked.contains_key(ip)
    }

    /// Lift a block and forget the IP's failure history. Returns whether the IP was blocked.
    pub fn unblock(&self, ip: &str) -> bool {
        let prefix = format!("{}|", ip);
        self.attempts.retain(|key, _| !key.starts_with(&prefix));
        self.blocked.remove(ip).is_some()
    }

    pub fn blocked_ips(&self) -> Vec<BlockedIp> {
        let mut ips: Vec<BlockedIp> = self.blocked.iter().map(|e| e.value().clone()).collect();
        ips.sort_by(|a, b| a.blocked_at.cmp(&b.blocked_at));
        ips
    }

    /// Drop failure entries idle past the horizon. Blocks are never swept.
    pub async fn sweep(&self, batch: usize) -> usize {
        let cutoff = self.clock.now() - self.horizon;
        let stale: Vec<String> = self
            .attempts
            .iter()
            .filter(|e| e.last_attempt < cutoff)
            .map(|e| e.key().clone())
            .collect();

        let mut removed = 0;
        for chunk in stale.chunks(batch.max(1)) {
            for key in chunk {
                if self.attempts.remove_if(key, |_, a| a.last_attempt < cutoff).is_some() {
                    removed += 1;
                }
            }
            tokio::task::yield_now().await;
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::clock::ManualClock;
    use chrono::TimeZone;

    fn guard() -> (AbuseGuard, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()));
        let config = AbuseConfig {
            failed_login_threshold: 10,
            failed_login_horizon_secs: 15 * 60,
            sweep_interval_secs: 60,
            sweep_batch: 64,
        };
        (AbuseGuard::new(&config, clock.clone()), clock)
    }

    #[test]
    fn tenth_failure_blocks_the_ip() {
        let (guard, clock) = guard();

        for i in 1..=9 {
            let outcome = guard.record_failure("1.2.3.4", "a@b.com");
            assert_eq!(outcome.attempts, i);
            assert!(!outcome.blocked);
            clock.advance(Duration::seconds(30));
        }
        assert!(!guard.is_blocked("1.2.3.4"));

        let tenth = guard.record_failure("1.2.3.4", "a@b.com");
        assert!(tenth.blocked);
        assert!(guard.is_blocked("1.2.3.4"));

        let eleventh = guard.record_failure("1.2.3.4", "a@b.com");
        assert_eq!(eleventh.attempts, 11);
        assert!(guard.is_blocked("1.2.3.4"));
        assert_eq!(guard.blocked_ips().len(), 1);
    }

    #[test]
    fn other_emails_keep_their_own_count() {
        let (guard, _clock) = guard();
        for _ in 0..10 {
            guard.record_failure("1.2.3.4", "a@b.com");
        }

        let other = guard.record_failure("1.2.3.4", "c@d.com");
        assert_eq!(other.attempts, 1);
        assert!(!other.blocked);
        assert_eq!(guard.attempts("1.2.3.4", "A@B.com"), 10);
        assert!(!guard.is_blocked("5.6.7.8"));
    }

    #[test]
    fn idle_horizon_resets_the_count() {
        let (guard, clock) = guard();
        for _ in 0..9 {
            guard.record_failure("1.2.3.4", "a@b.com");
        }
        clock.advance(Duration::minutes(16));

        let outcome = guard.record_failure("1.2.3.4", "a@b.com");
        assert_eq!(outcome.attempts, 1);
        assert!(!guard.is_blocked("1.2.3.4"));
    }

    #[test]
    fn success_clears_the_pair() {
        let (guard, _clock) = guard();
        for _ in 0..5 {
            guard.record_failure("1.2.3.4", "a@b.com");
        }
        guard.record_success("1.2.3.4", "a@b.com");
        assert_eq!(guard.attempts("1.2.3.4", "a@b.com"), 0);
    }

    #[test]
    fn block_persists_until_unblocked() {
        let (guard, clock) = guard();
        for _ in 0..10 {
            guard.record_failure("1.2.3.4", "a@b.com");
        }
        clock.advance(Duration::days(2));
        assert!(guard.is_blocked("1.2.3.4"));

        assert!(guard.unblock("1.2.3.4"));
        assert!(!guard.is_blocked("1.2.3.4"));
        assert_eq!(guard.attempts("1.2.3.4", "a@b.com"), 0);
        assert!(!guard.unblock("1.2.3.4"));
    }

    #[tokio::test]
    async fn sweep_drops_idle_entries_but_keeps_blocks() {
        let (guard, clock) = guard();
        for _ in 0..10 {
            guard.record_failure("1.2.3.4", "a@b.com");
        }
        guard.record_failure("9.9.9.9", "x@y.com");
        clock.advance(Duration::minutes(20));
        guard.record_failure("8.8.8.8", "z@y.com");

        assert_eq!(guard.sweep(1).await, 2);
        assert!(guard.is_blocked("1.2.3.4"));
        assert_eq!(guard.attempts("8.8.8.8", "z@y.com"), 1);
    }
}
