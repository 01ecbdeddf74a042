use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::failed_login::AbuseGuard;
use super::rate_limit::RateLimitStore;

/// Periodically evict expired rate-limit windows and idle failed-login entries.
///
/// Runs off the request path; each sweep visits at most `batch` keys between
/// yields. Abort the returned handle on shutdown.
pub fn spawn_sweeper(
    limiter: Arc<dyn RateLimitStore>,
    guard: Arc<AbuseGuard>,
    every: Duration,
    batch: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // first tick fires immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let windows = limiter.sweep(batch).await;
            let logins = guard.sweep(batch).await;
            if windows > 0 || logins > 0 {
                tracing::debug!(windows, logins, "Swept expired abuse-table entries");
            }
        }
    })
}
