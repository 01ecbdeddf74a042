//! In-process abuse controls: per-identifier rate limiting, failed-login
//! tracking with automatic IP blocks, origin checks, attack-pattern
//! detection, and the background sweep that keeps the tables bounded.

pub mod clock;
pub mod failed_login;
pub mod origin;
pub mod patterns;
pub mod rate_limit;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use failed_login::{AbuseGuard, BlockedIp, LoginFailure};
pub use origin::origin_allowed;
pub use patterns::{detect_attack, AttackKind};
pub use rate_limit::{InMemoryRateLimiter, RateDecision, RateLimitStore};
pub use sweeper::spawn_sweeper;
