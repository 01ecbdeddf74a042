pub mod audit;
pub mod session;
pub mod usage;
pub mod user;

pub use audit::{AuditEvent, AuditFilter, AuditPage, NewAuditEvent};
pub use session::AgentSession;
pub use usage::UsageSnapshot;
pub use user::{AdminUserView, UserAccount};
