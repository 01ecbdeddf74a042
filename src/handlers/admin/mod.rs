// handlers/admin/mod.rs - /admin/* endpoints
//
// Every handler here runs behind bearer authentication. The role check itself
// happens inside the service call, before the body is parsed, so a caller
// without the role never learns anything about the payload rules.

pub mod audit_logs;
pub mod credit_usage;
pub mod security;
pub mod stats;
pub mod users;

pub use audit_logs::{audit_logs_clear, audit_logs_get};
pub use credit_usage::credit_usage_get;
pub use security::{blocked_get, unblock_post};
pub use stats::stats_get;
pub use users::{user_role_get, user_role_post, user_subscription_post, users_get};

use uuid::Uuid;

use crate::error::ApiError;
use crate::services::{Actor, ServiceError};
use crate::state::AppState;

/// Resolve a `:id` path segment. A malformed id is reported as not found,
/// but only to admins; everyone else gets the gate rejection first.
pub(crate) async fn target_user_id(state: &AppState, actor: &Actor, raw: &str) -> Result<Uuid, ApiError> {
    match Uuid::parse_str(raw) {
        Ok(id) => Ok(id),
        Err(_) => {
            state.gate.require_admin(actor).await.map_err(ServiceError::from)?;
            Err(ApiError::not_found("User not found"))
        }
    }
}
