// handlers/admin/audit_logs.rs - GET /admin/audit-logs, DELETE /admin/audit-logs/clear

use axum::{
    extract::{Query, State},
    Extension,
};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::database::models::AuditPage;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::Actor;
use crate::state::AppState;

/**
 * GET /admin/audit-logs - filtered, paginated audit trail (moderator)
 *
 * Query: `action`, `resource_type`, `user_id`, `start_date`, `end_date`
 * (RFC 3339), `limit` (1-100, default 50), `offset` (default 0).
 * Unknown parameters are rejected.
 *
 * Output: `{ "logs": [...], "total", "limit", "offset" }`, newest first.
 */
pub async fn audit_logs_get(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<AuditPage> {
    let page = state.audit_logs.query(&actor, &params).await?;
    Ok(ApiResponse::success(page))
}

/// DELETE /admin/audit-logs/clear - remove every audit event (admin).
/// The clear itself is recorded as the first event of the new trail.
pub async fn audit_logs_clear(State(state): State<AppState>, Extension(actor): Extension<Actor>) -> ApiResult<Value> {
    let deleted = state.audit_logs.clear(&actor).await?;
    Ok(ApiResponse::success(json!({ "deleted_count": deleted })))
}
