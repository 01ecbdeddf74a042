// handlers/admin/security.rs - IP block list

use axum::{body::Bytes, extract::State, Extension};

use crate::middleware::{ApiResponse, ApiResult};
use crate::security::BlockedIp;
use crate::services::security::UnblockResult;
use crate::services::Actor;
use crate::state::AppState;

/// GET /admin/security/blocked - currently blocked IPs with reason and time (admin)
pub async fn blocked_get(State(state): State<AppState>, Extension(actor): Extension<Actor>) -> ApiResult<Vec<BlockedIp>> {
    let blocked = state.security.blocked_ips(&actor).await?;
    Ok(ApiResponse::success(blocked))
}

/**
 * POST /admin/security/unblock - lift an IP block (admin)
 *
 * Input: `{ "ip": "203.0.113.9" }`
 *
 * Output: `{ "ip", "unblocked": true }`. An IP that is not blocked is 404.
 */
pub async fn unblock_post(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    body: Bytes,
) -> ApiResult<UnblockResult> {
    let result = state.security.unblock(&actor, &body).await?;
    Ok(ApiResponse::success(result))
}
