// handlers/admin/users.rs - user listing, role and subscription management

use axum::{
    body::Bytes,
    extract::{Path, State},
    Extension,
};

use super::target_user_id;
use crate::database::models::AdminUserView;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::authz::RoleLookup;
use crate::services::users::{RoleChange, SubscriptionChange};
use crate::services::Actor;
use crate::state::AppState;

/**
 * GET /admin/users - every user, newest first (admin)
 *
 * Output: `[{ "id", "email", "role", "session_count", "subscription_tier", "created_at" }]`
 */
pub async fn users_get(State(state): State<AppState>, Extension(actor): Extension<Actor>) -> ApiResult<Vec<AdminUserView>> {
    let users = state.users.list_users(&actor).await?;
    Ok(ApiResponse::success(users))
}

/**
 * GET /admin/users/:id/role - resolved role of one user (admin)
 *
 * Output: `{ "user_id", "role", "assigned" }` where `assigned` is false when
 * the user has no stored role and the default applies.
 */
pub async fn user_role_get(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> ApiResult<RoleLookup> {
    let target = target_user_id(&state, &actor, &id).await?;
    let lookup = state.gate.role_of(&actor, target).await?;
    Ok(ApiResponse::success(lookup))
}

/**
 * POST /admin/users/:id/role - change a user's role (admin)
 *
 * Input: `{ "role": "user" | "moderator" | "admin" }`
 *
 * Output: `{ "user_id", "old_role", "new_role" }`
 *
 * Admins cannot change their own role. Setting the role a user already has
 * is a conflict.
 */
pub async fn user_role_post(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<RoleChange> {
    let target = target_user_id(&state, &actor, &id).await?;
    let change = state.users.update_role(&actor, target, &body).await?;
    Ok(ApiResponse::success(change))
}

/**
 * POST /admin/users/:id/subscription - revoke a premium subscription (admin)
 *
 * Input: `{ "action": "revoke" }`
 *
 * Output: `{ "user_id", "previous_tier", "subscription_tier" }`
 */
pub async fn user_subscription_post(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<SubscriptionChange> {
    let target = target_user_id(&state, &actor, &id).await?;
    let change = state.users.revoke_subscription(&actor, target, &body).await?;
    Ok(ApiResponse::success(change))
}
