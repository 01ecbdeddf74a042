// handlers/protected/auth/me.rs - GET /auth/me

use axum::{extract::State, Extension};

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::sessions::CallerProfile;
use crate::services::Actor;
use crate::state::AppState;

/// GET /auth/me - the caller's id, email and resolved role
pub async fn me_get(State(state): State<AppState>, Extension(actor): Extension<Actor>) -> ApiResult<CallerProfile> {
    Ok(ApiResponse::success(state.sessions.me(&actor).await))
}
