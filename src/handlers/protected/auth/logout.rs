// handlers/protected/auth/logout.rs - POST /auth/logout

use axum::{extract::State, Extension};
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult, BearerToken};
use crate::services::Actor;
use crate::state::AppState;

/// POST /auth/logout - revoke the caller's session with the identity provider
pub async fn logout_post(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> ApiResult<Value> {
    state.sessions.logout(&actor, &token).await?;
    Ok(ApiResponse::success(json!({ "logged_out": true })))
}
