// handlers/public/auth/login.rs - POST /auth/login

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
};

use super::client_info;
use crate::error::ApiError;
use crate::identity::AuthSession;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/**
 * POST /auth/login - exchange credentials for provider tokens
 *
 * Input: `{ "email": "string", "password": "string" }`
 *
 * Output: `{ "success": true, "data": { "access_token", "refresh_token", "expires_in", "user": { "id", "email" } } }`
 *
 * A wrong password counts towards the failed-login limit for this IP and
 * email; ten in fifteen minutes blocks the IP.
 */
pub async fn login_post(State(state): State<AppState>, request: Request<Body>) -> ApiResult<AuthSession> {
    let client = client_info(&request, state.config.security.trust_forwarded_for);
    let body = to_bytes(request.into_body(), state.config.api.max_request_size_bytes)
        .await
        .map_err(|_| ApiError::bad_request("Unreadable request body"))?;

    let session = state.sessions.login(&client, &body).await?;
    Ok(ApiResponse::success(session))
}
