// handlers/public/auth/register.rs - POST /auth/register

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
 * POST /auth/register - create an account with the identity provider
 *
 * Input: `{ "email": "string", "password": "string (8-128 chars)" }`
 *
 * Output (201): same shape as `/auth/login`.
 */
pub async fn register_post(State(state): State<AppState>, request: Request<Body>) -> ApiResult<AuthSession> {
    let client = client_info(&request, state.config.security.trust_forwarded_for);
    let body = to_bytes(request.into_body(), state.config.api.max_request_size_bytes)
        .await
        .map_err(|_| ApiError::bad_request("Unreadable request body"))?;

    let session = state.sessions.register(&client, &body).await?;
    Ok(ApiResponse::created(session))
}
