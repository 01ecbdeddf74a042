use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use super::client::{client_ip, user_agent};
use crate::auth::validate_jwt;
use crate::error::ApiError;
use crate::sanitize::sanitize_text;
use crate::services::Actor;
use crate::state::AppState;

const MAX_USER_AGENT: usize = 512;

/// Raw access token of the current request, kept for sign-out
#[derive(Clone, Debug)]
pub struct BearerToken(pub String);

/// Bearer-token middleware: verifies the provider-issued JWT and injects the
/// caller as an [`Actor`] extension. The role is not read from the token.
pub async fn bearer_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(request.headers()).map_err(ApiError::unauthorized)?;

    let claims = validate_jwt(&token, &state.config.identity.jwt_secret).map_err(|e| {
        tracing::debug!("Rejected bearer token: {}", e);
        ApiError::unauthorized("Invalid or expired token")
    })?;

    let actor = Actor::new(claims.sub, claims.email).with_network(
        client_ip(&request, state.config.security.trust_forwarded_for),
        user_agent(request.headers()).map(|ua| sanitize_text(&ua, MAX_USER_AGENT)),
    );

    request.extensions_mut().insert(actor);
    request.extensions_mut().insert(BearerToken(token));

    Ok(next.run(request).await)
}

/// Extract the token from `Authorization: Bearer <token>`
fn extract_bearer(headers: &HeaderMap) -> Result<String, &'static str> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or("Missing Authorization header")?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format")?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        Some(_) => Err("Empty bearer token"),
        None => Err("Authorization header must use Bearer token format"),
    }
}
