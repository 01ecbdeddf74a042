use axum::{
    extract::{Request, State},
    http::{header, Method},
    middleware::Next,
    response::Response,
};

use super::client::client_ip;
use crate::error::ApiError;
use crate::security::{detect_attack, origin_allowed};
use crate::state::AppState;

/// Runs before routing: rejects blocked IPs and requests whose path or
/// query carries a known attack pattern.
pub async fn request_guard_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = client_ip(&request, state.config.security.trust_forwarded_for);

    if let Some(ip) = ip.as_deref() {
        if state.abuse.is_blocked(ip) {
            tracing::warn!(ip = %ip, path = %request.uri().path(), "Request from blocked IP");
            return Err(ApiError::forbidden("Access denied"));
        }
    }

    if let Some(kind) = detect_attack(request.uri().path(), request.uri().query()) {
        tracing::warn!(
            ip = ip.as_deref().unwrap_or("unknown"),
            path = %request.uri().path(),
            attack = %kind,
            "Suspicious request rejected"
        );
        return Err(ApiError::bad_request("Request rejected"));
    }

    Ok(next.run(request).await)
}

fn is_mutating(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
}

/// Origin/CSRF check for state-changing methods
pub async fn origin_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if is_mutating(request.method()) {
        let origin = request.headers().get(header::ORIGIN).map(|v| v.to_str().unwrap_or(""));
        if !origin_allowed(origin, &state.config.security.allowed_origins) {
            tracing::warn!(origin = ?origin, path = %request.uri().path(), "Cross-origin request rejected");
            return Err(ApiError::forbidden("Origin not allowed"));
        }
    }
    Ok(next.run(request).await)
}
