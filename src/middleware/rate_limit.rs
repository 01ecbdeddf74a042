use axum::{
    extract::{MatchedPath, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use chrono::Duration;

use super::client::client_ip;
use crate::error::ApiError;
use crate::security::RateDecision;
use crate::state::AppState;

/// Per IP + route request limiting. Added with `route_layer`, so the matched
/// route template (not the concrete path) forms the key.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let api = &state.config.api;
    if !api.enable_rate_limiting {
        return Ok(next.run(request).await);
    }

    let ip = client_ip(&request, state.config.security.trust_forwarded_for).unwrap_or_else(|| "unknown".to_string());
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let key = format!("{}:{}", ip, route);

    let window = Duration::seconds(api.rate_limit_window_secs as i64);
    match state.rate_limiter.hit(&key, api.rate_limit_requests, window).await {
        RateDecision::Allowed { remaining, .. } => {
            let mut response = next.run(request).await;
            response
                .headers_mut()
                .insert("x-ratelimit-limit", HeaderValue::from(api.rate_limit_requests));
            response
                .headers_mut()
                .insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            Ok(response)
        }
        RateDecision::Limited { retry_after_secs } => {
            tracing::warn!(key = %key, retry_after_secs, "Rate limit exceeded");
            Err(ApiError::too_many_requests("Too many requests", retry_after_secs))
        }
    }
}
