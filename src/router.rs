use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::handlers::{admin, protected, public};
use crate::middleware::{bearer_auth_middleware, origin_middleware, rate_limit_middleware, request_guard_middleware};
use crate::state::AppState;

/// Assemble the full application.
///
/// Outermost first: trace, CORS, blocked-IP and attack-pattern guard, body
/// size limit, origin check. Per route: rate limit, then bearer auth on the
/// session and admin groups.
pub fn app(state: AppState) -> Router {
    let authenticated = Router::new()
        .merge(session_routes())
        .merge(admin_routes())
        .route_layer(from_fn_with_state(state.clone(), bearer_auth_middleware));

    Router::new()
        .merge(system_routes())
        .merge(auth_public_routes())
        .merge(authenticated)
        .route_layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(from_fn_with_state(state.clone(), origin_middleware))
        .layer(RequestBodyLimitLayer::new(state.config.api.max_request_size_bytes))
        .layer(from_fn_with_state(state.clone(), request_guard_middleware))
        .layer(cors_layer(&state.config.security.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn system_routes() -> Router<AppState> {
    use public::system;

    Router::new()
        .route("/", get(system::root))
        .route("/health", get(system::health))
}

fn auth_public_routes() -> Router<AppState> {
    use public::auth;

    Router::new()
        .route("/auth/login", post(auth::login_post))
        .route("/auth/register", post(auth::register_post))
}

fn session_routes() -> Router<AppState> {
    use protected::auth;

    Router::new()
        .route("/auth/logout", post(auth::logout_post))
        .route("/auth/me", get(auth::me_get))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        // Users
        .route("/admin/users", get(admin::users_get))
        .route("/admin/users/:id/role", get(admin::user_role_get).post(admin::user_role_post))
        .route("/admin/users/:id/subscription", post(admin::user_subscription_post))
        // Audit trail
        .route("/admin/audit-logs", get(admin::audit_logs_get))
        .route("/admin/audit-logs/clear", delete(admin::audit_logs_clear))
        // Reporting
        .route("/admin/stats", get(admin::stats_get))
        .route("/admin/credit-usage", get(admin::credit_usage_get))
        // Abuse control
        .route("/admin/security/blocked", get(admin::blocked_get))
        .route("/admin/security/unblock", post(admin::unblock_post))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if allowed_origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o.trim_end_matches('/')).ok())
        .collect();
    base.allow_origin(AllowOrigin::list(origins))
}
