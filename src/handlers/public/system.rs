// handlers/public/system.rs - GET / and GET /health

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET / - service description and route map
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Admin Console API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Administrative API: roles, audit trail, usage statistics and subscription control",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "auth": "/auth/login, /auth/register (public); /auth/logout, /auth/me (bearer token)",
                "users": "/admin/users, /admin/users/:id/role, /admin/users/:id/subscription (admin)",
                "audit": "/admin/audit-logs (moderator), /admin/audit-logs/clear (admin)",
                "stats": "/admin/stats (moderator)",
                "credit_usage": "/admin/credit-usage (admin)",
                "security": "/admin/security/blocked, /admin/security/unblock (admin)"
            }
        }
    }))
}

/// GET /health - liveness plus a store ping
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = state.clock.now();

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": true,
                    "message": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
