// handlers/admin/stats.rs - GET /admin/stats

use axum::{extract::State, Extension};

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{AdminStats, Actor};
use crate::state::AppState;

/**
 * GET /admin/stats - dashboard figures (moderator)
 *
 * Totals, 24h login/logout counts, most active users, agent usage, 7-day
 * action and resource breakdowns, a 7-day timeline (one bucket per local
 * day, oldest first) and a 24-hour timeline (one bucket per hour).
 *
 * Day boundaries follow the server's local timezone.
 */
pub async fn stats_get(State(state): State<AppState>, Extension(actor): Extension<Actor>) -> ApiResult<AdminStats> {
    let stats = state.analytics.stats(&actor, &chrono::Local).await?;
    Ok(ApiResponse::success(stats))
}
