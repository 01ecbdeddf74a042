// handlers/admin/credit_usage.rs - GET /admin/credit-usage

use axum::{extract::State, Extension};

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{Actor, CreditUsageReport};
use crate::state::AppState;

/// GET /admin/credit-usage - per-user credit and canvas consumption against plan limits (admin)
pub async fn credit_usage_get(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<CreditUsageReport> {
    let report = state.credit_usage.report(&actor).await?;
    Ok(ApiResponse::success(report))
}
