use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::SubscriptionTier;

/// Cumulative usage counters for one user, joined with their current tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub tier: SubscriptionTier,
    pub credits_used: i64,
    pub canvases_used: i64,
    pub updated_at: Option<DateTime<Utc>>,
}
