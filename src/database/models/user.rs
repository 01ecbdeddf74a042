use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::{Role, SubscriptionTier};

/// Profile row mirrored from the identity provider
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserAccount {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Row returned by `GET /admin/users`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUserView {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub session_count: i64,
    pub subscription_tier: SubscriptionTier,
    pub created_at: DateTime<Utc>,
}
