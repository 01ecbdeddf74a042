use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AgentSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub agent_type: String,
    pub created_at: DateTime<Utc>,
}
