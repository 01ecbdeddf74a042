use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::collections::HashMap;
use uuid::Uuid;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{
    AgentSession, AuditEvent, AuditFilter, AuditPage, NewAuditEvent, UsageSnapshot, UserAccount,
};
use crate::database::repository::AdminStore;
use crate::types::{Role, SubscriptionTier};

const AUDIT_COLUMNS: &str = "id, user_id, user_email, action, resource_type, resource_id, \
     details, ip_address, user_agent, created_at";

/// Store backed by the hosted Postgres database.
///
/// Tables: `profiles`, `user_roles`, `subscriptions`, `agent_sessions`,
/// `user_usage`, `audit_logs`. Their schema is owned by the hosting backend.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_role(raw: &str) -> Result<Role, DatabaseError> {
    raw.parse()
        .map_err(|e: crate::types::UnknownRole| DatabaseError::QueryError(e.to_string()))
}

fn parse_tier(raw: &str) -> Result<SubscriptionTier, DatabaseError> {
    raw.parse().map_err(DatabaseError::QueryError)
}

fn push_audit_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &AuditFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(action) = filter.action {
        qb.push(" AND action = ").push_bind(action.as_str().to_string());
    }
    if let Some(resource_type) = &filter.resource_type {
        qb.push(" AND resource_type = ").push_bind(resource_type.clone());
    }
    if let Some(user_id) = filter.user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(start) = filter.start_date {
        qb.push(" AND created_at >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        qb.push(" AND created_at <= ").push_bind(end);
    }
}

#[async_trait]
impl AdminStore for PgStore {
    async fn ping(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }

    async fn find_role(&self, user_id: Uuid) -> Result<Option<Role>, DatabaseError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT role FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|(role,)| parse_role(&role)).transpose()
    }

    async fn set_role(&self, user_id: Uuid, role: Role) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO user_roles (user_id, role, updated_at) VALUES ($1, $2, now())
             ON CONFLICT (user_id) DO UPDATE SET role = EXCLUDED.role, updated_at = now()",
        )
        .bind(user_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn roles_by_user(&self) -> Result<HashMap<Uuid, Role>, DatabaseError> {
        let rows: Vec<(Uuid, String)> = sqlx::query_as("SELECT user_id, role FROM user_roles")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|(id, role)| parse_role(&role).map(|r| (id, r)))
            .collect()
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserAccount>, DatabaseError> {
        let user = sqlx::query_as::<_, UserAccount>(
            "SELECT id, email, created_at FROM profiles WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<UserAccount>, DatabaseError> {
        let users = sqlx::query_as::<_, UserAccount>(
            "SELECT id, email, created_at FROM profiles ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn session_counts_by_user(&self) -> Result<HashMap<Uuid, i64>, DatabaseError> {
        let rows: Vec<(Uuid, i64)> =
            sqlx::query_as("SELECT user_id, COUNT(*) FROM agent_sessions GROUP BY user_id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    async fn count_users(&self) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM profiles")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_sessions(&self) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM agent_sessions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn sessions_since(&self, since: DateTime<Utc>) -> Result<Vec<AgentSession>, DatabaseError> {
        let sessions = sqlx::query_as::<_, AgentSession>(
            "SELECT id, user_id, agent_type, created_at FROM agent_sessions
             WHERE created_at >= $1 ORDER BY created_at DESC",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    async fn find_subscription_tier(&self, user_id: Uuid) -> Result<Option<SubscriptionTier>, DatabaseError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT tier FROM subscriptions WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|(tier,)| parse_tier(&tier)).transpose()
    }

    async fn set_subscription_tier(&self, user_id: Uuid, tier: SubscriptionTier) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO subscriptions (user_id, tier, updated_at) VALUES ($1, $2, now())
             ON CONFLICT (user_id) DO UPDATE SET tier = EXCLUDED.tier, updated_at = now()",
        )
        .bind(user_id)
        .bind(tier.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn subscription_tiers(&self) -> Result<HashMap<Uuid, SubscriptionTier>, DatabaseError> {
        let rows: Vec<(Uuid, String)> = sqlx::query_as("SELECT user_id, tier FROM subscriptions")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|(id, tier)| parse_tier(&tier).map(|t| (id, t)))
            .collect()
    }

    async fn usage_snapshots(&self) -> Result<Vec<UsageSnapshot>, DatabaseError> {
        let rows = sqlx::query(
            "SELECT u.user_id, p.email, COALESCE(s.tier, 'free') AS tier,
                    u.credits_used, u.canvases_used, u.updated_at
             FROM user_usage u
             LEFT JOIN profiles p ON p.id = u.user_id
             LEFT JOIN subscriptions s ON s.user_id = u.user_id
             ORDER BY u.credits_used DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<UsageSnapshot, DatabaseError> {
                let tier: String = row.try_get("tier")?;
                Ok(UsageSnapshot {
                    user_id: row.try_get("user_id")?,
                    email: row.try_get("email")?,
                    tier: parse_tier(&tier)?,
                    credits_used: row.try_get("credits_used")?,
                    canvases_used: row.try_get("canvases_used")?,
                    updated_at: row.try_get("updated_at")?,
                })
            })
            .collect()
    }

    async fn insert_audit_event(&self, event: &NewAuditEvent) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO audit_logs
                (user_id, user_email, action, resource_type, resource_id, details, ip_address, user_agent)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(event.user_id)
        .bind(&event.user_email)
        .bind(event.action.as_str())
        .bind(&event.resource_type)
        .bind(&event.resource_id)
        .bind(serde_json::Value::Object(event.details.clone()))
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn query_audit_events(&self, filter: &AuditFilter) -> Result<AuditPage, DatabaseError> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM audit_logs");
        push_audit_filters(&mut count_qb, filter);
        let (total,): (i64,) = count_qb.build_query_as::<(i64,)>().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM audit_logs", AUDIT_COLUMNS));
        push_audit_filters(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);
        let logs = qb.build_query_as::<AuditEvent>().fetch_all(&self.pool).await?;

        Ok(AuditPage {
            logs,
            total,
            limit: filter.limit,
            offset: filter.offset,
        })
    }

    async fn audit_events_since(&self, since: DateTime<Utc>) -> Result<Vec<AuditEvent>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM audit_logs WHERE created_at >= $1 ORDER BY created_at DESC",
            AUDIT_COLUMNS
        );
        let events = sqlx::query_as::<_, AuditEvent>(&sql)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;
        Ok(events)
    }

    async fn clear_audit_events(&self) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM audit_logs").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
