use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    AgentSession, AuditEvent, AuditFilter, AuditPage, NewAuditEvent, UsageSnapshot, UserAccount,
};
use crate::types::{Role, SubscriptionTier};

/// Everything the console reads from or writes to the hosted relational store.
///
/// Implementations: [`PgStore`](crate::database::postgres::PgStore) for production,
/// [`InMemoryStore`](crate::database::memory::InMemoryStore) for tests and local runs,
/// and [`ResilientStore`](crate::database::resilient::ResilientStore) which wraps either
/// with per-call timeouts.
#[async_trait]
pub trait AdminStore: Send + Sync {
    async fn ping(&self) -> Result<(), DatabaseError>;

    // Roles
    async fn find_role(&self, user_id: Uuid) -> Result<Option<Role>, DatabaseError>;
    async fn set_role(&self, user_id: Uuid, role: Role) -> Result<(), DatabaseError>;
    async fn roles_by_user(&self) -> Result<HashMap<Uuid, Role>, DatabaseError>;

    // Users and sessions
    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserAccount>, DatabaseError>;
    async fn list_users(&self) -> Result<Vec<UserAccount>, DatabaseError>;
    async fn session_counts_by_user(&self) -> Result<HashMap<Uuid, i64>, DatabaseError>;
    async fn count_users(&self) -> Result<i64, DatabaseError>;
    async fn count_sessions(&self) -> Result<i64, DatabaseError>;
    async fn sessions_since(&self, since: DateTime<Utc>) -> Result<Vec<AgentSession>, DatabaseError>;

    // Subscriptions and usage
    async fn find_subscription_tier(&self, user_id: Uuid) -> Result<Option<SubscriptionTier>, DatabaseError>;
    async fn set_subscription_tier(&self, user_id: Uuid, tier: SubscriptionTier) -> Result<(), DatabaseError>;
    async fn subscription_tiers(&self) -> Result<HashMap<Uuid, SubscriptionTier>, DatabaseError>;
    async fn usage_snapshots(&self) -> Result<Vec<UsageSnapshot>, DatabaseError>;

    // Audit trail
    async fn insert_audit_event(&self, event: &NewAuditEvent) -> Result<(), DatabaseError>;
    async fn query_audit_events(&self, filter: &AuditFilter) -> Result<AuditPage, DatabaseError>;
    /// Newest first
    async fn audit_events_since(&self, since: DateTime<Utc>) -> Result<Vec<AuditEvent>, DatabaseError>;
    async fn clear_audit_events(&self) -> Result<u64, DatabaseError>;
}
