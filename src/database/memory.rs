use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    AgentSession, AuditEvent, AuditFilter, AuditPage, NewAuditEvent, UsageSnapshot, UserAccount,
};
use crate::database::repository::AdminStore;
use crate::types::{Role, SubscriptionTier};

#[derive(Default)]
struct Tables {
    users: Vec<UserAccount>,
    roles: HashMap<Uuid, Role>,
    tiers: HashMap<Uuid, SubscriptionTier>,
    sessions: Vec<AgentSession>,
    usage: HashMap<Uuid, (i64, i64, DateTime<Utc>)>,
    audit: Vec<AuditEvent>,
}

/// Process-local store used by tests and `--memory` runs.
///
/// Failure switches let tests exercise the upstream-error paths without a database.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_audit_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub fn fail_audit_writes(&self, on: bool) {
        self.fail_audit_writes.store(on, Ordering::SeqCst);
    }

    fn check_read(&self) -> Result<(), DatabaseError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DatabaseError::Unavailable("reads disabled".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), DatabaseError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DatabaseError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }

    /// Seed a user profile with a role and tier; returns the new id
    pub async fn add_user(&self, email: &str, role: Role, tier: SubscriptionTier) -> Uuid {
        let id = Uuid::new_v4();
        let mut tables = self.tables.write().await;
        tables.users.push(UserAccount {
            id,
            email: email.to_string(),
            created_at: Utc::now(),
        });
        tables.roles.insert(id, role);
        tables.tiers.insert(id, tier);
        id
    }

    pub async fn add_session(&self, user_id: Uuid, agent_type: &str, created_at: DateTime<Utc>) {
        self.tables.write().await.sessions.push(AgentSession {
            id: Uuid::new_v4(),
            user_id,
            agent_type: agent_type.to_string(),
            created_at,
        });
    }

    pub async fn add_audit_event(&self, event: AuditEvent) {
        self.tables.write().await.audit.push(event);
    }

    pub async fn set_usage(&self, user_id: Uuid, credits_used: i64, canvases_used: i64) {
        self.tables
            .write()
            .await
            .usage
            .insert(user_id, (credits_used, canvases_used, Utc::now()));
    }

    /// Every stored audit event, oldest first
    pub async fn audit_events(&self) -> Vec<AuditEvent> {
        self.tables.read().await.audit.clone()
    }
}

#[async_trait]
impl AdminStore for InMemoryStore {
    async fn ping(&self) -> Result<(), DatabaseError> {
        self.check_read()
    }

    async fn find_role(&self, user_id: Uuid) -> Result<Option<Role>, DatabaseError> {
        self.check_read()?;
        Ok(self.tables.read().await.roles.get(&user_id).copied())
    }

    async fn set_role(&self, user_id: Uuid, role: Role) -> Result<(), DatabaseError> {
        self.check_write()?;
        self.tables.write().await.roles.insert(user_id, role);
        Ok(())
    }

    async fn roles_by_user(&self) -> Result<HashMap<Uuid, Role>, DatabaseError> {
        self.check_read()?;
        Ok(self.tables.read().await.roles.clone())
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserAccount>, DatabaseError> {
        self.check_read()?;
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<UserAccount>, DatabaseError> {
        self.check_read()?;
        let mut users = self.tables.read().await.users.clone();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn session_counts_by_user(&self) -> Result<HashMap<Uuid, i64>, DatabaseError> {
        self.check_read()?;
        let mut counts = HashMap::new();
        for session in &self.tables.read().await.sessions {
            *counts.entry(session.user_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn count_users(&self) -> Result<i64, DatabaseError> {
        self.check_read()?;
        Ok(self.tables.read().await.users.len() as i64)
    }

    async fn count_sessions(&self) -> Result<i64, DatabaseError> {
        self.check_read()?;
        Ok(self.tables.read().await.sessions.len() as i64)
    }

    async fn sessions_since(&self, since: DateTime<Utc>) -> Result<Vec<AgentSession>, DatabaseError> {
        self.check_read()?;
        let tables = self.tables.read().await;
        let mut sessions: Vec<AgentSession> = tables
            .sessions
            .iter()
            .filter(|s| s.created_at >= since)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn find_subscription_tier(&self, user_id: Uuid) -> Result<Option<SubscriptionTier>, DatabaseError> {
        self.check_read()?;
        Ok(self.tables.read().await.tiers.get(&user_id).copied())
    }

    async fn set_subscription_tier(&self, user_id: Uuid, tier: SubscriptionTier) -> Result<(), DatabaseError> {
        self.check_write()?;
        self.tables.write().await.tiers.insert(user_id, tier);
        Ok(())
    }

    async fn subscription_tiers(&self) -> Result<HashMap<Uuid, SubscriptionTier>, DatabaseError> {
        self.check_read()?;
        Ok(self.tables.read().await.tiers.clone())
    }

    async fn usage_snapshots(&self) -> Result<Vec<UsageSnapshot>, DatabaseError> {
        self.check_read()?;
        let tables = self.tables.read().await;
        let mut snapshots: Vec<UsageSnapshot> = tables
            .usage
            .iter()
            .map(|(user_id, (credits, canvases, updated_at))| UsageSnapshot {
                user_id: *user_id,
                email: tables.users.iter().find(|u| u.id == *user_id).map(|u| u.email.clone()),
                tier: tables.tiers.get(user_id).copied().unwrap_or_default(),
                credits_used: *credits,
                canvases_used: *canvases,
                updated_at: Some(*updated_at),
            })
            .collect();
        snapshots.sort_by(|a, b| b.credits_used.cmp(&a.credits_used));
        Ok(snapshots)
    }

    async fn insert_audit_event(&self, event: &NewAuditEvent) -> Result<(), DatabaseError> {
        self.check_write()?;
        if self.fail_audit_writes.load(Ordering::SeqCst) {
            return Err(DatabaseError::Unavailable("audit writes disabled".to_string()));
        }
        let stored = event.clone().into_event(Uuid::new_v4(), Utc::now());
        self.tables.write().await.audit.push(stored);
        Ok(())
    }

    async fn query_audit_events(&self, filter: &AuditFilter) -> Result<AuditPage, DatabaseError> {
        self.check_read()?;
        let tables = self.tables.read().await;
        let mut matching: Vec<&AuditEvent> = tables.audit.iter().filter(|e| filter.matches(e)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let logs = matching
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect();

        Ok(AuditPage {
            logs,
            total,
            limit: filter.limit,
            offset: filter.offset,
        })
    }

    async fn audit_events_since(&self, since: DateTime<Utc>) -> Result<Vec<AuditEvent>, DatabaseError> {
        self.check_read()?;
        let tables = self.tables.read().await;
        let mut events: Vec<AuditEvent> = tables
            .audit
            .iter()
            .filter(|e| e.created_at >= since)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(events)
    }

    async fn clear_audit_events(&self) -> Result<u64, DatabaseError> {
        self.check_write()?;
        let mut tables = self.tables.write().await;
        let removed = tables.audit.len() as u64;
        tables.audit.clear();
        Ok(removed)
    }
}
