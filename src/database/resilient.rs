use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    AgentSession, AuditEvent, AuditFilter, AuditPage, NewAuditEvent, UsageSnapshot, UserAccount,
};
use crate::database::repository::AdminStore;
use crate::types::{Role, SubscriptionTier};

/// Wraps a store so that every call is bounded by `timeout`. Reads are
/// retried at most once after a transient failure; writes never are.
pub struct ResilientStore<S> {
    inner: S,
    timeout: Duration,
    retry_reads: bool,
}

impl<S: AdminStore> ResilientStore<S> {
    pub fn new(inner: S, timeout: Duration, retry_reads: bool) -> Self {
        Self {
            inner,
            timeout,
            retry_reads,
        }
    }

    async fn bounded<T, Fut>(&self, operation: &'static str, fut: Fut) -> Result<T, DatabaseError>
    where
        Fut: Future<Output = Result<T, DatabaseError>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(DatabaseError::Timeout {
                operation,
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }

    async fn read<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T, DatabaseError>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, DatabaseError>> + Send,
        T: Send,
    {
        match self.bounded(operation, call()).await {
            Err(e) if self.retry_reads && e.is_transient() => {
                tracing::warn!("Store read '{}' failed ({}), retrying once", operation, e);
                self.bounded(operation, call()).await
            }
            other => other,
        }
    }
}

#[async_trait]
impl<S: AdminStore> AdminStore for ResilientStore<S> {
    async fn ping(&self) -> Result<(), DatabaseError> {
        self.bounded("ping", self.inner.ping()).await
    }

    async fn find_role(&self, user_id: Uuid) -> Result<Option<Role>, DatabaseError> {
        self.read("find_role", || self.inner.find_role(user_id)).await
    }

    async fn set_role(&self, user_id: Uuid, role: Role) -> Result<(), DatabaseError> {
        self.bounded("set_role", self.inner.set_role(user_id, role)).await
    }

    async fn roles_by_user(&self) -> Result<HashMap<Uuid, Role>, DatabaseError> {
        self.read("roles_by_user", || self.inner.roles_by_user()).await
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserAccount>, DatabaseError> {
        self.read("find_user", || self.inner.find_user(user_id)).await
    }

    async fn list_users(&self) -> Result<Vec<UserAccount>, DatabaseError> {
        self.read("list_users", || self.inner.list_users()).await
    }

    async fn session_counts_by_user(&self) -> Result<HashMap<Uuid, i64>, DatabaseError> {
        self.read("session_counts_by_user", || self.inner.session_counts_by_user()).await
    }

    async fn count_users(&self) -> Result<i64, DatabaseError> {
        self.read("count_users", || self.inner.count_users()).await
    }

    async fn count_sessions(&self) -> Result<i64, DatabaseError> {
        self.read("count_sessions", || self.inner.count_sessions()).await
    }

    async fn sessions_since(&self, since: DateTime<Utc>) -> Result<Vec<AgentSession>, DatabaseError> {
        self.read("sessions_since", || self.inner.sessions_since(since)).await
    }

    async fn find_subscription_tier(&self, user_id: Uuid) -> Result<Option<SubscriptionTier>, DatabaseError> {
        self.read("find_subscription_tier", || self.inner.find_subscription_tier(user_id)).await
    }

    async fn set_subscription_tier(&self, user_id: Uuid, tier: SubscriptionTier) -> Result<(), DatabaseError> {
        self.bounded("set_subscription_tier", self.inner.set_subscription_tier(user_id, tier)).await
    }

    async fn subscription_tiers(&self) -> Result<HashMap<Uuid, SubscriptionTier>, DatabaseError> {
        self.read("subscription_tiers", || self.inner.subscription_tiers()).await
    }

    async fn usage_snapshots(&self) -> Result<Vec<UsageSnapshot>, DatabaseError> {
        self.read("usage_snapshots", || self.inner.usage_snapshots()).await
    }

    async fn insert_audit_event(&self, event: &NewAuditEvent) -> Result<(), DatabaseError> {
        self.bounded("insert_audit_event", self.inner.insert_audit_event(event)).await
    }

    async fn query_audit_events(&self, filter: &AuditFilter) -> Result<AuditPage, DatabaseError> {
        self.read("query_audit_events", || self.inner.query_audit_events(filter)).await
    }

    async fn audit_events_since(&self, since: DateTime<Utc>) -> Result<Vec<AuditEvent>, DatabaseError> {
        self.read("audit_events_since", || self.inner.audit_events_since(since)).await
    }

    async fn clear_audit_events(&self) -> Result<u64, DatabaseError> {
        self.bounded("clear_audit_events", self.inner.clear_audit_events()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Store whose reads hang until the call counter passes `hang_first`
    struct SlowStore {
        calls: Arc<AtomicUsize>,
        hang_first: usize,
        inner: InMemoryStore,
    }

    impl SlowStore {
        async fn maybe_hang(&self) {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.hang_first {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }
    }

    #[async_trait]
    impl AdminStore for SlowStore {
        async fn ping(&self) -> Result<(), DatabaseError> {
            self.inner.ping().await
        }
        async fn find_role(&self, user_id: Uuid) -> Result<Option<Role>, DatabaseError> {
            self.inner.find_role(user_id).await
        }
        async fn set_role(&self, user_id: Uuid, role: Role) -> Result<(), DatabaseError> {
            self.maybe_hang().await;
            self.inner.set_role(user_id, role).await
        }
        async fn roles_by_user(&self) -> Result<HashMap<Uuid, Role>, DatabaseError> {
            self.inner.roles_by_user().await
        }
        async fn find_user(&self, user_id: Uuid) -> Result<Option<UserAccount>, DatabaseError> {
            self.inner.find_user(user_id).await
        }
        async fn list_users(&self) -> Result<Vec<UserAccount>, DatabaseError> {
            self.inner.list_users().await
        }
        async fn session_counts_by_user(&self) -> Result<HashMap<Uuid, i64>, DatabaseError> {
            self.inner.session_counts_by_user().await
        }
        async fn count_users(&self) -> Result<i64, DatabaseError> {
            self.maybe_hang().await;
            self.inner.count_users().await
        }
        async fn count_sessions(&self) -> Result<i64, DatabaseError> {
            self.inner.count_sessions().await
        }
        async fn sessions_since(&self, since: DateTime<Utc>) -> Result<Vec<AgentSession>, DatabaseError> {
            self.inner.sessions_since(since).await
        }
        async fn find_subscription_tier(&self, user_id: Uuid) -> Result<Option<SubscriptionTier>, DatabaseError> {
            self.inner.find_subscription_tier(user_id).await
        }
        async fn set_subscription_tier(&self, user_id: Uuid, tier: SubscriptionTier) -> Result<(), DatabaseError> {
            self.inner.set_subscription_tier(user_id, tier).await
        }
        async fn subscription_tiers(&self) -> Result<HashMap<Uuid, SubscriptionTier>, DatabaseError> {
            self.inner.subscription_tiers().await
        }
        async fn usage_snapshots(&self) -> Result<Vec<UsageSnapshot>, DatabaseError> {
            self.inner.usage_snapshots().await
        }
        async fn insert_audit_event(&self, event: &NewAuditEvent) -> Result<(), DatabaseError> {
            self.inner.insert_audit_event(event).await
        }
        async fn query_audit_events(&self, filter: &AuditFilter) -> Result<AuditPage, DatabaseError> {
            self.inner.query_audit_events(filter).await
        }
        async fn audit_events_since(&self, since: DateTime<Utc>) -> Result<Vec<AuditEvent>, DatabaseError> {
            self.inner.audit_events_since(since).await
        }
        async fn clear_audit_events(&self) -> Result<u64, DatabaseError> {
            self.inner.clear_audit_events().await
        }
    }

    fn slow(hang_first: usize) -> (ResilientStore<SlowStore>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = SlowStore {
            calls: calls.clone(),
            hang_first,
            inner: InMemoryStore::new(),
        };
        (ResilientStore::new(store, Duration::from_millis(20), true), calls)
    }

    #[tokio::test]
    async fn read_is_retried_once_after_timeout() {
        let (store, calls) = slow(1);
        assert_eq!(store.count_users().await.unwrap(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn read_gives_up_after_second_timeout() {
        let (store, calls) = slow(5);
        let err = store.count_users().await.unwrap_err();
        assert!(matches!(err, DatabaseError::Timeout { operation: "count_users", .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn writes_are_not_retried() {
        let (store, calls) = slow(1);
        let err = store.set_role(Uuid::new_v4(), Role::Admin).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Timeout { operation: "set_role", .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
