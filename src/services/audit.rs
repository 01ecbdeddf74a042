use std::sync::Arc;

use crate::database::models::NewAuditEvent;
use crate::database::AdminStore;

/// Best-effort audit trail writer.
///
/// A failed write is logged and dropped; the action that triggered it has
/// already happened and stands.
pub struct AuditRecorder {
    store: Arc<dyn AdminStore>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AdminStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, event: NewAuditEvent) {
        match self.store.insert_audit_event(&event).await {
            Ok(()) => tracing::debug!(action = %event.action, "Audit event recorded"),
            Err(e) => tracing::warn!(
                action = %event.action,
                user_id = ?event.user_id,
                error = %e,
                "Failed to record audit event"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryStore;
    use crate::types::AuditAction;
    use uuid::Uuid;

    #[tokio::test]
    async fn writes_event_with_metadata() {
        let store = Arc::new(InMemoryStore::new());
        let recorder = AuditRecorder::new(store.clone());
        let actor = Uuid::new_v4();

        recorder
            .record(
                NewAuditEvent::new(AuditAction::UserLogin)
                    .actor(actor, Some("a@b.com".into()))
                    .network(Some("1.2.3.4".into()), Some("curl/8".into())),
            )
            .await;

        let events = store.audit_events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, "user.login");
        assert_eq!(events[0].user_id, Some(actor));
        assert_eq!(events[0].ip_address.as_deref(), Some("1.2.3.4"));
    }

    #[tokio::test]
    async fn write_failure_is_swallowed() {
        let store = Arc::new(InMemoryStore::new());
        store.fail_audit_writes(true);
        let recorder = AuditRecorder::new(store.clone());

        recorder.record(NewAuditEvent::new(AuditAction::UserLogout)).await;
        assert!(store.audit_events().await.is_empty());
    }
}
