use std::collections::HashMap;
use std::sync::Arc;

use super::{Actor, AuditRecorder, AuthorizationGate, ServiceError};
use crate::database::models::{AuditPage, NewAuditEvent};
use crate::database::AdminStore;
use crate::types::AuditAction;
use crate::validation::parse_audit_query;

/// Read and purge the audit trail
pub struct AuditLogService {
    store: Arc<dyn AdminStore>,
    gate: Arc<AuthorizationGate>,
    recorder: Arc<AuditRecorder>,
}

impl AuditLogService {
    pub fn new(store: Arc<dyn AdminStore>, gate: Arc<AuthorizationGate>, recorder: Arc<AuditRecorder>) -> Self {
        Self { store, gate, recorder }
    }

    pub async fn query(&self, actor: &Actor, params: &HashMap<String, String>) -> Result<AuditPage, ServiceError> {
        self.gate.require_moderator(actor).await?;
        let filter = parse_audit_query(params)?;
        Ok(self.store.query_audit_events(&filter).await?)
    }

    /// Delete every audit event, then record the purge itself.
    pub async fn clear(&self, actor: &Actor) -> Result<u64, ServiceError> {
        self.gate.require_admin(actor).await?;

        let deleted = self.store.clear_audit_events().await?;
        tracing::warn!(user_id = %actor.user_id, deleted, "Audit log cleared");

        self.recorder
            .record(
                NewAuditEvent::new(AuditAction::AuditLogsCleared)
                    .actor(actor.user_id, actor.email.clone())
                    .resource("audit_logs", "all")
                    .detail("deleted_count", deleted)
                    .network(actor.ip.clone(), actor.user_agent.clone()),
            )
            .await;

        Ok(deleted)
    }
}
