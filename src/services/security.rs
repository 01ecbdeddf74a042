use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;

use super::{Actor, AuditRecorder, AuthorizationGate, ServiceError};
use crate::database::models::NewAuditEvent;
use crate::security::{AbuseGuard, BlockedIp};
use crate::types::AuditAction;
use crate::validation::{parse_json_body, UnblockIpRequest};

#[derive(Debug, Clone, Serialize)]
pub struct UnblockResult {
    pub ip: String,
    pub unblocked: bool,
}

/// Admin view of the IP block list
pub struct SecurityService {
    guard: Arc<AbuseGuard>,
    gate: Arc<AuthorizationGate>,
    recorder: Arc<AuditRecorder>,
}

impl SecurityService {
    pub fn new(guard: Arc<AbuseGuard>, gate: Arc<AuthorizationGate>, recorder: Arc<AuditRecorder>) -> Self {
        Self { guard, gate, recorder }
    }

    pub async fn blocked_ips(&self, actor: &Actor) -> Result<Vec<BlockedIp>, ServiceError> {
        self.gate.require_admin(actor).await?;
        Ok(self.guard.blocked_ips())
    }

    pub async fn unblock(&self, actor: &Actor, body: &[u8]) -> Result<UnblockResult, ServiceError> {
        self.gate.require_admin(actor).await?;

        let request: UnblockIpRequest = parse_json_body(body)?;
        // canonical form, so "::0001" matches the stored "::1"
        let ip = request
            .ip
            .trim()
            .parse::<IpAddr>()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|_| request.ip.trim().to_string());

        if !self.guard.unblock(&ip) {
            return Err(ServiceError::NotFound(format!("IP {} is not blocked", ip)));
        }
        tracing::info!(admin = %actor.user_id, ip = %ip, "IP unblocked");

        self.recorder
            .record(
                NewAuditEvent::new(AuditAction::IpUnblocked)
                    .actor(actor.user_id, actor.email.clone())
                    .resource("ip_address", ip.clone())
                    .network(actor.ip.clone(), actor.user_agent.clone()),
            )
            .await;

        Ok(UnblockResult { ip, unblocked: true })
    }
}
