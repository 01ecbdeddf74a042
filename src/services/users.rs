use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{Actor, AuditRecorder, AuthorizationGate, ServiceError};
use crate::database::models::{AdminUserView, NewAuditEvent, UserAccount};
use crate::database::AdminStore;
use crate::types::{AuditAction, Role, SubscriptionTier};
use crate::validation::{parse_json_body, SubscriptionActionRequest, UpdateRoleRequest};

const REVOKE: &str = "revoke";

#[derive(Debug, Clone, Serialize)]
pub struct RoleChange {
    pub user_id: Uuid,
    pub old_role: Role,
    pub new_role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionChange {
    pub user_id: Uuid,
    pub previous_tier: SubscriptionTier,
    pub subscription_tier: SubscriptionTier,
}

/// User listing, role changes and subscription revocation
pub struct UserAdminService {
    store: Arc<dyn AdminStore>,
    gate: Arc<AuthorizationGate>,
    recorder: Arc<AuditRecorder>,
}

impl UserAdminService {
    pub fn new(store: Arc<dyn AdminStore>, gate: Arc<AuthorizationGate>, recorder: Arc<AuditRecorder>) -> Self {
        Self { store, gate, recorder }
    }

    async fn existing_user(&self, user_id: Uuid) -> Result<UserAccount, ServiceError> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    /// Every user with resolved role, session count and tier, newest first
    pub async fn list_users(&self, actor: &Actor) -> Result<Vec<AdminUserView>, ServiceError> {
        self.gate.require_admin(actor).await?;

        let (users, roles, session_counts, tiers) = futures::try_join!(
            self.store.list_users(),
            self.store.roles_by_user(),
            self.store.session_counts_by_user(),
            self.store.subscription_tiers(),
        )?;

        Ok(users
            .into_iter()
            .map(|user| AdminUserView {
                role: roles.get(&user.id).copied().unwrap_or_default(),
                session_count: session_counts.get(&user.id).copied().unwrap_or(0),
                subscription_tier: tiers.get(&user.id).copied().unwrap_or_default(),
                id: user.id,
                email: user.email,
                created_at: user.created_at,
            })
            .collect())
    }

    /// Set a user's role from a `{ "role": ... }` body.
    ///
    /// Admins cannot change their own role, and asking for the role a user
    /// already has is a conflict. Either way nothing is written.
    pub async fn update_role(&self, actor: &Actor, target: Uuid, body: &[u8]) -> Result<RoleChange, ServiceError> {
        self.gate.require_admin(actor).await?;

        let request: UpdateRoleRequest = parse_json_body(body)?;
        let new_role = request.role();

        if target == actor.user_id {
            return Err(ServiceError::Conflict("Admins cannot change their own role".to_string()));
        }

        let user = self.existing_user(target).await?;
        let old_role = self.store.find_role(target).await?.unwrap_or_default();
        if old_role == new_role {
            return Err(ServiceError::Conflict(format!("User already has role {}", new_role)));
        }

        self.store.set_role(target, new_role).await?;
        tracing::info!(
            admin = %actor.user_id,
            user_id = %target,
            old_role = %old_role,
            new_role = %new_role,
            "Role updated"
        );

        self.recorder
            .record(
                NewAuditEvent::new(AuditAction::RoleUpdated)
                    .actor(actor.user_id, actor.email.clone())
                    .resource("user", target.to_string())
                    .detail("target_email", user.email)
                    .detail("old_role", old_role.as_str())
                    .detail("new_role", new_role.as_str())
                    .network(actor.ip.clone(), actor.user_agent.clone()),
            )
            .await;

        Ok(RoleChange {
            user_id: target,
            old_role,
            new_role,
        })
    }

    /// Downgrade a premium user to free from a `{ "action": "revoke" }` body.
    /// This endpoint never promotes.
    pub async fn revoke_subscription(
        &self,
        actor: &Actor,
        target: Uuid,
        body: &[u8],
    ) -> Result<SubscriptionChange, ServiceError> {
        self.gate.require_admin(actor).await?;

        let request: SubscriptionActionRequest = parse_json_body(body)?;
        if request.action != REVOKE {
            return Err(ServiceError::Forbidden("Only subscription revocation is permitted".to_string()));
        }

        let user = self.existing_user(target).await?;
        let previous_tier = self.store.find_subscription_tier(target).await?.unwrap_or_default();
        if previous_tier != SubscriptionTier::Premium {
            return Err(ServiceError::Conflict(
                "User does not have an active premium subscription".to_string(),
            ));
        }

        self.store.set_subscription_tier(target, SubscriptionTier::Free).await?;
        tracing::info!(admin = %actor.user_id, user_id = %target, "Subscription revoked");

        self.recorder
            .record(
                NewAuditEvent::new(AuditAction::SubscriptionRevoked)
                    .actor(actor.user_id, actor.email.clone())
                    .resource("subscription", target.to_string())
                    .detail("target_email", user.email)
                    .detail("previous_tier", previous_tier.as_str())
                    .detail("new_tier", SubscriptionTier::Free.as_str())
                    .network(actor.ip.clone(), actor.user_agent.clone()),
            )
            .await;

        Ok(SubscriptionChange {
            user_id: target,
            previous_tier,
            subscription_tier: SubscriptionTier::Free,
        })
    }
}
