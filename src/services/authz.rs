use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{Actor, ServiceError};
use crate::database::AdminStore;
use crate::types::Role;

/// How a caller's role was determined.
///
/// `Missing` and `LookupFailed` both grant [`Role::User`], but stay
/// distinguishable so callers can tighten the policy later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleResolution {
    Found(Role),
    Missing,
    LookupFailed(String),
}

impl RoleResolution {
    pub fn effective(&self) -> Role {
        match self {
            RoleResolution::Found(role) => *role,
            RoleResolution::Missing | RoleResolution::LookupFailed(_) => Role::User,
        }
    }

    pub fn source(&self) -> &'static str {
        match self {
            RoleResolution::Found(_) => "assigned",
            RoleResolution::Missing => "default",
            RoleResolution::LookupFailed(_) => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    #[error("role {actual} does not satisfy {required}")]
    InsufficientRole { required: Role, actual: Role },
}

/// Role lookup result for another user
#[derive(Debug, Clone, Serialize)]
pub struct RoleLookup {
    pub user_id: Uuid,
    pub role: Role,
    pub assigned: bool,
}

/// Resolves a caller's role with one store lookup and enforces `user < moderator < admin`
pub struct AuthorizationGate {
    store: Arc<dyn AdminStore>,
}

impl AuthorizationGate {
    pub fn new(store: Arc<dyn AdminStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, user_id: Uuid) -> RoleResolution {
        match self.store.find_role(user_id).await {
            Ok(Some(role)) => RoleResolution::Found(role),
            Ok(None) => RoleResolution::Missing,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Role lookup failed; treating caller as user");
                RoleResolution::LookupFailed(e.to_string())
            }
        }
    }

    pub async fn require_role(&self, actor: &Actor, required: Role) -> Result<Role, AuthzError> {
        let actual = self.resolve(actor.user_id).await.effective();
        if actual.satisfies(required) {
            Ok(actual)
        } else {
            tracing::info!(
                user_id = %actor.user_id,
                role = %actual,
                required = %required,
                "Authorization gate rejected caller"
            );
            Err(AuthzError::InsufficientRole { required, actual })
        }
    }

    pub async fn require_admin(&self, actor: &Actor) -> Result<Role, AuthzError> {
        self.require_role(actor, Role::Admin).await
    }

    pub async fn require_moderator(&self, actor: &Actor) -> Result<Role, AuthzError> {
        self.require_role(actor, Role::Moderator).await
    }

    /// Another user's role. Only admins may ask.
    pub async fn role_of(&self, actor: &Actor, target: Uuid) -> Result<RoleLookup, ServiceError> {
        self.require_admin(actor).await?;

        if self.store.find_user(target).await?.is_none() {
            return Err(ServiceError::NotFound("User not found".to_string()));
        }
        let assigned = self.store.find_role(target).await?;
        Ok(RoleLookup {
            user_id: target,
            role: assigned.unwrap_or_default(),
            assigned: assigned.is_some(),
        })
    }
}
