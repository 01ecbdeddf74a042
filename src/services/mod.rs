//! Business layer. Every operation that touches admin data resolves the
//! caller through the [`AuthorizationGate`] before anything else.

pub mod analytics;
pub mod audit;
pub mod audit_logs;
pub mod authz;
pub mod credit_usage;
pub mod security;
pub mod sessions;
pub mod users;

pub use analytics::{aggregate, AdminStats, AnalyticsService, StatsInput};
pub use audit::AuditRecorder;
pub use audit_logs::AuditLogService;
pub use authz::{AuthorizationGate, AuthzError, RoleResolution};
pub use credit_usage::{CreditUsageReport, CreditUsageService};
pub use security::SecurityService;
pub use sessions::SessionService;
pub use users::UserAdminService;

use serde::Serialize;
use uuid::Uuid;

use crate::database::DatabaseError;
use crate::identity::IdentityError;
use crate::validation::ValidationErrors;

/// The authenticated caller plus the network metadata audit records carry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl Actor {
    pub fn new(user_id: Uuid, email: Option<String>) -> Self {
        Self {
            user_id,
            email,
            ip: None,
            user_agent: None,
        }
    }

    pub fn with_network(mut self, ip: Option<String>, user_agent: Option<String>) -> Self {
        self.ip = ip;
        self.user_agent = user_agent;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Store(#[from] DatabaseError),
}

impl From<AuthzError> for ServiceError {
    fn from(_: AuthzError) -> Self {
        ServiceError::Unauthorized
    }
}
