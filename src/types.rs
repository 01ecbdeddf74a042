/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operator role. Ordered by privilege: `User < Moderator < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Moderator, Role::Admin];

    /// Integer rank used for hierarchy comparisons (user=1, moderator=2, admin=3)
    pub fn rank(self) -> u8 {
        match self {
            Role::User => 1,
            Role::Moderator => 2,
            Role::Admin => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    pub fn satisfies(self, required: Role) -> bool {
        self.rank() >= required.rank()
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Subscription plan tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Premium,
}

impl SubscriptionTier {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Premium => "premium",
        }
    }
}

impl Default for SubscriptionTier {
    fn default() -> Self {
        SubscriptionTier::Free
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(SubscriptionTier::Free),
            "premium" => Ok(SubscriptionTier::Premium),
            other => Err(format!("unknown subscription tier: {}", other)),
        }
    }
}

/// Audit action tags. Stored as their dotted string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    #[serde(rename = "user.login")]
    UserLogin,
    #[serde(rename = "user.logout")]
    UserLogout,
    #[serde(rename = "user.signup")]
    UserSignup,
    #[serde(rename = "session.created")]
    SessionCreated,
    #[serde(rename = "session.updated")]
    SessionUpdated,
    #[serde(rename = "session.deleted")]
    SessionDeleted,
    #[serde(rename = "session.restored")]
    SessionRestored,
    #[serde(rename = "role.updated")]
    RoleUpdated,
    #[serde(rename = "subscription.revoked")]
    SubscriptionRevoked,
    #[serde(rename = "audit_logs.cleared")]
    AuditLogsCleared,
    #[serde(rename = "security.ip_unblocked")]
    IpUnblocked,
}

impl AuditAction {
    pub const ALL: [AuditAction; 11] = [
        AuditAction::UserLogin,
        AuditAction::UserLogout,
        AuditAction::UserSignup,
        AuditAction::SessionCreated,
        AuditAction::SessionUpdated,
        AuditAction::SessionDeleted,
        AuditAction::SessionRestored,
        AuditAction::RoleUpdated,
        AuditAction::SubscriptionRevoked,
        AuditAction::AuditLogsCleared,
        AuditAction::IpUnblocked,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::UserLogin => "user.login",
            AuditAction::UserLogout => "user.logout",
            AuditAction::UserSignup => "user.signup",
            AuditAction::SessionCreated => "session.created",
            AuditAction::SessionUpdated => "session.updated",
            AuditAction::SessionDeleted => "session.deleted",
            AuditAction::SessionRestored => "session.restored",
            AuditAction::RoleUpdated => "role.updated",
            AuditAction::SubscriptionRevoked => "subscription.revoked",
            AuditAction::AuditLogsCleared => "audit_logs.cleared",
            AuditAction::IpUnblocked => "security.ip_unblocked",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown audit action: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ordering_follows_rank() {
        assert!(Role::User < Role::Moderator);
        assert!(Role::Moderator < Role::Admin);
        assert!(Role::Admin.satisfies(Role::Moderator));
        assert!(!Role::User.satisfies(Role::Moderator));
        assert_eq!(Role::Moderator.rank(), 2);
    }

    #[test]
    fn role_parses_only_known_values() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert!("root".parse::<Role>().is_err());
        assert!("Admin".parse::<Role>().is_err());
    }

    #[test]
    fn audit_action_round_trips_through_str() {
        for action in AuditAction::ALL {
            assert_eq!(action.as_str().parse::<AuditAction>(), Ok(action));
        }
        assert_eq!(
            serde_json::to_value(AuditAction::RoleUpdated).unwrap(),
            serde_json::json!("role.updated")
        );
    }
}
