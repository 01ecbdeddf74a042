use serde::Deserialize;
use std::borrow::Cow;
use std::net::IpAddr;
use validator::{Validate, ValidationError};

use super::Schema;
use crate::types::Role;

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

fn validate_role(value: &str) -> Result<(), ValidationError> {
    value
        .parse::<Role>()
        .map(|_| ())
        .map_err(|_| invalid("role", "Role must be one of: user, moderator, admin"))
}

fn validate_ip(value: &str) -> Result<(), ValidationError> {
    value
        .trim()
        .parse::<IpAddr>()
        .map(|_| ())
        .map_err(|_| invalid("ip", "Must be a valid IPv4 or IPv6 address"))
}

/// `POST /admin/users/{id}/role`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateRoleRequest {
    #[validate(custom(function = "validate_role"))]
    pub role: String,
}

impl UpdateRoleRequest {
    pub fn role(&self) -> Role {
        // validate_role ran in parse_payload
        self.role.parse().unwrap_or_default()
    }
}

impl Schema for UpdateRoleRequest {
    const FIELDS: &'static [&'static str] = &["role"];
}

/// `POST /admin/users/{id}/subscription`. Only `"revoke"` is actionable;
/// the service refuses anything else.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubscriptionActionRequest {
    pub action: String,
}

impl Schema for SubscriptionActionRequest {
    const FIELDS: &'static [&'static str] = &["action"];
}

/// `POST /auth/login`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Must be a valid email address"), length(max = 254, message = "Email is too long"))]
    pub email: String,
    #[validate(length(min = 1, max = 128, message = "Password is required"))]
    pub password: String,
}

impl Schema for LoginRequest {
    const FIELDS: &'static [&'static str] = &["email", "password"];
}

/// `POST /auth/register`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Must be a valid email address"), length(max = 254, message = "Email is too long"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
}

impl Schema for RegisterRequest {
    const FIELDS: &'static [&'static str] = &["email", "password"];
}

/// `POST /admin/security/unblock`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UnblockIpRequest {
    #[validate(custom(function = "validate_ip"))]
    pub ip: String,
}

impl Schema for UnblockIpRequest {
    const FIELDS: &'static [&'static str] = &["ip"];
}
