//! Identity-provider client.
//!
//! Sign-in, sign-up and sign-out are delegated to a hosted auth service.
//! [`HostedIdentityProvider`] talks to it over REST; [`StaticIdentityProvider`]
//! is an in-process stand-in for tests and `--memory` runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod hosted;
mod local;

pub use local::StaticIdentityProvider;
pub use hosted::HostedIdentityProvider;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account already registered")]
    AlreadyRegistered,
    #[error("rejected by identity provider: {0}")]
    Rejected(String),
    #[error("identity provider failure: {0}")]
    Upstream(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdentityUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Tokens returned after a successful sign-in or sign-up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub user: IdentityUser,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError>;
}
