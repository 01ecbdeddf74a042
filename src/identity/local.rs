use async_trait::async_trait;
use chrono::Duration;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AuthSession, IdentityError, IdentityProvider, IdentityUser};
use crate::auth::{generate_jwt, validate_jwt, Claims};

const TOKEN_TTL_SECS: i64 = 3600;

struct Account {
    id: Uuid,
    password: String,
}

/// In-process provider that signs tokens with the configured secret.
/// Development and test use only; passwords are kept in memory as given.
pub struct StaticIdentityProvider {
    secret: String,
    accounts: RwLock<HashMap<String, Account>>,
}

impl StaticIdentityProvider {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            accounts: RwLock::new(HashMap::new()),
        }
    }

    /// Register an account with a known id (so it can match a store profile)
    pub async fn add_account(&self, id: Uuid, email: &str, password: &str) {
        self.accounts.write().await.insert(
            email.to_string(),
            Account {
                id,
                password: password.to_string(),
            },
        );
    }

    /// Mint an access token for an arbitrary user id
    pub fn issue_token(&self, id: Uuid, email: Option<&str>) -> Result<String, IdentityError> {
        let claims = Claims::new(id, email.map(str::to_string), Duration::seconds(TOKEN_TTL_SECS));
        generate_jwt(&claims, &self.secret).map_err(|e| IdentityError::Upstream(e.to_string()))
    }

    fn session(&self, id: Uuid, email: &str) -> Result<AuthSession, IdentityError> {
        Ok(AuthSession {
            access_token: self.issue_token(id, Some(email))?,
            refresh_token: None,
            expires_in: TOKEN_TTL_SECS,
            user: IdentityUser {
                id,
                email: Some(email.to_string()),
            },
        })
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        let id = {
            let accounts = self.accounts.read().await;
            match accounts.get(email) {
                Some(account) if account.password == password => account.id,
                _ => return Err(IdentityError::InvalidCredentials),
            }
        };
        self.session(id, email)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        let id = Uuid::new_v4();
        {
            let mut accounts = self.accounts.write().await;
            if accounts.contains_key(email) {
                return Err(IdentityError::AlreadyRegistered);
            }
            accounts.insert(
                email.to_string(),
                Account {
                    id,
                    password: password.to_string(),
                },
            );
        }
        self.session(id, email)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        validate_jwt(access_token, &self.secret)
            .map(|_| ())
            .map_err(|_| IdentityError::InvalidCredentials)
    }
}
