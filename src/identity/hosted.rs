use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;

use super::{AuthSession, IdentityError, IdentityProvider};
use crate::config::IdentityConfig;

/// REST client for the hosted auth service (`/token`, `/signup`, `/logout`)
pub struct HostedIdentityProvider {
    client: reqwest::Client,
    base_url: url::Url,
    api_key: String,
}

impl HostedIdentityProvider {
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let mut base_url = url::Url::parse(&config.base_url)
            .map_err(|e| IdentityError::Upstream(format!("invalid identity base url: {}", e)))?;
        // Url::join treats a path without trailing slash as a file
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| IdentityError::Upstream(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<url::Url, IdentityError> {
        self.base_url
            .join(path)
            .map_err(|e| IdentityError::Upstream(e.to_string()))
    }

    async fn post_credentials(&self, path: &str, email: &str, password: &str) -> Result<reqwest::Response, IdentityError> {
        self.client
            .post(self.endpoint(path)?)
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| IdentityError::Upstream(e.to_string()))
    }
}

async fn error_text(response: reqwest::Response) -> String {
    response.text().await.unwrap_or_default()
}

#[async_trait]
impl IdentityProvider for HostedIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        let response = self
            .post_credentials("token?grant_type=password", email, password)
            .await?;

        match response.status() {
            s if s.is_success() => response
                .json::<AuthSession>()
                .await
                .map_err(|e| IdentityError::Upstream(e.to_string())),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => Err(IdentityError::InvalidCredentials),
            status => Err(IdentityError::Upstream(format!(
                "sign-in returned {}: {}",
                status,
                error_text(response).await
            ))),
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        let response = self.post_credentials("signup", email, password).await?;

        match response.status() {
            s if s.is_success() => response
                .json::<AuthSession>()
                .await
                .map_err(|e| IdentityError::Upstream(e.to_string())),
            StatusCode::UNPROCESSABLE_ENTITY | StatusCode::BAD_REQUEST => {
                let body = error_text(response).await;
                if body.contains("already registered") || body.contains("user_already_exists") {
                    Err(IdentityError::AlreadyRegistered)
                } else {
                    Err(IdentityError::Rejected("Registration rejected".to_string()))
                }
            }
            status => Err(IdentityError::Upstream(format!(
                "sign-up returned {}: {}",
                status,
                error_text(response).await
            ))),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let response = self
            .client
            .post(self.endpoint("logout")?)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| IdentityError::Upstream(e.to_string()))?;

        match response.status() {
            s if s.is_success() => Ok(()),
            // Already-expired sessions count as signed out
            StatusCode::UNAUTHORIZED => Ok(()),
            status => Err(IdentityError::Upstream(format!("sign-out returned {}", status))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> IdentityConfig {
        IdentityConfig {
            base_url: base_url.to_string(),
            api_key: "key".to_string(),
            jwt_secret: "secret".to_string(),
            request_timeout_ms: 1000,
        }
    }

    #[test]
    fn endpoints_resolve_under_base_path() {
        let provider = HostedIdentityProvider::new(&config("https://auth.example.com/auth/v1")).unwrap();
        assert_eq!(
            provider.endpoint("signup").unwrap().as_str(),
            "https://auth.example.com/auth/v1/signup"
        );
        assert_eq!(
            provider.endpoint("token?grant_type=password").unwrap().as_str(),
            "https://auth.example.com/auth/v1/token?grant_type=password"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            HostedIdentityProvider::new(&config("not a url")),
            Err(IdentityError::Upstream(_))
        ));
    }
}
