use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{Actor, AuditRecorder, AuthorizationGate, ServiceError};
use crate::database::models::NewAuditEvent;
use crate::identity::{AuthSession, IdentityError, IdentityProvider};
use crate::sanitize::{sanitize_email, sanitize_text};
use crate::security::AbuseGuard;
use crate::types::{AuditAction, Role};
use crate::validation::{parse_json_body, LoginRequest, RegisterRequest, ValidationErrors};

const MAX_USER_AGENT: usize = 512;
const UNKNOWN_IP: &str = "unknown";

/// Network metadata of an unauthenticated request
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    fn ip_key(&self) -> &str {
        self.ip.as_deref().unwrap_or(UNKNOWN_IP)
    }

    fn user_agent(&self) -> Option<String> {
        self.user_agent.as_deref().map(|ua| sanitize_text(ua, MAX_USER_AGENT))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CallerProfile {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: Role,
    pub role_source: &'static str,
}

/// Sign-in, sign-up and sign-out against the identity provider, with
/// failed-login tracking and audit records for each successful step.
pub struct SessionService {
    identity: Arc<dyn IdentityProvider>,
    guard: Arc<AbuseGuard>,
    gate: Arc<AuthorizationGate>,
    recorder: Arc<AuditRecorder>,
}

fn clean_email(raw: &str) -> Result<String, ValidationErrors> {
    let email = sanitize_email(raw);
    if email.is_empty() {
        let mut errors = ValidationErrors::new();
        errors.push("email", "Must be a valid email address");
        return Err(errors);
    }
    Ok(email)
}

impl SessionService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        guard: Arc<AbuseGuard>,
        gate: Arc<AuthorizationGate>,
        recorder: Arc<AuditRecorder>,
    ) -> Self {
        Self {
            identity,
            guard,
            gate,
            recorder,
        }
    }

    pub async fn login(&self, client: &ClientInfo, body: &[u8]) -> Result<AuthSession, ServiceError> {
        let request: LoginRequest = parse_json_body(body)?;
        let email = clean_email(&request.email)?;

        match self.identity.sign_in(&email, &request.password).await {
            Ok(session) => {
                self.guard.record_success(client.ip_key(), &email);
                tracing::info!(user_id = %session.user.id, "User signed in");
                self.recorder
                    .record(
                        NewAuditEvent::new(AuditAction::UserLogin)
                            .actor(session.user.id, Some(email))
                            .resource("session", session.user.id.to_string())
                            .network(client.ip.clone(), client.user_agent()),
                    )
                    .await;
                Ok(session)
            }
            Err(IdentityError::InvalidCredentials) => {
                let failure = self.guard.record_failure(client.ip_key(), &email);
                tracing::warn!(
                    ip = %client.ip_key(),
                    attempts = failure.attempts,
                    blocked = failure.blocked,
                    "Failed login"
                );
                Err(IdentityError::InvalidCredentials.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn register(&self, client: &ClientInfo, body: &[u8]) -> Result<AuthSession, ServiceError> {
        let request: RegisterRequest = parse_json_body(body)?;
        let email = clean_email(&request.email)?;

        let session = self.identity.sign_up(&email, &request.password).await?;
        tracing::info!(user_id = %session.user.id, "User registered");
        self.recorder
            .record(
                NewAuditEvent::new(AuditAction::UserSignup)
                    .actor(session.user.id, Some(email))
                    .resource("user", session.user.id.to_string())
                    .network(client.ip.clone(), client.user_agent()),
            )
            .await;
        Ok(session)
    }

    pub async fn logout(&self, actor: &Actor, access_token: &str) -> Result<(), ServiceError> {
        self.identity.sign_out(access_token).await?;
        self.recorder
            .record(
                NewAuditEvent::new(AuditAction::UserLogout)
                    .actor(actor.user_id, actor.email.clone())
                    .resource("session", actor.user_id.to_string())
                    .network(actor.ip.clone(), actor.user_agent.clone()),
            )
            .await;
        Ok(())
    }

    /// The caller's own resolved role
    pub async fn me(&self, actor: &Actor) -> CallerProfile {
        let resolution = self.gate.resolve(actor.user_id).await;
        CallerProfile {
            user_id: actor.user_id,
            email: actor.email.clone(),
            role: resolution.effective(),
            role_source: resolution.source(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::InMemoryStore;
    use crate::identity::StaticIdentityProvider;
    use crate::security::SystemClock;
    use crate::types::SubscriptionTier;

    struct Fixture {
        store: Arc<InMemoryStore>,
        identity: Arc<StaticIdentityProvider>,
        guard: Arc<AbuseGuard>,
        service: SessionService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let identity = Arc::new(StaticIdentityProvider::new("test-secret"));
        let guard = Arc::new(AbuseGuard::new(&AppConfig::for_tests().abuse, Arc::new(SystemClock)));
        let gate = Arc::new(AuthorizationGate::new(store.clone()));
        let recorder = Arc::new(AuditRecorder::new(store.clone()));
        Fixture {
            service: SessionService::new(identity.clone(), guard.clone(), gate, recorder),
            store,
            identity,
            guard,
        }
    }

    fn client() -> ClientInfo {
        ClientInfo {
            ip: Some("1.2.3.4".into()),
            user_agent: Some("<b>agent</b>".into()),
        }
    }

    #[tokio::test]
    async fn successful_login_is_audited() {
        let f = fixture();
        let id = f.store.add_user("a@b.com", Role::User, SubscriptionTier::Free).await;
        f.identity.add_account(id, "a@b.com", "hunter22").await;

        let session = f
            .service
            .login(&client(), br#"{"email":"A@B.com","password":"hunter22"}"#)
            .await
            .unwrap();
        assert_eq!(session.user.id, id);

        let events = f.store.audit_events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, "user.login");
        assert_eq!(events[0].user_email.as_deref(), Some("a@b.com"));
        assert_eq!(events[0].user_agent.as_deref(), Some("agent"));
    }

    #[tokio::test]
    async fn failed_logins_feed_the_guard() {
        let f = fixture();
        for _ in 0..10 {
            let err = f
                .service
                .login(&client(), br#"{"email":"a@b.com","password":"wrong"}"#)
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::Identity(IdentityError::InvalidCredentials)));
        }
        assert!(f.guard.is_blocked("1.2.3.4"));
        assert_eq!(f.guard.attempts("1.2.3.4", "c@d.com"), 0);
        assert!(f.store.audit_events().await.is_empty());
    }

    #[tokio::test]
    async fn register_then_me() {
        let f = fixture();
        let session = f
            .service
            .register(&client(), br#"{"email":"new@b.com","password":"longenough"}"#)
            .await
            .unwrap();
        assert_eq!(f.store.audit_events().await[0].action, "user.signup");

        let actor = Actor::new(session.user.id, Some("new@b.com".into()));
        let profile = f.service.me(&actor).await;
        assert_eq!(profile.role, Role::User);
        assert_eq!(profile.role_source, "default");

        f.service.logout(&actor, &session.access_token).await.unwrap();
        assert_eq!(f.store.audit_events().await[1].action, "user.logout");
    }

    #[tokio::test]
    async fn invalid_login_payload_is_rejected_before_the_provider() {
        let f = fixture();
        let err = f
            .service
            .login(&client(), br#"{"email":"nope","password":"","remember":true}"#)
            .await
            .unwrap_err();
        match err {
            ServiceError::Validation(errors) => {
                let mut fields = errors.fields();
                fields.sort();
                assert_eq!(fields, vec!["email", "password", "remember"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(f.guard.attempts("1.2.3.4", "nope"), 0);
    }
}
