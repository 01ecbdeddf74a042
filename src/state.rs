use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::AdminStore;
use crate::identity::IdentityProvider;
use crate::security::{AbuseGuard, Clock, InMemoryRateLimiter, RateLimitStore};
use crate::services::{
    AnalyticsService, AuditLogService, AuditRecorder, AuthorizationGate, CreditUsageService, SecurityService,
    SessionService, UserAdminService,
};

/// Everything a request handler may reach, injected through axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn AdminStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub clock: Arc<dyn Clock>,
    pub gate: Arc<AuthorizationGate>,
    pub recorder: Arc<AuditRecorder>,
    pub rate_limiter: Arc<dyn RateLimitStore>,
    pub abuse: Arc<AbuseGuard>,
    pub users: Arc<UserAdminService>,
    pub audit_logs: Arc<AuditLogService>,
    pub analytics: Arc<AnalyticsService>,
    pub credit_usage: Arc<CreditUsageService>,
    pub security: Arc<SecurityService>,
    pub sessions: Arc<SessionService>,
}

impl AppState {
    /// Wire services over the given collaborators with an in-process rate limiter
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn AdminStore>,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let limiter: Arc<dyn RateLimitStore> = Arc::new(InMemoryRateLimiter::new(clock.clone()));
        Self::with_rate_limiter(config, store, identity, clock, limiter)
    }

    pub fn with_rate_limiter(
        config: Arc<AppConfig>,
        store: Arc<dyn AdminStore>,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
        rate_limiter: Arc<dyn RateLimitStore>,
    ) -> Self {
        let gate = Arc::new(AuthorizationGate::new(store.clone()));
        let recorder = Arc::new(AuditRecorder::new(store.clone()));
        let abuse = Arc::new(AbuseGuard::new(&config.abuse, clock.clone()));

        Self {
            users: Arc::new(UserAdminService::new(store.clone(), gate.clone(), recorder.clone())),
            audit_logs: Arc::new(AuditLogService::new(store.clone(), gate.clone(), recorder.clone())),
            analytics: Arc::new(AnalyticsService::new(store.clone(), gate.clone(), clock.clone())),
            credit_usage: Arc::new(CreditUsageService::new(store.clone(), gate.clone(), config.plans.clone())),
            security: Arc::new(SecurityService::new(abuse.clone(), gate.clone(), recorder.clone())),
            sessions: Arc::new(SessionService::new(
                identity.clone(),
                abuse.clone(),
                gate.clone(),
                recorder.clone(),
            )),
            config,
            store,
            identity,
            clock,
            gate,
            recorder,
            rate_limiter,
            abuse,
        }
    }
}
