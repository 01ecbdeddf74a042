use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{Actor, AuthorizationGate, ServiceError};
use crate::config::PlansConfig;
use crate::database::models::UsageSnapshot;
use crate::database::AdminStore;
use crate::types::SubscriptionTier;

#[derive(Debug, Clone, Serialize)]
pub struct CreditUsageEntry {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub tier: SubscriptionTier,
    pub credits_used: i64,
    pub credits_limit: i64,
    pub credits_remaining: i64,
    pub credits_exhausted: bool,
    pub canvases_used: i64,
    pub canvases_limit: i64,
    pub canvases_remaining: i64,
    pub canvases_exhausted: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreditUsageReport {
    pub users: Vec<CreditUsageEntry>,
    pub total_users: usize,
    pub credits_exhausted: usize,
    pub canvases_exhausted: usize,
}

/// Join a usage snapshot with its plan limits
pub fn usage_entry(snapshot: UsageSnapshot, plans: &PlansConfig) -> CreditUsageEntry {
    let limits = plans.limits_for(snapshot.tier);
    CreditUsageEntry {
        credits_limit: limits.credits,
        credits_remaining: (limits.credits - snapshot.credits_used).max(0),
        credits_exhausted: snapshot.credits_used >= limits.credits,
        canvases_limit: limits.canvases,
        canvases_remaining: (limits.canvases - snapshot.canvases_used).max(0),
        canvases_exhausted: snapshot.canvases_used >= limits.canvases,
        user_id: snapshot.user_id,
        email: snapshot.email,
        tier: snapshot.tier,
        credits_used: snapshot.credits_used,
        canvases_used: snapshot.canvases_used,
        updated_at: snapshot.updated_at,
    }
}

pub struct CreditUsageService {
    store: Arc<dyn AdminStore>,
    gate: Arc<AuthorizationGate>,
    plans: PlansConfig,
}

impl CreditUsageService {
    pub fn new(store: Arc<dyn AdminStore>, gate: Arc<AuthorizationGate>, plans: PlansConfig) -> Self {
        Self { store, gate, plans }
    }

    pub async fn report(&self, actor: &Actor) -> Result<CreditUsageReport, ServiceError> {
        self.gate.require_admin(actor).await?;

        let users: Vec<CreditUsageEntry> = self
            .store
            .usage_snapshots()
            .await?
            .into_iter()
            .map(|s| usage_entry(s, &self.plans))
            .collect();

        Ok(CreditUsageReport {
            total_users: users.len(),
            credits_exhausted: users.iter().filter(|u| u.credits_exhausted).count(),
            canvases_exhausted: users.iter().filter(|u| u.canvases_exhausted).count(),
            users,
        })
    }
}
