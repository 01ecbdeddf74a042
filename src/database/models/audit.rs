use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::AuditAction;

/// Stored audit record. `action` stays a plain string because other
/// services write to the same table with tags this crate does not emit.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditEvent {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_email: Option<String>,
    pub action: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub details: Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Audit record about to be written
#[derive(Debug, Clone, Serialize)]
pub struct NewAuditEvent {
    pub user_id: Option<Uuid>,
    pub user_email: Option<String>,
    pub action: AuditAction,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub details: Map<String, Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewAuditEvent {
    pub fn new(action: AuditAction) -> Self {
        Self {
            user_id: None,
            user_email: None,
            action,
            resource_type: None,
            resource_id: None,
            details: Map::new(),
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn actor(mut self, user_id: Uuid, email: Option<String>) -> Self {
        self.user_id = Some(user_id);
        self.user_email = email;
        self
    }

    pub fn resource(mut self, resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn network(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }

    /// Materialize into a stored row
    pub fn into_event(self, id: Uuid, created_at: DateTime<Utc>) -> AuditEvent {
        AuditEvent {
            id,
            user_id: self.user_id,
            user_email: self.user_email,
            action: self.action.as_str().to_string(),
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            details: Value::Object(self.details),
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            created_at,
        }
    }
}

/// Validated audit-log query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFilter {
    pub action: Option<AuditAction>,
    pub resource_type: Option<String>,
    pub user_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl AuditFilter {
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(action) = self.action {
            if event.action != action.as_str() {
                return false;
            }
        }
        if let Some(resource_type) = &self.resource_type {
            if event.resource_type.as_deref() != Some(resource_type.as_str()) {
                return false;
            }
        }
        if let Some(user_id) = self.user_id {
            if event.user_id != Some(user_id) {
                return false;
            }
        }
        if let Some(start) = self.start_date {
            if event.created_at < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if event.created_at > end {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditPage {
    pub logs: Vec<AuditEvent>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}
