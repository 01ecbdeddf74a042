use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use super::ValidationErrors;
use crate::database::models::AuditFilter;
use crate::types::AuditAction;

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 100;
const MAX_RESOURCE_TYPE_LEN: usize = 64;

const FIELDS: &[&str] = &[
    "action",
    "resource_type",
    "start_date",
    "end_date",
    "limit",
    "offset",
    "user_id",
];

/// Parse `GET /admin/audit-logs` query parameters into a filter.
///
/// Empty values are treated as absent. `limit` is clamped into
/// `1..=MAX_LIMIT`, but a non-numeric limit or a negative offset is an error.
pub fn parse_audit_query(params: &HashMap<String, String>) -> Result<AuditFilter, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let mut filter = AuditFilter {
        limit: DEFAULT_LIMIT,
        ..Default::default()
    };

    let mut unknown: Vec<&String> = params.keys().filter(|k| !FIELDS.contains(&k.as_str())).collect();
    unknown.sort();
    for key in unknown {
        errors.push(key.clone(), "Unrecognized field");
    }

    let get = |key: &str| params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

    if let Some(action) = get("action") {
        match action.parse::<AuditAction>() {
            Ok(action) => filter.action = Some(action),
            Err(_) => errors.push("action", "Unknown audit action"),
        }
    }

    if let Some(resource_type) = get("resource_type") {
        if resource_type.len() > MAX_RESOURCE_TYPE_LEN {
            errors.push("resource_type", "Resource type is too long");
        } else {
            filter.resource_type = Some(resource_type.to_string());
        }
    }

    if let Some(user_id) = get("user_id") {
        match Uuid::parse_str(user_id) {
            Ok(id) => filter.user_id = Some(id),
            Err(_) => errors.push("user_id", "Must be a valid UUID"),
        }
    }

    filter.start_date = parse_date(get("start_date"), "start_date", &mut errors);
    filter.end_date = parse_date(get("end_date"), "end_date", &mut errors);
    if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
        if start > end {
            errors.push("start_date", "start_date must not be after end_date");
        }
    }

    if let Some(limit) = get("limit") {
        match limit.parse::<i64>() {
            Ok(n) => filter.limit = n.clamp(1, MAX_LIMIT),
            Err(_) => errors.push("limit", "Must be an integer"),
        }
    }

    if let Some(offset) = get("offset") {
        match offset.parse::<i64>() {
            Ok(n) if n >= 0 => filter.offset = n,
            Ok(_) => errors.push("offset", "Must be zero or greater"),
            Err(_) => errors.push("offset", "Must be an integer"),
        }
    }

    errors.finish(filter)
}

fn parse_date(raw: Option<&str>, field: &str, errors: &mut ValidationErrors) -> Option<DateTime<Utc>> {
    let raw = raw?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(_) => {
            errors.push(field, "Must be an RFC 3339 timestamp");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_when_empty() {
        let filter = parse_audit_query(&HashMap::new()).unwrap();
        assert_eq!(filter.limit, DEFAULT_LIMIT);
        assert_eq!(filter.offset, 0);
        assert!(filter.action.is_none());
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(parse_audit_query(&params(&[("limit", "1000")])).unwrap().limit, 100);
        assert_eq!(parse_audit_query(&params(&[("limit", "0")])).unwrap().limit, 1);
    }

    #[test]
    fn parses_full_query() {
        let filter = parse_audit_query(&params(&[
            ("action", "role.updated"),
            ("resource_type", "user"),
            ("start_date", "2024-01-01T00:00:00Z"),
            ("end_date", "2024-01-02T00:00:00+02:00"),
            ("offset", "20"),
        ]))
        .unwrap();
        assert_eq!(filter.action, Some(AuditAction::RoleUpdated));
        assert_eq!(filter.resource_type.as_deref(), Some("user"));
        assert_eq!(filter.offset, 20);
        assert_eq!(filter.end_date.unwrap().to_rfc3339(), "2024-01-01T22:00:00+00:00");
    }

    #[test]
    fn reports_every_bad_parameter() {
        let errors = parse_audit_query(&params(&[
            ("action", "user.hacked"),
            ("start_date", "yesterday"),
            ("offset", "-1"),
            ("limit", "ten"),
            ("user_id", "nope"),
            ("sort", "asc"),
        ]))
        .unwrap_err();

        let mut fields = errors.fields();
        fields.sort();
        assert_eq!(fields, vec!["action", "limit", "offset", "sort", "start_date", "user_id"]);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let errors = parse_audit_query(&params(&[
            ("start_date", "2024-02-01T00:00:00Z"),
            ("end_date", "2024-01-01T00:00:00Z"),
        ]))
        .unwrap_err();
        assert_eq!(errors.fields(), vec!["start_date"]);
    }
}
