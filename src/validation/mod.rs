//! Request schemas.
//!
//! Every admin-facing payload is parsed through [`parse_payload`], which
//! enforces a closed field set and collects *all* offending fields before
//! rejecting. Nothing is applied from a payload that failed here.

mod audit_query;
mod schemas;

pub use audit_query::parse_audit_query;
pub use schemas::{
    LoginRequest, RegisterRequest, SubscriptionActionRequest, UnblockIpRequest, UpdateRoleRequest,
};

use serde::de::DeserializeOwned;
use serde_json::Value;
use validator::Validate;

use crate::error::FieldError;

/// Accumulated field-level failures
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.field.as_str()).collect()
    }

    pub fn into_vec(self) -> Vec<FieldError> {
        self.0
    }

    /// `Ok(value)` when nothing was collected
    pub fn finish<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    /// Append validator failures, skipping fields already reported
    fn extend_from_validator(&mut self, errors: &validator::ValidationErrors, reported: &[&str]) {
        let mut collected: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .filter(|(field, _)| {
                let name: &str = field;
                !reported.contains(&name)
            })
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value ({})", e.code));
                    FieldError::new(field.to_string(), message)
                })
            })
            .collect();
        collected.sort_by(|a, b| a.field.cmp(&b.field));
        self.0.extend(collected);
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|e| format!("{}: {}", e.field, e.message)).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// A payload type with a closed set of accepted fields. Every field is a
/// required string; anything else is reported against the field itself.
pub trait Schema: DeserializeOwned + Validate {
    const FIELDS: &'static [&'static str];
}

/// Parse and validate a JSON body against `T`'s schema.
pub fn parse_payload<T: Schema>(payload: Value) -> Result<T, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let Value::Object(mut map) = payload else {
        errors.push("body", "Expected a JSON object");
        return Err(errors);
    };

    let unknown: Vec<String> = map
        .keys()
        .filter(|k| !T::FIELDS.contains(&k.as_str()))
        .cloned()
        .collect();
    for key in unknown {
        map.remove(&key);
        errors.push(key, "Unrecognized field");
    }

    // Missing and mistyped fields are reported one by one, then stubbed so
    // the rest of the payload still reaches the validators.
    let mut reported: Vec<&str> = Vec::new();
    for &field in T::FIELDS {
        let message = match map.get(field) {
            Some(Value::String(_)) => continue,
            None | Some(Value::Null) => "This field is required",
            Some(_) => "Must be a string",
        };
        errors.push(field, message);
        reported.push(field);
        map.insert(field.to_string(), Value::String(String::new()));
    }

    match serde_json::from_value::<T>(Value::Object(map)) {
        Ok(parsed) => {
            if let Err(e) = parsed.validate() {
                errors.extend_from_validator(&e, &reported);
            }
            errors.finish(parsed)
        }
        Err(e) => {
            let (field, message) = describe_serde_error(&e);
            errors.push(field, message);
            Err(errors)
        }
    }
}

/// Decode a raw request body and run it through [`parse_payload`].
/// An empty body is treated as `{}` so missing fields are reported by name.
pub fn parse_json_body<T: Schema>(body: &[u8]) -> Result<T, ValidationErrors> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return parse_payload(Value::Object(Default::default()));
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => parse_payload(value),
        Err(_) => {
            let mut errors = ValidationErrors::new();
            errors.push("body", "Malformed JSON");
            Err(errors)
        }
    }
}

/// serde_json names the field only for missing fields; type errors go on the body
fn describe_serde_error(e: &serde_json::Error) -> (String, String) {
    let text = e.to_string();
    if let Some(rest) = text.strip_prefix("missing field `") {
        if let Some(end) = rest.find('`') {
            return (rest[..end].to_string(), "This field is required".to_string());
        }
    }
    let message = text.split(" at line").next().unwrap_or(&text).to_string();
    ("body".to_string(), message)
}
