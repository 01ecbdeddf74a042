use std::fmt;

use crate::sanitize::{contains_sql_injection, contains_xss};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackKind {
    PathTraversal,
    Xss,
    SqlInjection,
}

impl fmt::Display for AttackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AttackKind::PathTraversal => "path_traversal",
            AttackKind::Xss => "xss",
            AttackKind::SqlInjection => "sql_injection",
        })
    }
}

const TRAVERSAL_MARKERS: &[&str] = &["../", "..\\", "%2e%2e", "%252e", "..%2f", "..%5c", "%00", "\0"];

fn has_traversal(raw: &str) -> bool {
    let lowered = raw.to_ascii_lowercase();
    TRAVERSAL_MARKERS.iter().any(|m| lowered.contains(m)) || lowered.ends_with("/..")
}

/// Scan a request path and raw query string for well-known attack payloads.
/// Query pairs are percent-decoded before the XSS and SQL scans.
pub fn detect_attack(path: &str, query: Option<&str>) -> Option<AttackKind> {
    if has_traversal(path) {
        return Some(AttackKind::PathTraversal);
    }

    let query = query?;
    if has_traversal(query) {
        return Some(AttackKind::PathTraversal);
    }

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        for part in [key.as_ref(), value.as_ref()] {
            if has_traversal(part) {
                return Some(AttackKind::PathTraversal);
            }
            if contains_xss(part) {
                return Some(AttackKind::Xss);
            }
            if contains_sql_injection(part) {
                return Some(AttackKind::SqlInjection);
            }
        }
    }
    None
}
