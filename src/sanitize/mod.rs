//! String cleaning for untrusted input.
//!
//! Every function here is total: invalid input yields an empty or neutral
//! string, never an error. Callers treat `""` from [`sanitize_email`],
//! [`sanitize_url`] and [`sanitize_filename`] as "reject".
//!
//! [`contains_xss`] and [`contains_sql_injection`] are advisory scans. They
//! feed logging and blocking decisions and never modify data.

use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};

const MAX_EMAIL_LEN: usize = 254;
const MAX_FILENAME_LEN: usize = 255;

static SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").unwrap());
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]*[a-z0-9])?)+$")
        .unwrap()
});

static XSS_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)<\s*script",
        r"(?i)javascript\s*:",
        r"(?i)vbscript\s*:",
        r"(?i)\bon[a-z]+\s*=",
        r"(?i)<\s*(iframe|object|embed|svg|meta)\b",
        r"(?i)\beval\s*\(",
        r"(?i)expression\s*\(",
        r"(?i)data\s*:\s*text/html",
    ])
    .unwrap()
});

static SQL_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)\bunion\s+(all\s+)?select\b",
        r"(?i)'\s*(or|and)\s+'?\w+'?\s*=\s*'?\w+",
        r"(?i);\s*(drop|delete|insert|update|alter|create|truncate)\s",
        r"(?i)\b(drop|truncate)\s+table\b",
        r"--\s*$",
        r"/\*.*\*/",
        r"(?i)\b(sleep|benchmark)\s*\(",
        r"(?i)\bwaitfor\s+delay\b",
        r"(?i)\bexec(ute)?\s*(\(|\s+xp_)",
    ])
    .unwrap()
});

const BLOCKED_SCHEMES: &[&str] = &["javascript:", "data:", "vbscript:", "file:"];

/// Remove every tag; `<script>`/`<style>` blocks lose their contents too.
pub fn strip_html(input: &str) -> String {
    let without_blocks = SCRIPT_BLOCK.replace_all(input, "");
    let without_tags = TAG.replace_all(&without_blocks, "");
    without_tags.replace(['<', '>'], "").trim().to_string()
}

/// Escape HTML metacharacters for echoing untrusted text
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            _ => out.push(c),
        }
    }
    out
}

/// Free text: markup stripped, control characters dropped, capped at `max_chars`.
pub fn sanitize_text(input: &str, max_chars: usize) -> String {
    strip_html(input)
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .take(max_chars)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Normalized lowercase address, or `""` when the input is not a plausible
/// email (exactly one `@`, at least one `.` after it).
pub fn sanitize_email(input: &str) -> String {
    let candidate = input.trim();
    if !candidate.is_ascii() || candidate.len() > MAX_EMAIL_LEN {
        return String::new();
    }
    let lowered = candidate.to_ascii_lowercase();
    if EMAIL.is_match(&lowered) {
        lowered
    } else {
        String::new()
    }
}

/// http(s) URL in canonical form. Dangerous schemes yield `""`; a bare
/// host such as `example.com/path` becomes `https://example.com/path`.
pub fn sanitize_url(input: &str) -> String {
    let trimmed: String = input.trim().chars().filter(|c| !c.is_control()).collect();
    if trimmed.is_empty() {
        return String::new();
    }

    let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_ascii_lowercase();
    if BLOCKED_SCHEMES.iter().any(|scheme| compact.starts_with(scheme)) {
        return String::new();
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed
    } else {
        format!("https://{}", trimmed.trim_start_matches('/'))
    };

    match url::Url::parse(&with_scheme) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => url.to_string(),
        _ => String::new(),
    }
}

/// File name with traversal sequences, separators and NUL removed
pub fn sanitize_filename(input: &str) -> String {
    let mut name: String = input
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0') && !c.is_control())
        .collect();
    while name.contains("..") {
        name = name.replace("..", "");
    }
    name.trim().chars().take(MAX_FILENAME_LEN).collect()
}

pub fn contains_xss(input: &str) -> bool {
    XSS_PATTERNS.is_match(input)
}

pub fn contains_sql_injection(input: &str) -> bool {
    SQL_PATTERNS.is_match(input)
}
