/// Whether a request's `Origin` may perform a mutating call.
///
/// Requests without an `Origin` header (server-to-server, curl) pass. A
/// present origin must match an allow-list entry exactly, ignoring a
/// trailing slash and ASCII case; `*` in the list admits everything.
pub fn origin_allowed(origin: Option<&str>, allowed: &[String]) -> bool {
    let Some(origin) = origin else {
        return true;
    };
    let origin = origin.trim().trim_end_matches('/');
    if origin.is_empty() || origin.eq_ignore_ascii_case("null") {
        return false;
    }
    allowed.iter().any(|entry| {
        let entry = entry.trim().trim_end_matches('/');
        entry == "*" || entry.eq_ignore_ascii_case(origin)
    })
}
