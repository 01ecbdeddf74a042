use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use admin_console::config::AppConfig;
use admin_console::database::{AdminStore, InMemoryStore};
use admin_console::identity::StaticIdentityProvider;
use admin_console::security::SystemClock;
use admin_console::types::{Role, SubscriptionTier};
use admin_console::{app, AppState};

const ORIGIN: &str = "https://console.example.com";

struct Harness {
    app: Router,
    store: Arc<InMemoryStore>,
    identity: Arc<StaticIdentityProvider>,
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

impl Harness {
    fn new() -> Self {
        let config = Arc::new(AppConfig::for_tests());
        let store = Arc::new(InMemoryStore::new());
        let identity = Arc::new(StaticIdentityProvider::new(config.identity.jwt_secret.clone()));
        let state = AppState::new(config, store.clone(), identity.clone(), Arc::new(SystemClock));
        Self {
            app: app(state),
            store,
            identity,
        }
    }

    /// Seed a profile and return its id with a valid bearer token
    async fn user(&self, email: &str, role: Role, tier: SubscriptionTier) -> (Uuid, String) {
        let id = self.store.add_user(email, role, tier).await;
        let token = self.identity.issue_token(id, Some(email)).unwrap();
        (id, token)
    }

    async fn send(&self, method: Method, uri: &str, ip: &str, token: Option<&str>, body: Option<Value>) -> Reply {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", ip)
            .header(header::ORIGIN, ORIGIN);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.dispatch(request).await
    }

    async fn dispatch(&self, request: Request<Body>) -> Reply {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Reply { status, headers, body }
    }
}

fn field_names(body: &Value) -> Vec<String> {
    body["field_errors"]
        .as_array()
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e["field"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn plain_user_cannot_change_roles() {
    let h = Harness::new();
    let (_, token) = h.user("member@example.com", Role::User, SubscriptionTier::Free).await;
    let (target, _) = h.user("target@example.com", Role::User, SubscriptionTier::Free).await;

    let reply = h
        .send(
            Method::POST,
            &format!("/admin/users/{}/role", target),
            "203.0.113.1",
            Some(&token),
            Some(json!({ "role": "admin" })),
        )
        .await;

    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.body["message"], "Unauthorized");
    assert_eq!(h.store.find_role(target).await.unwrap(), Some(Role::User));
    assert!(h.store.audit_events().await.is_empty());
}

#[tokio::test]
async fn plain_user_is_rejected_before_the_body_is_examined() {
    let h = Harness::new();
    let (_, token) = h.user("member@example.com", Role::User, SubscriptionTier::Free).await;
    let (target, _) = h.user("target@example.com", Role::User, SubscriptionTier::Free).await;

    let reply = h
        .send(
            Method::POST,
            &format!("/admin/users/{}/role", target),
            "203.0.113.2",
            Some(&token),
            Some(json!({ "role": "emperor", "junk": true })),
        )
        .await;

    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert!(reply.body.get("field_errors").is_none());
}

#[tokio::test]
async fn admin_promotes_user_to_moderator() {
    let h = Harness::new();
    let (admin, token) = h.user("boss@example.com", Role::Admin, SubscriptionTier::Free).await;
    let (target, _) = h.user("target@example.com", Role::User, SubscriptionTier::Free).await;

    let reply = h
        .send(
            Method::POST,
            &format!("/admin/users/{}/role", target),
            "203.0.113.3",
            Some(&token),
            Some(json!({ "role": "moderator" })),
        )
        .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["success"], true);
    assert_eq!(reply.body["data"]["old_role"], "user");
    assert_eq!(reply.body["data"]["new_role"], "moderator");
    assert_eq!(h.store.find_role(target).await.unwrap(), Some(Role::Moderator));

    let events = h.store.audit_events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, "role.updated");
    assert_eq!(events[0].user_id, Some(admin));
    assert_eq!(events[0].resource_id.as_deref(), Some(target.to_string().as_str()));
    assert_eq!(events[0].details["target_email"], "target@example.com");
    assert_eq!(events[0].details["old_role"], "user");
    assert_eq!(events[0].details["new_role"], "moderator");
    assert_eq!(events[0].ip_address.as_deref(), Some("203.0.113.3"));

    let reply = h
        .send(
            Method::GET,
            &format!("/admin/users/{}/role", target),
            "203.0.113.3",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["role"], "moderator");
}

#[tokio::test]
async fn invalid_role_payload_reports_every_field() {
    let h = Harness::new();
    let (_, token) = h.user("boss@example.com", Role::Admin, SubscriptionTier::Free).await;
    let (target, _) = h.user("target@example.com", Role::User, SubscriptionTier::Free).await;

    let reply = h
        .send(
            Method::POST,
            &format!("/admin/users/{}/role", target),
            "203.0.113.4",
            Some(&token),
            Some(json!({ "role": "superuser", "extra": 1 })),
        )
        .await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["code"], "VALIDATION_ERROR");
    let fields = field_names(&reply.body);
    assert!(fields.contains(&"role".to_string()), "{:?}", fields);
    assert!(fields.contains(&"extra".to_string()), "{:?}", fields);
    assert_eq!(h.store.find_role(target).await.unwrap(), Some(Role::User));
}

#[tokio::test]
async fn admin_cannot_change_own_role() {
    let h = Harness::new();
    let (admin, token) = h.user("boss@example.com", Role::Admin, SubscriptionTier::Free).await;

    let reply = h
        .send(
            Method::POST,
            &format!("/admin/users/{}/role", admin),
            "203.0.113.5",
            Some(&token),
            Some(json!({ "role": "user" })),
        )
        .await;

    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(h.store.find_role(admin).await.unwrap(), Some(Role::Admin));
}

#[tokio::test]
async fn malformed_user_id_is_not_found() {
    let h = Harness::new();
    let (_, token) = h.user("boss@example.com", Role::Admin, SubscriptionTier::Free).await;

    let (_, plain) = h.user("plain@example.com", Role::User, SubscriptionTier::Free).await;

    let reply = h
        .send(Method::GET, "/admin/users/not-a-uuid/role", "203.0.113.6", Some(&token), None)
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    // non-admins hit the gate before the id is looked at
    let reply = h
        .send(Method::GET, "/admin/users/not-a-uuid/role", "203.0.113.6", Some(&plain), None)
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.body["message"], "Unauthorized");

    let reply = h
        .send(
            Method::POST,
            "/admin/users/not-a-uuid/role",
            "203.0.113.6",
            Some(&plain),
            Some(json!({ "role": "superuser" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert!(field_names(&reply.body).is_empty());
}

#[tokio::test]
async fn revoking_requires_an_active_premium_subscription() {
    let h = Harness::new();
    let (_, token) = h.user("boss@example.com", Role::Admin, SubscriptionTier::Free).await;
    let (free, _) = h.user("free@example.com", Role::User, SubscriptionTier::Free).await;
    let (premium, _) = h.user("paid@example.com", Role::User, SubscriptionTier::Premium).await;

    let reply = h
        .send(
            Method::POST,
            &format!("/admin/users/{}/subscription", free),
            "203.0.113.7",
            Some(&token),
            Some(json!({ "action": "revoke" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert!(h.store.audit_events().await.is_empty());

    let reply = h
        .send(
            Method::POST,
            &format!("/admin/users/{}/subscription", premium),
            "203.0.113.7",
            Some(&token),
            Some(json!({ "action": "upgrade" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    for action in [String::new(), "x".repeat(64)] {
        let reply = h
            .send(
                Method::POST,
                &format!("/admin/users/{}/subscription", premium),
                "203.0.113.7",
                Some(&token),
                Some(json!({ "action": action })),
            )
            .await;
        assert_eq!(reply.status, StatusCode::FORBIDDEN, "{:?}", action);
    }
    assert_eq!(
        h.store.find_subscription_tier(premium).await.unwrap(),
        Some(SubscriptionTier::Premium)
    );

    let reply = h
        .send(
            Method::POST,
            &format!("/admin/users/{}/subscription", premium),
            "203.0.113.7",
            Some(&token),
            Some(json!({ "action": "revoke" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["previous_tier"], "premium");
    assert_eq!(reply.body["data"]["subscription_tier"], "free");
    assert_eq!(
        h.store.find_subscription_tier(premium).await.unwrap(),
        Some(SubscriptionTier::Free)
    );

    let events = h.store.audit_events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, "subscription.revoked");
}

#[tokio::test]
async fn admin_lists_users_with_roles_and_tiers() {
    let h = Harness::new();
    let (_, token) = h.user("boss@example.com", Role::Admin, SubscriptionTier::Free).await;
    h.user("paid@example.com", Role::Moderator, SubscriptionTier::Premium).await;

    let reply = h.send(Method::GET, "/admin/users", "203.0.113.8", Some(&token), None).await;
    assert_eq!(reply.status, StatusCode::OK);

    let users = reply.body["data"].as_array().cloned().unwrap_or_default();
    assert_eq!(users.len(), 2);
    let paid = users.iter().find(|u| u["email"] == "paid@example.com").unwrap();
    assert_eq!(paid["role"], "moderator");
    assert_eq!(paid["subscription_tier"], "premium");
    assert_eq!(paid["session_count"], 0);
}

#[tokio::test]
async fn missing_or_bad_token_is_unauthorized() {
    let h = Harness::new();

    let reply = h.send(Method::GET, "/admin/stats", "203.0.113.9", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = h
        .send(Method::GET, "/admin/stats", "203.0.113.9", Some("not.a.jwt"), None)
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn moderator_reads_stats_but_user_does_not() {
    let h = Harness::new();
    let (_, moderator) = h.user("mod@example.com", Role::Moderator, SubscriptionTier::Free).await;
    let (member_id, member) = h.user("member@example.com", Role::User, SubscriptionTier::Free).await;
    h.store
        .add_session(member_id, "canvas", chrono::Utc::now() - chrono::Duration::hours(2))
        .await;

    let reply = h.send(Method::GET, "/admin/stats", "203.0.113.10", Some(&member), None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = h
        .send(Method::GET, "/admin/stats", "203.0.113.10", Some(&moderator), None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let stats = &reply.body["data"];
    assert_eq!(stats["total_users"], 2);
    assert_eq!(stats["total_sessions"], 1);
    assert_eq!(stats["activity_timeline_7d"].as_array().map(Vec::len), Some(7));
    assert_eq!(stats["activity_timeline_24h"].as_array().map(Vec::len), Some(24));
    assert_eq!(stats["most_used_agents"][0]["agent_type"], "canvas");
}

#[tokio::test]
async fn audit_log_query_is_validated_and_clamped() {
    let h = Harness::new();
    let (_, moderator) = h.user("mod@example.com", Role::Moderator, SubscriptionTier::Free).await;

    let reply = h
        .send(
            Method::GET,
            "/admin/audit-logs?limit=500",
            "203.0.113.11",
            Some(&moderator),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["limit"], 100);
    assert_eq!(reply.body["data"]["offset"], 0);

    let reply = h
        .send(
            Method::GET,
            "/admin/audit-logs?action=user.hacked&colour=blue",
            "203.0.113.11",
            Some(&moderator),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    let fields = field_names(&reply.body);
    assert!(fields.contains(&"action".to_string()), "{:?}", fields);
    assert!(fields.contains(&"colour".to_string()), "{:?}", fields);
}

#[tokio::test]
async fn clearing_audit_logs_leaves_one_record_of_the_clear() {
    let h = Harness::new();
    let (_, admin) = h.user("boss@example.com", Role::Admin, SubscriptionTier::Free).await;
    let (_, moderator) = h.user("mod@example.com", Role::Moderator, SubscriptionTier::Free).await;
    let (target, _) = h.user("target@example.com", Role::User, SubscriptionTier::Free).await;

    // produces one audit event
    h.send(
        Method::POST,
        &format!("/admin/users/{}/role", target),
        "203.0.113.12",
        Some(&admin),
        Some(json!({ "role": "moderator" })),
    )
    .await;

    let reply = h
        .send(Method::DELETE, "/admin/audit-logs/clear", "203.0.113.12", Some(&moderator), None)
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(h.store.audit_events().await.len(), 1);

    let reply = h
        .send(Method::DELETE, "/admin/audit-logs/clear", "203.0.113.12", Some(&admin), None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["deleted_count"], 1);

    let events = h.store.audit_events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, "audit_logs.cleared");
    assert_eq!(events[0].details["deleted_count"], 1);
}

#[tokio::test]
async fn credit_usage_reports_exhausted_users() {
    let h = Harness::new();
    let (_, admin) = h.user("boss@example.com", Role::Admin, SubscriptionTier::Free).await;
    let (heavy, _) = h.user("heavy@example.com", Role::User, SubscriptionTier::Free).await;
    h.store.set_usage(heavy, 100, 1).await;

    let reply = h.send(Method::GET, "/admin/credit-usage", "203.0.113.13", Some(&admin), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["total_users"], 1);
    assert_eq!(reply.body["data"]["credits_exhausted"], 1);
    assert_eq!(reply.body["data"]["canvases_exhausted"], 0);
}

#[tokio::test]
async fn empty_login_reports_both_fields() {
    let h = Harness::new();

    let reply = h
        .send(Method::POST, "/auth/login", "198.51.100.20", None, Some(json!({})))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(field_names(&reply.body), vec!["email", "password"]);

    let reply = h
        .send(
            Method::POST,
            "/auth/login",
            "198.51.100.20",
            None,
            Some(json!({ "email": "bad", "password": 5 })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    let mut fields = field_names(&reply.body);
    fields.sort();
    assert_eq!(fields, vec!["email", "password"]);
}

#[tokio::test]
async fn repeated_failed_logins_block_the_ip() {
    let h = Harness::new();
    let (_, admin) = h.user("boss@example.com", Role::Admin, SubscriptionTier::Free).await;
    let victim = Uuid::new_v4();
    h.identity.add_account(victim, "victim@example.com", "right-password").await;

    let attacker = "198.51.100.7";
    for _ in 0..10 {
        let reply = h
            .send(
                Method::POST,
                "/auth/login",
                attacker,
                None,
                Some(json!({ "email": "victim@example.com", "password": "wrong-password" })),
            )
            .await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    }

    // even the right password is refused now, as is everything else from that IP
    let reply = h
        .send(
            Method::POST,
            "/auth/login",
            attacker,
            None,
            Some(json!({ "email": "victim@example.com", "password": "right-password" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.body["message"], "Access denied");

    let reply = h.send(Method::GET, "/health", attacker, None, None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    // another IP is unaffected
    let reply = h
        .send(
            Method::POST,
            "/auth/login",
            "198.51.100.8",
            None,
            Some(json!({ "email": "victim@example.com", "password": "right-password" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = h
        .send(Method::GET, "/admin/security/blocked", "198.51.100.9", Some(&admin), None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"][0]["ip"], attacker);

    let reply = h
        .send(
            Method::POST,
            "/admin/security/unblock",
            "198.51.100.9",
            Some(&admin),
            Some(json!({ "ip": attacker })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["unblocked"], true);

    let reply = h.send(Method::GET, "/health", attacker, None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
}

#[tokio::test]
async fn hundred_and_first_request_is_rate_limited() {
    let h = Harness::new();
    let ip = "192.0.2.44";

    for _ in 0..100 {
        let reply = h.send(Method::GET, "/health", ip, None, None).await;
        assert_eq!(reply.status, StatusCode::OK);
    }

    let reply = h.send(Method::GET, "/health", ip, None, None).await;
    assert_eq!(reply.status, StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = reply.headers[header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
    assert!((1..=60).contains(&retry_after), "retry after {}", retry_after);

    // the limit is per IP and per route
    let reply = h.send(Method::GET, "/health", "192.0.2.45", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    let reply = h.send(Method::GET, "/", ip, None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
}

#[tokio::test]
async fn foreign_origin_cannot_mutate() {
    let h = Harness::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/login")
        .header("x-forwarded-for", "192.0.2.50")
        .header(header::ORIGIN, "https://evil.example")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "email": "a@b.com", "password": "x" }).to_string()))
        .unwrap();

    let reply = h.dispatch(request).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.body["message"], "Origin not allowed");

    // reads are not origin checked
    let request = Request::builder()
        .uri("/health")
        .header("x-forwarded-for", "192.0.2.50")
        .header(header::ORIGIN, "https://evil.example")
        .body(Body::empty())
        .unwrap();
    assert_eq!(h.dispatch(request).await.status, StatusCode::OK);
}

#[tokio::test]
async fn attack_patterns_are_rejected() {
    let h = Harness::new();

    let reply = h
        .send(
            Method::GET,
            "/health?q=%3Cscript%3Ealert(1)%3C%2Fscript%3E",
            "192.0.2.60",
            None,
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["message"], "Request rejected");

    let reply = h.send(Method::GET, "/files/..%2fsecret", "192.0.2.60", None, None).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn session_round_trip_is_audited() {
    let h = Harness::new();
    let id = Uuid::new_v4();
    h.identity.add_account(id, "member@example.com", "right-password").await;

    let reply = h
        .send(
            Method::POST,
            "/auth/login",
            "192.0.2.70",
            None,
            Some(json!({ "email": "member@example.com", "password": "right-password" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let token = reply.body["data"]["access_token"].as_str().unwrap().to_string();

    let reply = h.send(Method::GET, "/auth/me", "192.0.2.70", Some(&token), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["user_id"], id.to_string());
    assert_eq!(reply.body["data"]["role"], "user");
    assert_eq!(reply.body["data"]["role_source"], "default");

    let reply = h
        .send(Method::POST, "/auth/logout", "192.0.2.70", Some(&token), None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);

    let actions: Vec<String> = h.store.audit_events().await.into_iter().map(|e| e.action).collect();
    assert_eq!(actions, vec!["user.login".to_string(), "user.logout".to_string()]);
}
