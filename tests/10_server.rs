mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{TestServer, ADMIN_EMAIL, ADMIN_PASSWORD};

#[tokio::test]
async fn health_and_root_respond() -> Result<()> {
    let server = TestServer::start().await?;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/health", server.base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["status"], "ok");

    let res = client.get(format!("{}/", server.base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["name"], "Admin Console API");
    Ok(())
}

#[tokio::test]
async fn seeded_admin_can_log_in_and_read_stats() -> Result<()> {
    let server = TestServer::start().await?;
    let client = reqwest::Client::new();

    // No Origin header: non-browser clients pass the origin check
    let res = client
        .post(format!("{}/auth/login", server.base_url))
        .json(&json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    let token = body["data"]["access_token"].as_str().unwrap_or_default().to_string();
    assert!(!token.is_empty());

    let res = client
        .get(format!("{}/auth/me", server.base_url))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["role"], "admin");

    let res = client
        .get(format!("{}/admin/stats", server.base_url))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["activity_timeline_7d"].as_array().map(Vec::len), Some(7));
    assert_eq!(body["data"]["activity_timeline_24h"].as_array().map(Vec::len), Some(24));
    // the login above is already on the record
    assert_eq!(body["data"]["total_logins_24h"], 1);
    Ok(())
}
