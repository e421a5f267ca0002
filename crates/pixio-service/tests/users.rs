//! Registration, login and balance integration tests.

mod common;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use common::TestHarness;
use pixio_core::AccountId;
use serde_json::json;

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn register_grants_signup_credits() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/api/user/register")
        .json(&json!({ "name": "Ada", "email": "Ada@Example.com", "password": "hunter22" }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert_eq!(body["user"]["name"], "Ada");

    let token = body["token"].as_str().unwrap();
    let id = harness.tokens.verify(token).unwrap();
    assert_eq!(harness.balance(&id), 5);
}

#[tokio::test]
async fn register_rejects_duplicate_email() {
    let harness = TestHarness::new();
    let payload = json!({ "name": "Ada", "email": "ada@example.com", "password": "hunter22" });

    harness
        .server
        .post("/api/user/register")
        .json(&payload)
        .await
        .assert_status(StatusCode::CREATED);

    let response = harness
        .server
        .post("/api/user/register")
        .json(&json!({ "name": "Ada", "email": "ADA@example.com", "password": "other" }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "conflict");
}

#[tokio::test]
async fn register_requires_all_fields() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/api/user/register")
        .json(&json!({ "email": "ada@example.com" }))
        .await;

    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "missing_details");
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn login_returns_working_token() {
    let harness = TestHarness::new();
    harness
        .server
        .post("/api/user/register")
        .json(&json!({ "name": "Ada", "email": "ada@example.com", "password": "hunter22" }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = harness
        .server
        .post("/api/user/login")
        .json(&json!({ "email": "ada@example.com", "password": "hunter22" }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let token = body["token"].as_str().unwrap().to_string();

    let credits = harness
        .server
        .get("/api/user/credits")
        .add_header(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        )
        .await;
    credits.assert_status_ok();
    assert_eq!(credits.json::<serde_json::Value>()["credits"], 5);
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let harness = TestHarness::new();
    harness
        .server
        .post("/api/user/register")
        .json(&json!({ "name": "Ada", "email": "ada@example.com", "password": "hunter22" }))
        .await
        .assert_status(StatusCode::CREATED);

    harness
        .server
        .post("/api/user/login")
        .json(&json!({ "email": "ada@example.com", "password": "wrong" }))
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn login_unknown_email_is_not_found() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/api/user/login")
        .json(&json!({ "email": "nobody@example.com", "password": "x" }))
        .await
        .assert_status_not_found();
}

// ============================================================================
// Credits and credential sources
// ============================================================================

#[tokio::test]
async fn credits_without_token_is_unauthorized() {
    let harness = TestHarness::new();

    let response = harness.server.get("/api/user/credits").await;

    response.assert_status_unauthorized();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn garbage_token_is_unauthorized() {
    let harness = TestHarness::new();

    harness
        .server
        .get("/api/user/credits")
        .add_header(
            HeaderName::from_static("authorization"),
            HeaderValue::from_static("Bearer not-a-jwt"),
        )
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn token_header_is_accepted() {
    let harness = TestHarness::new();
    let account = harness.create_user(7);

    let response = harness
        .server
        .get("/api/user/credits")
        .add_header(
            HeaderName::from_static("token"),
            HeaderValue::from_str(&harness.token(&account.id)).unwrap(),
        )
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["credits"], 7);
    assert_eq!(body["user"]["id"], account.id.to_string());
}

#[tokio::test]
async fn token_in_json_body_is_accepted() {
    let harness = TestHarness::new();
    let account = harness.create_user(0);

    // The body token authenticates, and the handler still sees the body.
    let response = harness
        .server
        .post("/api/user/pay-razor")
        .json(&json!({ "token": harness.token(&account.id), "planId": "Basic" }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["order"]["amount"], 1000);
}

#[tokio::test]
async fn token_for_deleted_account_is_not_found() {
    let harness = TestHarness::new();
    let (name, value) = harness.auth_header(&AccountId::generate());

    harness
        .server
        .get("/api/user/credits")
        .add_header(name, value)
        .await
        .assert_status_not_found();
}
