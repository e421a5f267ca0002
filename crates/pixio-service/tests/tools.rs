//! Metered image tool integration tests.

mod common;

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use common::TestHarness;
use pixio_core::{ProviderError, Tool, UsageStatus};
use pixio_service::ImageRequest;
use pixio_store::Store;
use serde_json::json;

fn png_part(name: &str) -> Part {
    Part::bytes(vec![0x89, b'P', b'N', b'G'])
        .file_name(name)
        .mime_type("image/png")
}

// ============================================================================
// Generate (JSON)
// ============================================================================

#[tokio::test]
async fn generate_charges_one_credit() {
    let harness = TestHarness::new();
    let account = harness.create_user(3);
    let (name, value) = harness.auth_header(&account.id);

    let response = harness
        .server
        .post("/api/image/generate")
        .add_header(name, value)
        .json(&json!({ "prompt": "a lighthouse at dusk" }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["credit_balance"], 2);
    assert!(body["result_image"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));

    let usage = harness.store.list_usage(&account.id).unwrap();
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].tool, Tool::Generate);
    assert_eq!(usage[0].prompt.as_deref(), Some("a lighthouse at dusk"));
}

#[tokio::test]
async fn empty_balance_is_payment_required() {
    let harness = TestHarness::new();
    let account = harness.create_user(0);
    let (name, value) = harness.auth_header(&account.id);

    let response = harness
        .server
        .post("/api/image/generate")
        .add_header(name, value)
        .json(&json!({ "prompt": "anything" }))
        .await;

    response.assert_status(StatusCode::PAYMENT_REQUIRED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["details"]["balance"], 0);
    assert_eq!(body["error"]["details"]["required"], 1);
    assert_eq!(harness.images.calls(), 0);
    assert!(harness.store.list_usage(&account.id).unwrap().is_empty());
}

#[tokio::test]
async fn provider_failure_is_not_charged() {
    let harness = TestHarness::new();
    let account = harness.create_user(2);
    harness
        .images
        .fail_with(ProviderError::with_status(429, "quota exceeded"));
    let (name, value) = harness.auth_header(&account.id);

    let response = harness
        .server
        .post("/api/image/generate")
        .add_header(name, value)
        .json(&json!({ "prompt": "anything" }))
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["message"], "quota exceeded");
    assert_eq!(body["error"]["details"]["upstream_status"], 429);

    assert_eq!(harness.balance(&account.id), 2);
    let usage = harness.store.list_usage(&account.id).unwrap();
    assert_eq!(usage[0].status, UsageStatus::Failed);
    assert_eq!(usage[0].credits_charged, 0);
}

#[tokio::test]
async fn missing_prompt_is_bad_request() {
    let harness = TestHarness::new();
    let account = harness.create_user(2);
    let (name, value) = harness.auth_header(&account.id);

    harness
        .server
        .post("/api/image/generate")
        .add_header(name, value)
        .json(&json!({ "prompt": "  " }))
        .await
        .assert_status_bad_request();
    assert_eq!(harness.images.calls(), 0);
}

#[tokio::test]
async fn tools_require_a_token() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/api/image/generate")
        .json(&json!({ "prompt": "anything" }))
        .await
        .assert_status_unauthorized();
}

// ============================================================================
// Multipart tools
// ============================================================================

#[tokio::test]
async fn enhance_forwards_target_size() {
    let harness = TestHarness::new();
    let account = harness.create_user(1);
    let (name, value) = harness.auth_header(&account.id);

    let form = MultipartForm::new()
        .add_part("image", png_part("in.png"))
        .add_text("target_width", "1024");

    let response = harness
        .server
        .post("/api/image/enhance")
        .add_header(name, value)
        .multipart(form)
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<serde_json::Value>()["credit_balance"], 0);

    let requests = harness.images.requests.lock().unwrap();
    match &requests[0] {
        ImageRequest::Upscale {
            target_width,
            target_height,
            image,
        } => {
            assert_eq!(*target_width, 1024);
            assert_eq!(*target_height, 2048);
            assert_eq!(image.file_name, "in.png");
        }
        other => panic!("unexpected request: {other:?}"),
    }
}

#[tokio::test]
async fn cleanup_needs_image_and_mask() {
    let harness = TestHarness::new();
    let account = harness.create_user(1);
    let (name, value) = harness.auth_header(&account.id);

    let response = harness
        .server
        .post("/api/image/cleanup")
        .add_header(name.clone(), value.clone())
        .multipart(MultipartForm::new().add_part("image", png_part("in.png")))
        .await;
    response.assert_status_bad_request();
    assert_eq!(harness.images.calls(), 0);

    let form = MultipartForm::new()
        .add_part("image", png_part("in.png"))
        .add_part("mask", png_part("mask.png"));
    harness
        .server
        .post("/api/image/cleanup")
        .add_header(name, value)
        .multipart(form)
        .await
        .assert_status_ok();
    assert_eq!(harness.balance(&account.id), 0);
}

#[tokio::test]
async fn replace_background_records_prompt() {
    let harness = TestHarness::new();
    let account = harness.create_user(1);
    let (name, value) = harness.auth_header(&account.id);

    let form = MultipartForm::new()
        .add_part("image_file", png_part("in.png"))
        .add_text("prompt", "a beach");

    harness
        .server
        .post("/api/image/replace-background")
        .add_header(name, value)
        .multipart(form)
        .await
        .assert_status_ok();

    let usage = harness.store.list_usage(&account.id).unwrap();
    assert_eq!(usage[0].tool, Tool::ReplaceBackground);
    assert_eq!(usage[0].prompt.as_deref(), Some("a beach"));
}

#[tokio::test]
async fn each_upload_tool_is_metered() {
    let harness = TestHarness::new();
    let account = harness.create_user(10);

    for path in ["remove-background", "remove-text", "uncrop"] {
        let (name, value) = harness.auth_header(&account.id);
        harness
            .server
            .post(&format!("/api/image/{path}"))
            .add_header(name, value)
            .multipart(MultipartForm::new().add_part("image", png_part("in.png")))
            .await
            .assert_status_ok();
    }

    assert_eq!(harness.balance(&account.id), 7);
    let tools: Vec<Tool> = harness
        .store
        .list_usage(&account.id)
        .unwrap()
        .into_iter()
        .map(|r| r.tool)
        .collect();
    assert_eq!(
        tools,
        vec![Tool::Uncrop, Tool::RemoveText, Tool::RemoveBackground]
    );
}
