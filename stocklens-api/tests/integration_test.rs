/// Integration tests for the StockLens API
///
/// Exercise the full HTTP surface over in-memory collaborators:
/// - Authentication middleware
/// - Balance and the analyze debit
/// - Review edits, cancel, confirm
/// - History, selection, and XLSX export

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use base64::Engine;
use common::{authed_request, body_json, TestContext, TEST_EMAIL};
use serde_json::json;
use stocklens_api::recognition::{CountedItem, MockGateway};
use tower::ServiceExt;

fn image_payload() -> serde_json::Value {
    let image = base64::engine::general_purpose::STANDARD.encode([0xFF, 0xD8, 0xFF, 0xE0]);
    json!({ "image_base64": image })
}

fn cola_and_chips() -> Vec<CountedItem> {
    vec![
        CountedItem {
            label: "Cola 330ml".to_string(),
            count: 6,
        },
        CountedItem {
            label: "Chips".to_string(),
            count: 3,
        },
    ]
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let ctx = TestContext::new(cola_and_chips());

    let request = Request::builder()
        .method("GET")
        .uri("/v1/balance")
        .body(Body::empty())
        .unwrap();

    let response = ctx.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_garbage_token_is_rejected() {
    let ctx = TestContext::new(cola_and_chips());

    let request = Request::builder()
        .method("GET")
        .uri("/v1/balance")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();

    let response = ctx.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_balance_starts_at_default() {
    let ctx = TestContext::new(cola_and_chips());

    let response = ctx
        .app
        .clone()
        .oneshot(authed_request(&ctx, "GET", "/v1/balance", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["balance"], 1500);
    assert_eq!(body["cost_per_analysis"], 30);
}

#[tokio::test]
async fn test_analyze_debits_and_returns_items() {
    let ctx = TestContext::new(cola_and_chips());

    let response = ctx
        .app
        .clone()
        .oneshot(authed_request(
            &ctx,
            "POST",
            "/v1/count/analyze",
            Some(image_payload()),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["balance"], 1470);
    assert_eq!(body["items"][0]["label"], "Cola 330ml");
    assert_eq!(body["items"][1]["count"], 3);
}

#[tokio::test]
async fn test_analyze_rejects_bad_base64() {
    let ctx = TestContext::new(cola_and_chips());

    let response = ctx
        .app
        .clone()
        .oneshot(authed_request(
            &ctx,
            "POST",
            "/v1/count/analyze",
            Some(json!({ "image_base64": "%%% not base64 %%%" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    // No tokens spent on a malformed request.
    assert_eq!(ctx.gateway.call_count(), 0);
}

#[tokio::test]
async fn test_analyze_blocked_on_low_balance() {
    let ctx = TestContext::with_starting_balance(
        10,
        MockGateway::with_items(cola_and_chips()),
    );

    let response = ctx
        .app
        .clone()
        .oneshot(authed_request(
            &ctx,
            "POST",
            "/v1/count/analyze",
            Some(image_payload()),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "insufficient_balance");
    assert_eq!(ctx.gateway.call_count(), 0);
}

#[tokio::test]
async fn test_failed_recognition_maps_to_bad_gateway() {
    let ctx = TestContext::with_starting_balance(1500, MockGateway::failing());

    let response = ctx
        .app
        .clone()
        .oneshot(authed_request(
            &ctx,
            "POST",
            "/v1/count/analyze",
            Some(image_payload()),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    // The debit stands.
    let response = ctx
        .app
        .clone()
        .oneshot(authed_request(&ctx, "GET", "/v1/balance", None))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["balance"], 1470);
}

#[tokio::test]
async fn test_review_edit_and_confirm_flow() {
    let ctx = TestContext::new(cola_and_chips());
    let app = ctx.app.clone();

    let response = app
        .clone()
        .oneshot(authed_request(
            &ctx,
            "POST",
            "/v1/count/analyze",
            Some(image_payload()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Rename the first item.
    let response = app
        .clone()
        .oneshot(authed_request(
            &ctx,
            "PATCH",
            "/v1/count/items/0",
            Some(json!({ "label": "Cola Zero 330ml" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["items"][0]["label"], "Cola Zero 330ml");

    // Drop the second item.
    let response = app
        .clone()
        .oneshot(authed_request(&ctx, "DELETE", "/v1/count/items/1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["items"].as_array().unwrap().len(), 1);

    // Confirm persists the edited item.
    let response = app
        .clone()
        .oneshot(authed_request(&ctx, "POST", "/v1/count/confirm", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let records = body["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["label"], "Cola Zero 330ml");
    assert_eq!(records[0]["user_email"], TEST_EMAIL);

    // The review is gone after confirmation.
    let response = app
        .clone()
        .oneshot(authed_request(&ctx, "GET", "/v1/count/review", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_edit_out_of_range_index() {
    let ctx = TestContext::new(cola_and_chips());
    let app = ctx.app.clone();

    app.clone()
        .oneshot(authed_request(
            &ctx,
            "POST",
            "/v1/count/analyze",
            Some(image_payload()),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(authed_request(
            &ctx,
            "PATCH",
            "/v1/count/items/9",
            Some(json!({ "label": "x" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_discards_review() {
    let ctx = TestContext::new(cola_and_chips());
    let app = ctx.app.clone();

    app.clone()
        .oneshot(authed_request(
            &ctx,
            "POST",
            "/v1/count/analyze",
            Some(image_payload()),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(authed_request(&ctx, "POST", "/v1/count/cancel", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Confirming after cancel has nothing to save.
    let response = app
        .clone()
        .oneshot(authed_request(&ctx, "POST", "/v1/count/confirm", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_history_lists_confirmed_records() {
    let ctx = TestContext::new(cola_and_chips());
    let app = ctx.app.clone();

    app.clone()
        .oneshot(authed_request(
            &ctx,
            "POST",
            "/v1/count/analyze",
            Some(image_payload()),
        ))
        .await
        .unwrap();
    app.clone()
        .oneshot(authed_request(&ctx, "POST", "/v1/count/confirm", None))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(authed_request(&ctx, "GET", "/v1/records?limit=10", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["records"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_export_requires_selection() {
    let ctx = TestContext::new(cola_and_chips());

    let response = ctx
        .app
        .clone()
        .oneshot(authed_request(&ctx, "GET", "/v1/records/export", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_select_all_and_export_workbook() {
    let ctx = TestContext::new(cola_and_chips());
    let app = ctx.app.clone();

    app.clone()
        .oneshot(authed_request(
            &ctx,
            "POST",
            "/v1/count/analyze",
            Some(image_payload()),
        ))
        .await
        .unwrap();
    app.clone()
        .oneshot(authed_request(&ctx, "POST", "/v1/count/confirm", None))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(authed_request(
            &ctx,
            "POST",
            "/v1/records/selection/select-all",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["selected"], 2);

    let response = app
        .clone()
        .oneshot(authed_request(&ctx, "GET", "/v1/records/export", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("spreadsheetml"));

    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("inventario_"));
    assert!(disposition.ends_with(".xlsx\""));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    // XLSX files are ZIP archives.
    assert_eq!(&bytes[0..2], b"PK");
}

#[tokio::test]
async fn test_selection_toggle_and_clear() {
    let ctx = TestContext::new(cola_and_chips());
    let app = ctx.app.clone();

    app.clone()
        .oneshot(authed_request(
            &ctx,
            "POST",
            "/v1/count/analyze",
            Some(image_payload()),
        ))
        .await
        .unwrap();
    let response = app
        .clone()
        .oneshot(authed_request(&ctx, "POST", "/v1/count/confirm", None))
        .await
        .unwrap();
    let body = body_json(response).await;
    let id = body["records"][0]["id"].clone();

    let response = app
        .clone()
        .oneshot(authed_request(
            &ctx,
            "POST",
            "/v1/records/selection/toggle",
            Some(json!({ "record_id": id })),
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["selected"], 1);

    let response = app
        .clone()
        .oneshot(authed_request(
            &ctx,
            "POST",
            "/v1/records/selection/clear",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["selected"], 0);
}
