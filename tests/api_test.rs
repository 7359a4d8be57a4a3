//! HTTP surface driven through the full router

mod common;

use axum::body::{to_bytes, Body};
use axum::Router;
use common::{callback, harness, payment_request, MockGateway, SIGNATURE_HEADER};
use http::{header, Request, StatusCode};
use schoolpay_backend::api;
use schoolpay_backend::payments::utils::sign_hmac_sha256_hex;
use serde_json::{json, Value};
use tower::util::ServiceExt;

fn app(signing_secret: Option<&str>) -> Router {
    let h = harness(MockGateway::accepting(), signing_secret);
    api::router(h.state, &["http://localhost:5173".to_string()])
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login_token(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            json!({
                "email": "bursar@school.org",
                "password": "s3cret-pass",
                "confirmPassword": "s3cret-pass",
                "name": "School Bursar"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            json!({"email": "bursar@school.org", "password": "s3cret-pass"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    body_json(response).await["access_token"]
        .as_str()
        .unwrap()
        .to_string()
}

fn authorized(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let response = app(None)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(body_json(response).await["status"], "Healthy");
}

#[tokio::test]
async fn register_returns_created_user() {
    let response = app(None)
        .oneshot(json_request(
            "POST",
            "/auth/register",
            json!({
                "email": "Bursar@School.org",
                "password": "s3cret-pass",
                "confirmPassword": "s3cret-pass",
                "name": "School Bursar"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["message"], "User registered successfully");
    assert_eq!(body["user"]["email"], "bursar@school.org");
    assert_eq!(body["user"]["fullName"], "School Bursar");
    assert!(body["user"].get("password").is_none());
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let request = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app(None).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn dashboard_routes_require_a_token() {
    let app = app(None);
    for uri in [
        "/payments/transactions",
        "/payments/transactions/school/S1",
        "/payments/transaction-status/C1",
    ] {
        let response = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }

    let response = app
        .oneshot(json_request(
            "POST",
            "/payments/create-payment",
            payment_request("S1", "500"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "MISSING_TOKEN");
}

#[tokio::test]
async fn unknown_transaction_status_is_a_message() {
    let app = app(None);
    let token = login_token(&app).await;

    let response = app
        .oneshot(authorized(
            "GET",
            "/payments/transaction-status/C404",
            &token,
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"message": "Transaction not found"})
    );
}

#[tokio::test]
async fn payment_is_created_settled_and_listed() {
    let app = app(None);
    let token = login_token(&app).await;

    let response = app
        .clone()
        .oneshot(authorized(
            "POST",
            "/payments/create-payment",
            &token,
            Some(payment_request("S1", "500")),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created = body_json(response).await;
    assert_eq!(created["collect_request_id"], "C1");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/payments/webhook",
            serde_json::from_str(&callback("C1", "SUCCESS", 500, "2025-01-01T10:00:00Z"))
                .unwrap(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["updatedOrderStatus"]["status"],
        "SUCCESS"
    );

    let response = app
        .clone()
        .oneshot(authorized(
            "GET",
            "/payments/transactions?status=SUCCESS&limit=5",
            &token,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = body_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["collect_id"], "C1");
    assert_eq!(listed[0]["transaction_amount"], 500);

    let response = app
        .oneshot(authorized(
            "GET",
            "/payments/transaction-status/C1",
            &token,
            None,
        ))
        .await
        .unwrap();
    let status = body_json(response).await;
    assert_eq!(status["status"], "SUCCESS");
    assert_eq!(status["order_amount"], 500);
}

#[tokio::test]
async fn invalid_callback_body_is_rejected() {
    let request = Request::builder()
        .method("POST")
        .uri("/payments/webhook")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"status": 200}"#))
        .unwrap();
    let response = app(None).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn signed_callbacks_are_checked_against_the_header() {
    let app = app(Some("hook-secret"));
    let body = callback("C404", "SUCCESS", 100, "2025-01-01T10:00:00Z");

    let unsigned = Request::builder()
        .method("POST")
        .uri("/payments/webhook")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.clone()))
        .unwrap();
    let response = app.clone().oneshot(unsigned).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let signature = sign_hmac_sha256_hex(body.as_bytes(), "hook-secret").unwrap();
    let signed = Request::builder()
        .method("POST")
        .uri("/payments/webhook")
        .header(header::CONTENT_TYPE, "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(signed).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["updatedOrderStatus"].is_null());
}

#[tokio::test]
async fn redirect_replay_is_reconciled_for_a_session() {
    let app = app(Some("hook-secret"));

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/payments/replay-redirect",
            json!({"collect_request_id": "C1", "status": "SUCCESS"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let token = login_token(&app).await;
    let response = app
        .clone()
        .oneshot(authorized(
            "POST",
            "/payments/create-payment",
            &token,
            Some(payment_request("S1", "500")),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(authorized(
            "POST",
            "/payments/replay-redirect",
            &token,
            Some(json!({"EdvironCollectRequestId": "C1", "status": "SUCCESS", "amount": "500"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["updatedOrderStatus"]["status"],
        "SUCCESS"
    );

    let response = app
        .oneshot(authorized(
            "GET",
            "/payments/transaction-status/C1",
            &token,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["status"], "SUCCESS");
}

#[tokio::test]
async fn signature_is_checked_over_the_exact_bytes() {
    let body: Vec<u8> = b"{\"order_info\": \"\xfe\xff\"}".to_vec();
    let signature = sign_hmac_sha256_hex(&body, "hook-secret").unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/payments/webhook")
        .header(header::CONTENT_TYPE, "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body))
        .unwrap();
    let response = app(Some("hook-secret")).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "VALIDATION_ERROR");
}
