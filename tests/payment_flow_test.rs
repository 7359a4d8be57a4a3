//! End-to-end service flows over the in-memory store

mod common;

use common::{callback, harness, payment_request, MockGateway};
use schoolpay_backend::database::repository::WebhookLogStore;
use schoolpay_backend::payments::utils::sign_hmac_sha256_hex;
use schoolpay_backend::payments::PaymentError;
use schoolpay_backend::services::auth_service::{LoginRequest, RegisterRequest};
use schoolpay_backend::services::payment_orchestrator::{CreatePaymentRequest, OrchestratorError};
use schoolpay_backend::services::transaction_query::{ListTransactionsParams, StatusLookup};
use schoolpay_backend::services::WebhookProcessorError;

fn register_request(email: &str, password: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.to_string(),
        password: password.to_string(),
        confirm_password: password.to_string(),
        name: "Grace Hopper".to_string(),
    }
}

fn create_request(school_id: &str, amount: &str) -> CreatePaymentRequest {
    serde_json::from_value(payment_request(school_id, amount)).unwrap()
}

#[tokio::test]
async fn register_then_login_issues_a_verifiable_token() {
    let h = harness(MockGateway::accepting(), None);

    let registered = h
        .state
        .auth
        .register(register_request("  Admin@School.org ", "s3cret-pass"))
        .await
        .unwrap();
    assert_eq!(registered.user.email, "admin@school.org");
    assert_eq!(registered.user.full_name, "Grace Hopper");

    let login = h
        .state
        .auth
        .login(LoginRequest {
            email: "admin@school.org".to_string(),
            password: "s3cret-pass".to_string(),
        })
        .await
        .unwrap();

    let claims = h.state.sessions.verify(&login.access_token).unwrap();
    assert_eq!(claims.email, "admin@school.org");
    assert_eq!(login.user, registered.user);
}

#[tokio::test]
async fn duplicate_registration_conflicts_and_wrong_password_is_rejected() {
    let h = harness(MockGateway::accepting(), None);
    h.state
        .auth
        .register(register_request("admin@school.org", "s3cret-pass"))
        .await
        .unwrap();

    let duplicate = h
        .state
        .auth
        .register(register_request("ADMIN@school.org", "other-pass"))
        .await
        .unwrap_err();
    assert_eq!(duplicate.status_code(), 409);

    let wrong = h
        .state
        .auth
        .login(LoginRequest {
            email: "admin@school.org".to_string(),
            password: "not-it".to_string(),
        })
        .await
        .unwrap_err();
    let unknown = h
        .state
        .auth
        .login(LoginRequest {
            email: "nobody@school.org".to_string(),
            password: "s3cret-pass".to_string(),
        })
        .await
        .unwrap_err();

    assert_eq!(wrong.status_code(), 401);
    assert_eq!(wrong.user_message(), unknown.user_message());
}

#[tokio::test]
async fn create_payment_records_exactly_one_pair() {
    let h = harness(MockGateway::accepting(), None);

    let response = h
        .state
        .orchestrator
        .create_payment(create_request("S1", "500"))
        .await
        .unwrap();

    assert_eq!(response.collect_request_id, "C1");
    assert_eq!(h.gateway.calls(), 1);
    assert_eq!(h.store.order_count().await, 1);
    assert_eq!(h.store.status_count().await, 1);

    match h.state.transactions.get_status("C1").await.unwrap() {
        StatusLookup::Found(view) => {
            assert_eq!(view.status, "PENDING");
            assert_eq!(view.order_amount.to_string(), "500");
            assert!(view.payment_time.is_none());
        }
        other => panic!("expected a status record, got {:?}", other),
    }
}

#[tokio::test]
async fn gateway_failure_records_nothing() {
    let h = harness(
        MockGateway::failing(PaymentError::ProviderError {
            provider: "mock".to_string(),
            message: "school not onboarded".to_string(),
            provider_code: Some("400".to_string()),
            retryable: false,
        }),
        None,
    );

    let err = h
        .state
        .orchestrator
        .create_payment(create_request("S1", "500"))
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::Gateway(_)));
    assert_eq!(h.store.order_count().await, 0);
    assert_eq!(h.store.status_count().await, 0);
}

#[tokio::test]
async fn invalid_payment_request_never_reaches_the_gateway() {
    let h = harness(MockGateway::accepting(), None);

    let err = h
        .state
        .orchestrator
        .create_payment(create_request("", "500"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::MissingField { .. }));

    let err = h
        .state
        .orchestrator
        .create_payment(create_request("S1", "-3"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidField { .. }));

    assert_eq!(h.gateway.calls(), 0);
}

#[tokio::test]
async fn repeated_callback_converges_and_is_logged_each_time() {
    let h = harness(MockGateway::accepting(), None);
    h.state
        .orchestrator
        .create_payment(create_request("S1", "500"))
        .await
        .unwrap();

    let body = callback("C1", "SUCCESS", 500, "2025-01-01T10:00:00Z");
    let first = h.state.webhooks.handle_callback(&body, None).await.unwrap();
    let second = h.state.webhooks.handle_callback(&body, None).await.unwrap();

    let first = first.updated_order_status.unwrap();
    let second = second.updated_order_status.unwrap();
    assert_eq!(first.status, "SUCCESS");
    assert_eq!(first.status, second.status);
    assert_eq!(first.transaction_amount, second.transaction_amount);
    assert_eq!(first.payment_time, second.payment_time);
    assert_eq!(h.store.status_count().await, 1);

    let logs = h.store.list_for_webhook("C1").await.unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|log| log.status == "success"));
    assert!(logs.iter().all(|log| log.processed_at.is_some()));
}

#[tokio::test]
async fn callback_for_unknown_order_succeeds_without_update() {
    let h = harness(MockGateway::accepting(), None);

    let body = callback("C404", "SUCCESS", 100, "2025-01-01T10:00:00Z");
    let outcome = h.state.webhooks.handle_callback(&body, None).await.unwrap();

    assert!(outcome.updated_order_status.is_none());
    let logs = h.store.list_for_webhook("C404").await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, "success");
}

#[tokio::test]
async fn invalid_callback_is_logged_as_failed() {
    let h = harness(MockGateway::accepting(), None);

    let body = serde_json::json!({
        "status": 200,
        "order_info": {"order_id": "C9", "status": "SUCCESS"}
    })
    .to_string();
    let err = h
        .state
        .webhooks
        .handle_callback(&body, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WebhookProcessorError::InvalidPayload(_)));

    let logs = h.store.list_for_webhook("C9").await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, "failed");
    assert!(logs[0].error_message.is_some());
}

#[tokio::test]
async fn signing_secret_requires_a_valid_signature() {
    let h = harness(MockGateway::accepting(), Some("hook-secret"));
    h.state
        .orchestrator
        .create_payment(create_request("S1", "500"))
        .await
        .unwrap();
    let body = callback("C1", "SUCCESS", 500, "2025-01-01T10:00:00Z");

    let missing = h
        .state
        .webhooks
        .handle_callback(&body, None)
        .await
        .unwrap_err();
    assert!(matches!(missing, WebhookProcessorError::InvalidSignature));

    let forged = h
        .state
        .webhooks
        .handle_callback(&body, Some("deadbeef"))
        .await
        .unwrap_err();
    assert!(matches!(forged, WebhookProcessorError::InvalidSignature));

    let signature = sign_hmac_sha256_hex(body.as_bytes(), "hook-secret").unwrap();
    let outcome = h
        .state
        .webhooks
        .handle_callback(&body, Some(&signature))
        .await
        .unwrap();
    assert_eq!(outcome.updated_order_status.unwrap().status, "SUCCESS");

    let logs = h.store.list_for_webhook("C1").await.unwrap();
    let statuses: Vec<&str> = logs.iter().map(|log| log.status.as_str()).collect();
    assert_eq!(statuses, vec!["failed", "failed", "success"]);
}

#[tokio::test]
async fn listing_filters_by_status_and_sorts_latest_payment_first() {
    let h = harness(MockGateway::accepting(), None);
    for _ in 0..3 {
        h.state
            .orchestrator
            .create_payment(create_request("S1", "500"))
            .await
            .unwrap();
    }

    h.state
        .webhooks
        .handle_callback(&callback("C1", "SUCCESS", 500, "2025-01-01T10:00:00Z"), None)
        .await
        .unwrap();
    h.state
        .webhooks
        .handle_callback(&callback("C2", "SUCCESS", 500, "2025-01-02T10:00:00Z"), None)
        .await
        .unwrap();

    let all = h
        .state
        .transactions
        .list_transactions(&ListTransactionsParams::default())
        .await
        .unwrap();
    let ids: Vec<&str> = all.iter().map(|t| t.collect_id.as_str()).collect();
    assert_eq!(ids, vec!["C2", "C1", "C3"]);

    let pending = h
        .state
        .transactions
        .list_transactions(&ListTransactionsParams {
            status: Some("PENDING".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].collect_id, "C3");

    let paged = h
        .state
        .transactions
        .list_transactions(&ListTransactionsParams {
            limit: Some("2".to_string()),
            page: Some("2".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(paged.len(), 1);
    assert_eq!(paged[0].collect_id, "C3");
}

#[tokio::test]
async fn huge_page_size_returns_an_empty_page() {
    let h = harness(MockGateway::accepting(), None);
    for _ in 0..2 {
        h.state
            .orchestrator
            .create_payment(create_request("S1", "500"))
            .await
            .unwrap();
    }

    let first = h
        .state
        .transactions
        .list_transactions(&ListTransactionsParams {
            limit: Some(i64::MAX.to_string()),
            page: Some("1".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(first.len(), 2);

    let beyond = h
        .state
        .transactions
        .list_transactions(&ListTransactionsParams {
            limit: Some(i64::MAX.to_string()),
            page: Some("3".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(beyond.is_empty());
}

#[tokio::test]
async fn school_payment_settles_through_the_callback() {
    let h = harness(MockGateway::accepting(), None);
    h.state
        .orchestrator
        .create_payment(create_request("S1", "500"))
        .await
        .unwrap();
    h.state
        .orchestrator
        .create_payment(create_request("S2", "750"))
        .await
        .unwrap();

    h.state
        .webhooks
        .handle_callback(&callback("C1", "success", 500, "2025-03-01T08:30:00Z"), None)
        .await
        .unwrap();

    let school = h.state.transactions.list_by_school("S1").await.unwrap();
    assert_eq!(school.len(), 1);
    assert_eq!(school[0].status, "SUCCESS");
    assert_eq!(school[0].gateway, "Default");
    assert_eq!(school[0].student_info.name, "Ada Lovelace");

    match h.state.transactions.get_status("C1").await.unwrap() {
        StatusLookup::Found(view) => {
            assert_eq!(view.status, "SUCCESS");
            assert_eq!(view.transaction_amount.to_string(), "500");
            assert!(view.payment_time.is_some());
        }
        other => panic!("expected a status record, got {:?}", other),
    }

    assert!(matches!(
        h.state.transactions.get_status("C999").await.unwrap(),
        StatusLookup::NotFound { .. }
    ));
}
