#![allow(dead_code)]

use async_trait::async_trait;
use schoolpay_backend::api::AppState;
use schoolpay_backend::config::AuthConfig;
use schoolpay_backend::database::memory::MemoryStore;
use schoolpay_backend::health::HealthChecker;
use schoolpay_backend::payments::{
    CollectRequestResponse, PaymentError, PaymentGateway, PaymentResult,
};
use schoolpay_backend::services::{
    AuthService, PaymentOrchestrator, SessionIssuer, TransactionQueryService, WebhookProcessor,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Gateway double handing out sequential collect ids (C1, C2, ...)
pub struct MockGateway {
    calls: AtomicUsize,
    fail_with: Option<PaymentError>,
}

impl MockGateway {
    pub fn accepting() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_with: None,
        }
    }

    pub fn failing(err: PaymentError) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_with: Some(err),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_collect_request(
        &self,
        _school_id: &str,
        _amount: &str,
    ) -> PaymentResult<CollectRequestResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        Ok(CollectRequestResponse {
            collect_request_id: format!("C{}", n),
            collect_request_url: format!("https://pay.example.com/collect/C{}", n),
            sign: Some("signed".to_string()),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<MockGateway>,
    pub state: AppState,
}

pub fn harness(gateway: MockGateway, signing_secret: Option<&str>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(gateway);
    let sessions = Arc::new(SessionIssuer::new(&AuthConfig {
        jwt_secret: "integration-secret".to_string(),
        token_ttl_hours: 24,
    }));

    let state = AppState {
        auth: Arc::new(AuthService::new(store.clone(), sessions.clone())),
        sessions,
        orchestrator: Arc::new(PaymentOrchestrator::new(gateway.clone(), store.clone())),
        webhooks: Arc::new(WebhookProcessor::new(
            store.clone(),
            store.clone(),
            signing_secret.map(str::to_string),
        )),
        transactions: Arc::new(TransactionQueryService::new(store.clone(), store.clone())),
        health_checker: HealthChecker::new(None),
        webhook_signature_header: SIGNATURE_HEADER.to_string(),
    };

    Harness {
        store,
        gateway,
        state,
    }
}

pub fn payment_request(school_id: &str, amount: &str) -> serde_json::Value {
    serde_json::json!({
        "school_id": school_id,
        "amount": amount,
        "trustee_id": "T1",
        "student_info": {"name": "Ada Lovelace", "id": "STU-1", "email": "ada@school.org"}
    })
}

pub fn callback(order_id: &str, status: &str, amount: i64, payment_time: &str) -> String {
    serde_json::json!({
        "status": 200,
        "order_info": {
            "order_id": order_id,
            "order_amount": amount,
            "transaction_amount": amount,
            "gateway": "PhonePe",
            "bank_reference": "YESBNK222",
            "status": status,
            "payment_mode": "upi",
            "payment_details": "success@ybl",
            "payment_message": "payment success",
            "payment_time": payment_time,
            "error_message": "NA"
        }
    })
    .to_string()
}
