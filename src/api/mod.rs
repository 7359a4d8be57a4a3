//! HTTP surface: routes, shared state and the middleware stack

pub mod auth;
pub mod payments;
pub mod webhooks;

use crate::health::{HealthChecker, HealthStatus};
use crate::middleware::auth::require_auth;
use crate::middleware::logging::{request_logging_middleware, UuidRequestId};
use crate::services::{
    AuthService, PaymentOrchestrator, SessionIssuer, TransactionQueryService, WebhookProcessor,
};
use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info, warn};

/// Services shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub sessions: Arc<SessionIssuer>,
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub webhooks: Arc<WebhookProcessor>,
    pub transactions: Arc<TransactionQueryService>,
    pub health_checker: HealthChecker,
    /// Header carrying the callback HMAC
    pub webhook_signature_header: String,
}

/// Build the full application router with request ids, request logging and CORS applied
pub fn router(state: AppState, cors_allowed_origins: &[String]) -> Router {
    let protected = Router::new()
        .route("/payments/create-payment", post(payments::create_payment))
        .route("/payments/transactions", get(payments::list_transactions))
        .route(
            "/payments/transactions/school/{school_id}",
            get(payments::list_transactions_by_school),
        )
        .route(
            "/payments/transaction-status/{custom_order_id}",
            get(payments::transaction_status),
        )
        .route("/payments/replay-redirect", post(payments::replay_redirect))
        .route_layer(from_fn_with_state(state.sessions.clone(), require_auth));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/health/live", get(liveness))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/payments/webhook", post(webhooks::handle_callback))
        .merge(protected)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .layer(cors_layer(cors_allowed_origins))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::HEAD,
        Method::PUT,
        Method::PATCH,
        Method::POST,
        Method::DELETE,
    ];
    let headers = [header::CONTENT_TYPE, header::AUTHORIZATION];

    if allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(false);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(true)
}

async fn root() -> &'static str {
    info!("📍 Root endpoint accessed");
    "School fee payment backend is running"
}

async fn health(
    State(state): State<AppState>,
) -> Result<Json<HealthStatus>, (StatusCode, Json<HealthStatus>)> {
    let health_status = state.health_checker.check_health().await;

    if health_status.is_healthy() {
        Ok(Json(health_status))
    } else {
        error!("❌ Health check failed - service unhealthy");
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(health_status)))
    }
}

/// Readiness probe - checks if the service is ready to accept traffic
async fn readiness(
    state: State<AppState>,
) -> Result<Json<HealthStatus>, (StatusCode, Json<HealthStatus>)> {
    health(state).await
}

/// Liveness probe - the process is up and serving
async fn liveness() -> &'static str {
    "OK"
}
