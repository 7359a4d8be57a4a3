//! Request logging and timing helpers

use axum::{
    extract::Request,
    http::{HeaderValue, Request as HttpRequest},
    middleware::Next,
    response::Response,
};
use std::fmt::Display;
use std::future::Future;
use std::time::Instant;
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Generates a UUID v4 `x-request-id` for requests that arrive without one
#[derive(Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &HttpRequest<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Logs one line per request once the response is ready
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let started = Instant::now();

    debug!(request_id = %request_id, method = %method, path = %path, "Request started");

    let response = next.run(request).await;
    let status = response.status();
    let latency_ms = started.elapsed().as_millis();

    if status.is_server_error() {
        error!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            latency_ms = latency_ms,
            "Request failed"
        );
    } else if status.is_client_error() {
        warn!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            latency_ms = latency_ms,
            "Request rejected"
        );
    } else {
        info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            latency_ms = latency_ms,
            "Request completed"
        );
    }

    response
}

/// Time a database query and log its outcome
pub async fn log_database_query<F, T, E>(query: &str, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    let started = Instant::now();
    let result = fut.await;
    let duration_ms = started.elapsed().as_millis();

    match &result {
        Ok(_) => debug!(query = %query, duration_ms = duration_ms, "Database query completed"),
        Err(e) => error!(
            query = %query,
            duration_ms = duration_ms,
            error = %e,
            "Database query failed"
        ),
    }

    result
}

/// Time a call to an external service and log its outcome
pub async fn log_external_call<F, T, E>(service: &str, operation: &str, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    let started = Instant::now();
    info!(service = %service, operation = %operation, "External call started");

    let result = fut.await;
    let duration_ms = started.elapsed().as_millis();

    match &result {
        Ok(_) => info!(
            service = %service,
            operation = %operation,
            duration_ms = duration_ms,
            "External call succeeded"
        ),
        Err(e) => error!(
            service = %service,
            operation = %operation,
            duration_ms = duration_ms,
            error = %e,
            "External call failed"
        ),
    }

    result
}
