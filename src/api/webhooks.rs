use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use tracing::info;

use crate::api::AppState;
use crate::error::AppError;
use crate::middleware::error::get_request_id_from_headers;
use crate::services::webhook_processor::CallbackOutcome;

/// POST /payments/webhook
///
/// Takes the raw body so the signature is checked against the exact bytes received and
/// unparseable payloads still reach the audit trail.
pub async fn handle_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CallbackOutcome>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let signature = headers
        .get(state.webhook_signature_header.as_str())
        .and_then(|v| v.to_str().ok());

    info!(bytes = body.len(), "Received payment callback");

    state
        .webhooks
        .handle_callback(&body, signature)
        .await
        .map(Json)
        .map_err(|e| AppError::from(e).with_optional_request_id(request_id))
}
