use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::HeaderMap,
    Extension, Json,
};
use tracing::info;

use crate::api::AppState;
use crate::database::transaction_repository::TransactionView;
use crate::error::AppError;
use crate::logging::mask_identifier;
use crate::middleware::error::get_request_id_from_headers;
use crate::payments::types::CollectRequestResponse;
use crate::services::payment_orchestrator::CreatePaymentRequest;
use crate::services::session::SessionClaims;
use crate::services::transaction_query::{ListTransactionsParams, StatusLookup};
use crate::services::webhook_processor::{CallbackOutcome, RedirectReplayRequest};

/// POST /payments/create-payment
pub async fn create_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    headers: HeaderMap,
    payload: Result<Json<CreatePaymentRequest>, JsonRejection>,
) -> Result<Json<CollectRequestResponse>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let Json(request) =
        payload.map_err(|e| AppError::from(e).with_optional_request_id(request_id.clone()))?;

    info!(
        account = %mask_identifier(&claims.sub),
        school_id = %request.school_id,
        "Payment request received"
    );

    state
        .orchestrator
        .create_payment(request)
        .await
        .map(Json)
        .map_err(|e| AppError::from(e).with_optional_request_id(request_id))
}

/// GET /payments/transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListTransactionsParams>,
) -> Result<Json<Vec<TransactionView>>, AppError> {
    let request_id = get_request_id_from_headers(&headers);

    state
        .transactions
        .list_transactions(&params)
        .await
        .map(Json)
        .map_err(|e| AppError::from(e).with_optional_request_id(request_id))
}

/// GET /payments/transactions/school/{school_id}
pub async fn list_transactions_by_school(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(school_id): Path<String>,
) -> Result<Json<Vec<TransactionView>>, AppError> {
    let request_id = get_request_id_from_headers(&headers);

    state
        .transactions
        .list_by_school(&school_id)
        .await
        .map(Json)
        .map_err(|e| AppError::from(e).with_optional_request_id(request_id))
}

/// GET /payments/transaction-status/{custom_order_id}
pub async fn transaction_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(custom_order_id): Path<String>,
) -> Result<Json<StatusLookup>, AppError> {
    let request_id = get_request_id_from_headers(&headers);

    state
        .transactions
        .get_status(&custom_order_id)
        .await
        .map(Json)
        .map_err(|e| AppError::from(e).with_optional_request_id(request_id))
}

/// POST /payments/replay-redirect
///
/// The dashboard reports the status it saw on the gateway redirect; it is reconciled like a
/// callback.
pub async fn replay_redirect(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    headers: HeaderMap,
    payload: Result<Json<RedirectReplayRequest>, JsonRejection>,
) -> Result<Json<CallbackOutcome>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let Json(request) =
        payload.map_err(|e| AppError::from(e).with_optional_request_id(request_id.clone()))?;

    info!(
        account = %mask_identifier(&claims.sub),
        collect_request_id = %request.collect_request_id,
        "Redirect replay received"
    );

    state
        .webhooks
        .replay_redirect(&request)
        .await
        .map(Json)
        .map_err(|e| AppError::from(e).with_optional_request_id(request_id))
}
