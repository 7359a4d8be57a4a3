use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use crate::api::AppState;
use crate::error::AppError;
use crate::middleware::error::get_request_id_from_headers;
use crate::services::auth_service::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let Json(request) =
        payload.map_err(|e| AppError::from(e).with_optional_request_id(request_id.clone()))?;

    let response = state
        .auth
        .register(request)
        .await
        .map_err(|e| e.with_optional_request_id(request_id))?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let Json(request) =
        payload.map_err(|e| AppError::from(e).with_optional_request_id(request_id.clone()))?;

    state
        .auth
        .login(request)
        .await
        .map(Json)
        .map_err(|e| e.with_optional_request_id(request_id))
}
