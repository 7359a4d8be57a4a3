//! Bearer-token guard for the dashboard routes

use crate::error::{AppError, AuthenticationError};
use crate::middleware::error::get_request_id_from_headers;
use crate::services::session::{extract_token, SessionIssuer};
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

/// Rejects requests without a valid session token and exposes the verified
/// [`SessionClaims`](crate::services::session::SessionClaims) to handlers through request
/// extensions.
pub async fn require_auth(
    State(sessions): State<Arc<SessionIssuer>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let request_id = get_request_id_from_headers(request.headers());

    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            AppError::authentication(AuthenticationError::MissingToken)
                .with_optional_request_id(request_id.clone())
        })?;

    let claims = extract_token(auth_header)
        .and_then(|token| sessions.verify(token))
        .map_err(|e| e.with_optional_request_id(request_id))?;

    debug!(subject = %claims.sub, "session verified");
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::services::session::SessionClaims;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
        Extension, Router,
    };
    use tower::util::ServiceExt;
    use uuid::Uuid;

    fn app(sessions: Arc<SessionIssuer>) -> Router {
        Router::new()
            .route(
                "/private",
                get(|Extension(claims): Extension<SessionClaims>| async move { claims.email }),
            )
            .layer(from_fn_with_state(sessions, require_auth))
    }

    fn sessions() -> Arc<SessionIssuer> {
        Arc::new(SessionIssuer::new(&AuthConfig {
            jwt_secret: "middleware-secret".to_string(),
            token_ttl_hours: 24,
        }))
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let response = app(sessions())
            .oneshot(HttpRequest::get("/private").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_scheme_is_unauthorized() {
        let response = app(sessions())
            .oneshot(
                HttpRequest::get("/private")
                    .header(AUTHORIZATION, "Token abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn valid_token_reaches_handler() {
        let sessions = sessions();
        let token = sessions.issue(Uuid::new_v4(), "staff@school.org").unwrap();

        let response = app(sessions)
            .oneshot(
                HttpRequest::get("/private")
                    .header(AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"staff@school.org");
    }
}
