//! Payment-request orchestration
//!
//! Opens a collect request with the aggregator and records the resulting order together
//! with its pending status record. Nothing is written unless the aggregator accepts the
//! request, and the two records are written as one unit.

use crate::database::error::DatabaseError;
use crate::database::order_repository::NewOrder;
use crate::database::repository::OrderStore;
use crate::error::{AppError, ValidationError};
use crate::middleware::logging::log_external_call;
use crate::payments::error::PaymentError;
use crate::payments::provider::PaymentGateway;
use crate::payments::types::{parse_positive_amount, CollectRequestResponse, StudentInfo};
use crate::services::validation::is_valid_email;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

pub const DEFAULT_GATEWAY_NAME: &str = "Default";

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentRequest {
    #[serde(default)]
    pub school_id: String,
    #[serde(default, deserialize_with = "amount_text")]
    pub amount: String,
    #[serde(default)]
    pub trustee_id: String,
    #[serde(default)]
    pub student_info: StudentInfo,
    #[serde(default)]
    pub gateway_name: Option<String>,
}

/// The dashboard sends the amount either as a string or as a number
fn amount_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match JsonValue::deserialize(deserializer)? {
        JsonValue::String(text) => Ok(text),
        JsonValue::Number(number) => Ok(number.to_string()),
        JsonValue::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "amount must be a string or number, got {}",
            other
        ))),
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("{field} should not be empty")]
    MissingField { field: String },

    #[error("{field} {reason}")]
    InvalidField { field: String, reason: String },

    #[error(transparent)]
    Gateway(#[from] PaymentError),

    #[error("failed to record order: {0}")]
    Persistence(#[from] DatabaseError),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

impl From<OrchestratorError> for AppError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::MissingField { field } => {
                AppError::validation(ValidationError::MissingField { field })
            }
            OrchestratorError::InvalidField { field, reason } => {
                AppError::validation(ValidationError::InvalidField { field, reason })
            }
            OrchestratorError::Gateway(e) => AppError::from(e),
            OrchestratorError::Persistence(e) => AppError::from(e),
        }
    }
}

fn require(value: &str, field: &str) -> OrchestratorResult<()> {
    if value.trim().is_empty() {
        return Err(OrchestratorError::MissingField {
            field: field.to_string(),
        });
    }
    Ok(())
}

impl CreatePaymentRequest {
    /// Field checks run before anything leaves the service
    pub fn validate(&self) -> OrchestratorResult<()> {
        require(&self.school_id, "school_id")?;
        require(&self.trustee_id, "trustee_id")?;
        require(&self.amount, "amount")?;
        require(&self.student_info.name, "student_info.name")?;
        require(&self.student_info.id, "student_info.id")?;
        require(&self.student_info.email, "student_info.email")?;

        if !is_valid_email(&self.student_info.email) {
            return Err(OrchestratorError::InvalidField {
                field: "student_info.email".to_string(),
                reason: "must be an email".to_string(),
            });
        }

        self.order_amount()?;
        Ok(())
    }

    fn order_amount(&self) -> OrchestratorResult<BigDecimal> {
        parse_positive_amount(&self.amount, "amount").map_err(|_| OrchestratorError::InvalidField {
            field: "amount".to_string(),
            reason: "must be a positive decimal".to_string(),
        })
    }

    fn gateway_name(&self) -> String {
        self.gateway_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_GATEWAY_NAME)
            .to_string()
    }
}

pub struct PaymentOrchestrator {
    gateway: Arc<dyn PaymentGateway>,
    orders: Arc<dyn OrderStore>,
}

impl PaymentOrchestrator {
    pub fn new(gateway: Arc<dyn PaymentGateway>, orders: Arc<dyn OrderStore>) -> Self {
        Self { gateway, orders }
    }

    pub async fn create_payment(
        &self,
        request: CreatePaymentRequest,
    ) -> OrchestratorResult<CollectRequestResponse> {
        request.validate()?;

        let amount = request.amount.trim().to_string();
        let order_amount = request.order_amount()?;

        let response = log_external_call(
            self.gateway.name(),
            "create-collect-request",
            self.gateway
                .create_collect_request(request.school_id.trim(), &amount),
        )
        .await?;

        let new_order = NewOrder {
            school_id: request.school_id.trim().to_string(),
            trustee_id: request.trustee_id.trim().to_string(),
            gateway_name: request.gateway_name(),
            student_info: request.student_info,
            amount,
            order_amount,
            collect_request_id: response.collect_request_id.clone(),
            collect_request_url: response.collect_request_url.clone(),
        };

        let (order, _status) = self.orders.create_with_status(new_order).await.map_err(|e| {
            error!(
                collect_request_id = %response.collect_request_id,
                error = %e,
                "collect request accepted by the gateway but the order was not recorded"
            );
            OrchestratorError::Persistence(e)
        })?;

        info!(
            collect_request_id = %order.collect_request_id,
            school_id = %order.school_id,
            amount = %order.amount,
            "payment order created"
        );

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> CreatePaymentRequest {
        serde_json::from_value(json!({
            "school_id": "S1",
            "amount": "500",
            "trustee_id": "T1",
            "student_info": {"name": "Ada", "id": "STU-1", "email": "ada@school.org"}
        }))
        .unwrap()
    }

    #[test]
    fn valid_request_passes() {
        assert!(request().validate().is_ok());
        assert_eq!(request().gateway_name(), "Default");
    }

    #[test]
    fn numeric_amount_is_accepted() {
        let parsed: CreatePaymentRequest = serde_json::from_value(json!({
            "school_id": "S1",
            "amount": 1250.5,
            "trustee_id": "T1",
            "student_info": {"name": "Ada", "id": "STU-1", "email": "ada@school.org"}
        }))
        .unwrap();
        assert_eq!(parsed.amount, "1250.5");
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn missing_fields_are_named() {
        let mut req = request();
        req.trustee_id = " ".to_string();
        let err = req.validate().unwrap_err();
        assert_eq!(err.to_string(), "trustee_id should not be empty");

        let app: AppError = err.into();
        assert_eq!(app.status_code(), 400);
    }

    #[test]
    fn bad_amount_and_email_are_rejected() {
        let mut req = request();
        req.amount = "-5".to_string();
        assert!(matches!(
            req.validate(),
            Err(OrchestratorError::InvalidField { ref field, .. }) if field == "amount"
        ));

        let mut req = request();
        req.student_info.email = "nope".to_string();
        assert!(matches!(
            req.validate(),
            Err(OrchestratorError::InvalidField { ref field, .. }) if field == "student_info.email"
        ));
    }

    #[test]
    fn gateway_errors_keep_their_status() {
        let err = OrchestratorError::Gateway(PaymentError::TimeoutError { timeout_secs: 30 });
        assert_eq!(AppError::from(err).status_code(), 504);

        let err = OrchestratorError::Gateway(PaymentError::ProviderError {
            provider: "edviron".to_string(),
            message: "HTTP 401: unauthorized".to_string(),
            provider_code: Some("401".to_string()),
            retryable: false,
        });
        let app = AppError::from(err);
        assert_eq!(app.status_code(), 502);
        assert!(app.user_message().contains("HTTP 401"));
    }
}
