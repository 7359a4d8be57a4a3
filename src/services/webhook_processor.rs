//! Payment callback reconciliation
//!
//! Every callback attempt is written to the audit trail first, then checked, parsed and
//! applied. The attempt's entry is closed as `success` or `failed` whatever happens, with
//! the original payload kept for inspection.

use crate::database::order_repository::{OrderStatus, Settlement};
use crate::database::repository::{OrderStore, WebhookLogStore};
use crate::database::webhook_log_repository::{NewWebhookLog, WebhookLog, WebhookOutcome};
use crate::error::{
    AppError, AppErrorKind, AuthenticationError, DomainError, InfrastructureError,
    ValidationError,
};
use crate::payments::types::{decimal_number, PaymentStatus};
use crate::payments::utils::verify_hmac_sha256_hex;
use bigdecimal::BigDecimal;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

pub const CALLBACK_EVENT_TYPE: &str = "payment_callback";
pub const UNKNOWN_WEBHOOK_ID: &str = "unknown";
pub const ALREADY_RECONCILED_MESSAGE: &str = "Status already up to date";

#[derive(Debug, Error)]
pub enum WebhookProcessorError {
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Reconciliation failed for {collect_id}: {reason}")]
    ReconciliationFailed { collect_id: String, reason: String },
}

impl From<WebhookProcessorError> for AppError {
    fn from(err: WebhookProcessorError) -> Self {
        let kind = match err {
            WebhookProcessorError::InvalidSignature => {
                AppErrorKind::Authentication(AuthenticationError::InvalidWebhookSignature)
            }
            WebhookProcessorError::InvalidPayload(reason) => {
                AppErrorKind::Validation(ValidationError::InvalidPayload { reason })
            }
            WebhookProcessorError::DatabaseError(message) => {
                AppErrorKind::Infrastructure(InfrastructureError::Database {
                    message,
                    is_retryable: true,
                })
            }
            // store detail stays in the audit trail and the server log
            WebhookProcessorError::ReconciliationFailed { collect_id, .. } => {
                AppErrorKind::Domain(DomainError::ReconciliationFailed {
                    collect_id,
                    reason: "order records could not be updated".to_string(),
                })
            }
        };
        AppError::new(kind)
    }
}

/// Settlement details reported by the aggregator for one collect request
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OrderInfo {
    pub order_id: String,
    pub status: PaymentStatus,
    #[serde(with = "decimal_number")]
    pub transaction_amount: BigDecimal,
    #[serde(default, deserialize_with = "nullable_text")]
    pub payment_mode: String,
    #[serde(default, deserialize_with = "nullable_text")]
    pub payment_details: String,
    #[serde(default, deserialize_with = "nullable_text")]
    pub bank_reference: String,
    #[serde(default, deserialize_with = "nullable_text")]
    pub payment_message: String,
    #[serde(default, deserialize_with = "nullable_text")]
    pub error_message: String,
    #[serde(deserialize_with = "payment_instant")]
    pub payment_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackPayload {
    pub order_info: OrderInfo,
}

impl CallbackPayload {
    /// Structural validation; nothing has been written when this fails
    pub fn parse(payload: &JsonValue) -> Result<Self, WebhookProcessorError> {
        if payload.get("order_info").map_or(true, JsonValue::is_null) {
            return Err(WebhookProcessorError::InvalidPayload(
                "order_info is missing".to_string(),
            ));
        }

        let parsed: CallbackPayload = serde_json::from_value(payload.clone())
            .map_err(|e| WebhookProcessorError::InvalidPayload(e.to_string()))?;

        let info = &parsed.order_info;
        if info.order_id.trim().is_empty() {
            return Err(WebhookProcessorError::InvalidPayload(
                "order_info.order_id should not be empty".to_string(),
            ));
        }

        let text_fields = [
            ("order_id", &info.order_id),
            ("payment_mode", &info.payment_mode),
            ("payment_details", &info.payment_details),
            ("bank_reference", &info.bank_reference),
            ("payment_message", &info.payment_message),
            ("error_message", &info.error_message),
        ];
        if let Some((field, _)) = text_fields.iter().find(|(_, value)| value.contains('\0')) {
            return Err(WebhookProcessorError::InvalidPayload(format!(
                "order_info.{} contains a NUL character",
                field
            )));
        }
        Ok(parsed)
    }
}

impl From<OrderInfo> for Settlement {
    fn from(info: OrderInfo) -> Self {
        Settlement {
            collect_id: info.order_id.trim().to_string(),
            status: info.status,
            transaction_amount: info.transaction_amount,
            payment_mode: info.payment_mode,
            payment_details: info.payment_details,
            bank_reference: info.bank_reference,
            payment_message: info.payment_message,
            error_message: info.error_message,
            payment_time: info.payment_time,
        }
    }
}

fn nullable_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// RFC 3339 text or epoch milliseconds
fn payment_instant<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    match JsonValue::deserialize(deserializer)? {
        JsonValue::String(text) => DateTime::parse_from_rfc3339(text.trim())
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| serde::de::Error::custom(format!("invalid payment_time '{}': {}", text, e))),
        JsonValue::Number(number) => number
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .ok_or_else(|| serde::de::Error::custom(format!("invalid payment_time {}", number))),
        other => Err(serde::de::Error::custom(format!(
            "payment_time must be a timestamp, got {}",
            other
        ))),
    }
}

/// Body returned to the caller of the callback endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CallbackOutcome {
    pub message: String,
    #[serde(rename = "updatedOrderStatus")]
    pub updated_order_status: Option<OrderStatus>,
}

/// Redirect parameters the dashboard reports after the gateway sends the payer back
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedirectReplayRequest {
    #[serde(default, alias = "EdvironCollectRequestId")]
    pub collect_request_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub amount: Option<String>,
}

/// Who vouches for a callback body
enum Delivery<'a> {
    /// Posted by the aggregator with the signature header value, if any
    Signed(Option<&'a str>),
    /// Rebuilt in-process for an authenticated dashboard session
    Replayed,
}

pub struct WebhookProcessor {
    orders: Arc<dyn OrderStore>,
    webhook_logs: Arc<dyn WebhookLogStore>,
    signing_secret: Option<String>,
}

impl WebhookProcessor {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        webhook_logs: Arc<dyn WebhookLogStore>,
        signing_secret: Option<String>,
    ) -> Self {
        Self {
            orders,
            webhook_logs,
            signing_secret: signing_secret.filter(|s| !s.is_empty()),
        }
    }

    /// Handle one callback delivery posted by the aggregator.
    ///
    /// The signature, when a secret is configured, is checked against the exact bytes
    /// received. Safe to repeat: the same payload converges on the same settlement state and
    /// each attempt adds its own audit entry.
    pub async fn handle_callback(
        &self,
        raw_body: impl AsRef<[u8]>,
        signature: Option<&str>,
    ) -> Result<CallbackOutcome, WebhookProcessorError> {
        self.deliver(raw_body.as_ref(), Delivery::Signed(signature)).await
    }

    /// Reconcile the status the dashboard saw on the gateway redirect.
    ///
    /// The callback is rebuilt with [`replay_payload`] and goes through the same audit and
    /// settlement path as an aggregator delivery. The caller is an authenticated session, so
    /// no signature is required. When the stored status already matches nothing is written.
    pub async fn replay_redirect(
        &self,
        request: &RedirectReplayRequest,
    ) -> Result<CallbackOutcome, WebhookProcessorError> {
        let collect_id = request.collect_request_id.trim();
        if collect_id.is_empty() {
            return Err(WebhookProcessorError::InvalidPayload(
                "collect_request_id should not be empty".to_string(),
            ));
        }
        if request.status.trim().is_empty() {
            return Err(WebhookProcessorError::InvalidPayload(
                "status should not be empty".to_string(),
            ));
        }

        let last_known = self
            .orders
            .find_status(collect_id)
            .await
            .map_err(|e| WebhookProcessorError::DatabaseError(e.to_string()))?;

        match replay_payload(
            collect_id,
            request.status.trim(),
            request.amount.as_deref(),
            last_known.as_ref(),
        ) {
            Some(payload) => {
                let body = payload.to_string();
                self.deliver(body.as_bytes(), Delivery::Replayed).await
            }
            None => {
                info!(collect_id = %collect_id, "Redirect status already recorded");
                Ok(CallbackOutcome {
                    message: ALREADY_RECONCILED_MESSAGE.to_string(),
                    updated_order_status: last_known,
                })
            }
        }
    }

    async fn deliver(
        &self,
        raw_body: &[u8],
        delivery: Delivery<'_>,
    ) -> Result<CallbackOutcome, WebhookProcessorError> {
        let (payload, parse_error) = match serde_json::from_slice::<JsonValue>(raw_body) {
            Ok(value) => (value, None),
            Err(e) => (
                JsonValue::String(String::from_utf8_lossy(raw_body).into_owned()),
                Some(e.to_string()),
            ),
        };

        let webhook_id = payload
            .get("order_info")
            .and_then(|info| info.get("order_id"))
            .and_then(JsonValue::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(UNKNOWN_WEBHOOK_ID)
            .to_string();

        let log = self
            .webhook_logs
            .open(NewWebhookLog {
                webhook_id: webhook_id.clone(),
                event_type: CALLBACK_EVENT_TYPE.to_string(),
                payload: payload.clone(),
            })
            .await
            .map_err(|e| WebhookProcessorError::DatabaseError(e.to_string()))?;

        match self.process(raw_body, &delivery, &payload, parse_error).await {
            Ok(updated) => {
                self.webhook_logs
                    .finish(log.id, WebhookOutcome::Success)
                    .await
                    .map_err(|e| WebhookProcessorError::DatabaseError(e.to_string()))?;

                match &updated {
                    Some(status) => info!(
                        webhook_id = %webhook_id,
                        status = %status.status,
                        "Callback processed successfully"
                    ),
                    None => warn!(
                        webhook_id = %webhook_id,
                        "Callback matched no order status record"
                    ),
                }

                Ok(CallbackOutcome {
                    message: "Callback processed".to_string(),
                    updated_order_status: updated,
                })
            }
            Err(e) => {
                warn!(webhook_id = %webhook_id, error = %e, "Callback processing failed");
                self.record_failure(&log, &e).await;
                Err(e)
            }
        }
    }

    async fn process(
        &self,
        raw_body: &[u8],
        delivery: &Delivery<'_>,
        payload: &JsonValue,
        parse_error: Option<String>,
    ) -> Result<Option<OrderStatus>, WebhookProcessorError> {
        self.verify_signature(raw_body, delivery)?;

        if let Some(reason) = parse_error {
            return Err(WebhookProcessorError::InvalidPayload(reason));
        }

        let callback = CallbackPayload::parse(payload)?;
        let settlement = Settlement::from(callback.order_info);

        self.orders
            .apply_settlement(&settlement)
            .await
            .map_err(|e| WebhookProcessorError::ReconciliationFailed {
                collect_id: settlement.collect_id.clone(),
                reason: e.to_string(),
            })
    }

    fn verify_signature(
        &self,
        raw_body: &[u8],
        delivery: &Delivery<'_>,
    ) -> Result<(), WebhookProcessorError> {
        let signature = match delivery {
            Delivery::Replayed => return Ok(()),
            Delivery::Signed(signature) => *signature,
        };

        let secret = match &self.signing_secret {
            Some(secret) => secret,
            None => {
                warn!("Webhook signing secret not configured; accepting unsigned callback");
                return Ok(());
            }
        };

        let signature = signature
            .filter(|s| !s.trim().is_empty())
            .ok_or(WebhookProcessorError::InvalidSignature)?;

        if !verify_hmac_sha256_hex(raw_body, secret, signature) {
            error!("Invalid webhook signature");
            return Err(WebhookProcessorError::InvalidSignature);
        }
        Ok(())
    }

    async fn record_failure(&self, log: &WebhookLog, err: &WebhookProcessorError) {
        let outcome = WebhookOutcome::Failed {
            error_message: err.to_string(),
        };
        if let Err(db_err) = self.webhook_logs.finish(log.id, outcome).await {
            error!(
                webhook_log_id = %log.id,
                error = %db_err,
                "Failed to record callback failure"
            );
        }
    }
}

/// Rebuild the callback for a redirect the dashboard observed.
///
/// [`WebhookProcessor::replay_redirect`] feeds the result through the normal callback path.
///
/// Returns `None` when the redirect status already matches the stored status, in which
/// case there is nothing to reconcile.
pub fn replay_payload(
    collect_id: &str,
    redirect_status: &str,
    redirect_amount: Option<&str>,
    last_known: Option<&OrderStatus>,
) -> Option<JsonValue> {
    if let Some(known) = last_known {
        if known.status.eq_ignore_ascii_case(redirect_status.trim()) {
            return None;
        }
    }

    let transaction_amount = match last_known {
        Some(known) => known.transaction_amount.clone(),
        None => redirect_amount
            .and_then(|amount| amount.trim().parse::<BigDecimal>().ok())
            .unwrap_or_else(|| BigDecimal::from(0)),
    };
    let payment_time = last_known
        .and_then(|known| known.payment_time)
        .unwrap_or_else(Utc::now);
    let text = |field: Option<&String>| field.cloned().unwrap_or_default();

    Some(json!({
        "order_info": {
            "order_id": collect_id,
            "status": redirect_status,
            "transaction_amount": transaction_amount.to_string(),
            "payment_mode": text(last_known.map(|s| &s.payment_mode)),
            "payment_details": text(last_known.map(|s| &s.payment_details)),
            "bank_reference": text(last_known.map(|s| &s.bank_reference)),
            "payment_message": "",
            "error_message": text(last_known.map(|s| &s.error_message)),
            "payment_time": payment_time.to_rfc3339(),
        }
    }))
}
