use crate::payments::error::PaymentError;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

/// Settlement state shared by orders, order statuses and callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_uppercase().as_str() {
            "PENDING" => Ok(PaymentStatus::Pending),
            "SUCCESS" => Ok(PaymentStatus::Success),
            "FAILED" | "FAILURE" | "FAIL" => Ok(PaymentStatus::Failed),
            _ => Err(PaymentError::ValidationError {
                message: format!("unsupported payment status: {}", value),
                field: Some("status".to_string()),
            }),
        }
    }
}

impl Serialize for PaymentStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PaymentStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Student the fee is collected for
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StudentInfo {
    pub name: String,
    pub id: String,
    pub email: String,
}

/// Parse a decimal amount string and require it to be greater than zero
pub fn parse_positive_amount(amount: &str, field: &str) -> Result<BigDecimal, PaymentError> {
    let parsed =
        BigDecimal::from_str(amount.trim()).map_err(|_| PaymentError::ValidationError {
            message: format!("invalid decimal amount: {}", amount),
            field: Some(field.to_string()),
        })?;
    if parsed <= BigDecimal::from(0) {
        return Err(PaymentError::ValidationError {
            message: "amount must be greater than zero".to_string(),
            field: Some(field.to_string()),
        });
    }
    Ok(parsed)
}

/// Signed request body sent to the aggregator's create-collect-request endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectRequest {
    pub school_id: String,
    pub amount: String,
    pub callback_url: String,
}

/// Collect request accepted by the aggregator, with the payment page URL resolved
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectRequestResponse {
    pub collect_request_id: String,
    pub collect_request_url: String,
    pub sign: Option<String>,
}

/// Amounts leave the service as JSON numbers and are accepted as numbers or numeric strings.
pub mod decimal_number {
    use bigdecimal::{BigDecimal, ToPrimitive};
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value as JsonValue;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_integer() {
            if let Some(whole) = value.to_i64() {
                return serializer.serialize_i64(whole);
            }
        }
        match value.to_f64() {
            Some(float) => serializer.serialize_f64(float),
            None => serializer.serialize_str(&value.to_string()),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigDecimal, D::Error> {
        match JsonValue::deserialize(deserializer)? {
            JsonValue::Number(number) => BigDecimal::from_str(&number.to_string())
                .map_err(|e| serde::de::Error::custom(format!("invalid amount: {}", e))),
            JsonValue::String(text) => BigDecimal::from_str(text.trim())
                .map_err(|_| serde::de::Error::custom(format!("invalid amount: {}", text))),
            other => Err(serde::de::Error::custom(format!(
                "amount must be a number, got {}",
                other
            ))),
        }
    }
}
