//! Unified error handling for the payment portal
//!
//! Every failure that reaches an HTTP caller is an `AppError`. It carries the HTTP status,
//! a machine-readable code and the message the dashboard shows verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable error codes returned in the `error` field of every error body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "EMAIL_ALREADY_REGISTERED")]
    EmailAlreadyRegistered,
    #[serde(rename = "RECONCILIATION_FAILED")]
    ReconciliationFailed,

    // Authentication errors (401)
    #[serde(rename = "INVALID_CREDENTIALS")]
    InvalidCredentials,
    #[serde(rename = "MISSING_TOKEN")]
    MissingToken,
    #[serde(rename = "INVALID_TOKEN")]
    InvalidToken,
    #[serde(rename = "TOKEN_EXPIRED")]
    TokenExpired,
    #[serde(rename = "INVALID_WEBHOOK_SIGNATURE")]
    InvalidWebhookSignature,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors (502, 504)
    #[serde(rename = "PAYMENT_GATEWAY_ERROR")]
    PaymentGatewayError,
    #[serde(rename = "RATE_LIMIT_ERROR")]
    RateLimitError,
    #[serde(rename = "EXTERNAL_SERVICE_TIMEOUT")]
    ExternalServiceTimeout,

    // Generic
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
}

/// Business rule violations
#[derive(Debug, Clone)]
pub enum DomainError {
    /// An account with this email already exists
    EmailAlreadyRegistered { email: String },
    /// A callback could not be applied to the order records
    ReconciliationFailed { collect_id: String, reason: String },
}

/// Authentication failures, all mapped to 401
#[derive(Debug, Clone)]
pub enum AuthenticationError {
    /// Unknown email or wrong password; deliberately indistinguishable
    InvalidCredentials,
    MissingToken,
    InvalidTokenFormat,
    InvalidToken { reason: String },
    TokenExpired,
    /// Callback signature missing or not matching the configured secret
    InvalidWebhookSignature,
}

/// Infrastructure-level errors (database, configuration, internal faults)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    /// Database connection or query failure
    Database { message: String, is_retryable: bool },
    /// Missing or invalid configuration
    Configuration { message: String },
    /// Unexpected internal fault (hashing, token encoding)
    Internal { message: String },
}

/// Payment aggregator failures
#[derive(Debug, Clone)]
pub enum ExternalError {
    PaymentGateway { message: String, is_retryable: bool },
    RateLimit { service: String, retry_after: Option<u64> },
    Timeout { service: String, timeout_secs: u64 },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// Required field missing or blank
    MissingField { field: String },
    /// Field present but malformed
    InvalidField { field: String, reason: String },
    /// Registration password and confirmation differ
    PasswordMismatch,
    /// Request or callback body could not be read
    InvalidPayload { reason: String },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Authentication(AuthenticationError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
        }
    }

    pub fn validation(err: ValidationError) -> Self {
        Self::new(AppErrorKind::Validation(err))
    }

    pub fn authentication(err: AuthenticationError) -> Self {
        Self::new(AppErrorKind::Authentication(err))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Infrastructure(InfrastructureError::Internal {
            message: message.into(),
        }))
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Attach the request id when one is known
    pub fn with_optional_request_id(mut self, request_id: Option<String>) -> Self {
        if request_id.is_some() {
            self.request_id = request_id;
        }
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::EmailAlreadyRegistered { .. } => 409,
                DomainError::ReconciliationFailed { .. } => 500,
            },
            AppErrorKind::Authentication(_) => 401,
            AppErrorKind::Infrastructure(_) => 500,
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { .. } => 502,
                ExternalError::RateLimit { .. } => 429,
                ExternalError::Timeout { .. } => 504,
            },
            AppErrorKind::Validation(_) => 400,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::EmailAlreadyRegistered { .. } => ErrorCode::EmailAlreadyRegistered,
                DomainError::ReconciliationFailed { .. } => ErrorCode::ReconciliationFailed,
            },
            AppErrorKind::Authentication(err) => match err {
                AuthenticationError::InvalidCredentials => ErrorCode::InvalidCredentials,
                AuthenticationError::MissingToken => ErrorCode::MissingToken,
                AuthenticationError::InvalidTokenFormat
                | AuthenticationError::InvalidToken { .. } => ErrorCode::InvalidToken,
                AuthenticationError::TokenExpired => ErrorCode::TokenExpired,
                AuthenticationError::InvalidWebhookSignature => {
                    ErrorCode::InvalidWebhookSignature
                }
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
                InfrastructureError::Internal { .. } => ErrorCode::InternalError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { .. } => ErrorCode::PaymentGatewayError,
                ExternalError::RateLimit { .. } => ErrorCode::RateLimitError,
                ExternalError::Timeout { .. } => ErrorCode::ExternalServiceTimeout,
            },
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
        }
    }

    /// Get user-facing error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::EmailAlreadyRegistered { .. } => {
                    "User with this email already exists".to_string()
                }
                DomainError::ReconciliationFailed { reason, .. } => {
                    format!("Failed to process payment callback: {}", reason)
                }
            },
            AppErrorKind::Authentication(err) => match err {
                AuthenticationError::InvalidCredentials => "Invalid credentials".to_string(),
                AuthenticationError::MissingToken => {
                    "Authorization header is required".to_string()
                }
                AuthenticationError::InvalidTokenFormat => {
                    "Invalid authorization header format. Expected: Bearer <token>".to_string()
                }
                AuthenticationError::InvalidToken { .. } => "Invalid token".to_string(),
                AuthenticationError::TokenExpired => "Token has expired".to_string(),
                AuthenticationError::InvalidWebhookSignature => {
                    "Invalid webhook signature".to_string()
                }
            },
            AppErrorKind::Infrastructure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { message, .. } => {
                    format!("Payment gateway request failed: {}", message)
                }
                ExternalError::RateLimit {
                    service,
                    retry_after,
                } => match retry_after {
                    Some(secs) => format!(
                        "Rate limit exceeded for {}. Please try again in {} seconds",
                        service, secs
                    ),
                    None => format!("Rate limit exceeded for {}. Please try again later", service),
                },
                ExternalError::Timeout {
                    service,
                    timeout_secs,
                } => format!(
                    "{} request timed out after {} seconds. Please try again",
                    service, timeout_secs
                ),
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::MissingField { field } => {
                    format!("{} should not be empty", field)
                }
                ValidationError::InvalidField { field, reason } => {
                    format!("{} {}", field, reason)
                }
                ValidationError::PasswordMismatch => "Passwords do not match".to_string(),
                ValidationError::InvalidPayload { reason } => {
                    format!("Invalid request body: {}", reason)
                }
            },
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(_) => false,
            AppErrorKind::Authentication(_) => false,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Configuration { .. } => false,
                InfrastructureError::Internal { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { is_retryable, .. } => *is_retryable,
                ExternalError::RateLimit { .. } => true,
                ExternalError::Timeout { .. } => true,
            },
            AppErrorKind::Validation(_) => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

// Note: From<DatabaseError> lives in database/error.rs, From<PaymentError> in payments/error.rs

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;
