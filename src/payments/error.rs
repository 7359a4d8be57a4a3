use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Request timed out after {timeout_secs}s")]
    TimeoutError { timeout_secs: u64 },

    #[error("Rate limit exceeded: {message}")]
    RateLimitError {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("Request signing failed: {message}")]
    SigningError { message: String },

    #[error("Provider error: provider={provider}, message={message}")]
    ProviderError {
        provider: String,
        message: String,
        provider_code: Option<String>,
        retryable: bool,
    },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::ValidationError { .. } => false,
            PaymentError::NetworkError { .. } => true,
            PaymentError::TimeoutError { .. } => true,
            PaymentError::RateLimitError { .. } => true,
            PaymentError::SigningError { .. } => false,
            PaymentError::ProviderError { retryable, .. } => *retryable,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::ValidationError { .. } => 400,
            PaymentError::NetworkError { .. } => 502,
            PaymentError::TimeoutError { .. } => 504,
            PaymentError::RateLimitError { .. } => 429,
            PaymentError::SigningError { .. } => 500,
            PaymentError::ProviderError { .. } => 502,
        }
    }
}

impl From<PaymentError> for crate::error::AppError {
    fn from(err: PaymentError) -> Self {
        use crate::error::{
            AppError, AppErrorKind, ExternalError, InfrastructureError, ValidationError,
        };

        let kind = match err {
            PaymentError::ValidationError { message, field } => {
                AppErrorKind::Validation(ValidationError::InvalidField {
                    field: field.unwrap_or_else(|| "request".to_string()),
                    reason: message,
                })
            }
            PaymentError::TimeoutError { timeout_secs } => {
                AppErrorKind::External(ExternalError::Timeout {
                    service: "Payment gateway".to_string(),
                    timeout_secs,
                })
            }
            PaymentError::RateLimitError {
                retry_after_seconds,
                ..
            } => AppErrorKind::External(ExternalError::RateLimit {
                service: "payment gateway".to_string(),
                retry_after: retry_after_seconds,
            }),
            PaymentError::SigningError { message } => {
                AppErrorKind::Infrastructure(InfrastructureError::Configuration { message })
            }
            PaymentError::NetworkError { message } => {
                AppErrorKind::External(ExternalError::PaymentGateway {
                    message,
                    is_retryable: true,
                })
            }
            PaymentError::ProviderError {
                message, retryable, ..
            } => AppErrorKind::External(ExternalError::PaymentGateway {
                message,
                is_retryable: retryable,
            }),
        };

        AppError::new(kind)
    }
}
