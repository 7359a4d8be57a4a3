//! Request field checks shared by the auth and payment services

use crate::error::{AppError, ValidationError};
use regex::Regex;
use std::sync::OnceLock;

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
            .expect("valid regex")
    })
}

pub fn is_valid_email(email: &str) -> bool {
    email_re().is_match(email.trim())
}

/// Blank (or whitespace-only) values count as missing
pub fn require_non_empty(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(ValidationError::MissingField {
            field: field.to_string(),
        }));
    }
    Ok(())
}

pub fn require_email(value: &str, field: &str) -> Result<(), AppError> {
    require_non_empty(value, field)?;
    if !is_valid_email(value) {
        return Err(AppError::validation(ValidationError::InvalidField {
            field: field.to_string(),
            reason: "must be an email".to_string(),
        }));
    }
    Ok(())
}
