//! Staff registration and login

use crate::database::account_repository::{Account, NewAccount};
use crate::database::repository::AccountStore;
use crate::error::{AppError, AppErrorKind, AuthenticationError, DomainError, ValidationError};
use crate::logging::mask_email;
use crate::services::session::SessionIssuer;
use crate::services::validation::{require_email, require_non_empty};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, rename = "confirmPassword")]
    pub confirm_password: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Account as the dashboard sees it
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserView {
    pub email: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
}

impl From<&Account> for UserView {
    fn from(account: &Account) -> Self {
        Self {
            email: account.email.clone(),
            full_name: account.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user: UserView,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserView,
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::internal(format!("password hashing failed: {}", e)))
}

/// `Ok(false)` on a wrong password; `Err` only for an unreadable stored hash
pub fn verify_password(stored_hash: &str, password: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| AppError::internal(format!("stored password hash is invalid: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::internal(format!(
            "password verification failed: {}",
            e
        ))),
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn invalid_credentials() -> AppError {
    AppError::authentication(AuthenticationError::InvalidCredentials)
}

pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    sessions: Arc<SessionIssuer>,
}

impl AuthService {
    pub fn new(accounts: Arc<dyn AccountStore>, sessions: Arc<SessionIssuer>) -> Self {
        Self { accounts, sessions }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<RegisterResponse, AppError> {
        require_email(&request.email, "email")?;
        require_non_empty(&request.password, "password")?;
        require_non_empty(&request.name, "name")?;
        if request.password != request.confirm_password {
            return Err(AppError::validation(ValidationError::PasswordMismatch));
        }

        let email = normalize_email(&request.email);
        if self.accounts.find_by_email(&email).await?.is_some() {
            warn!(email = %mask_email(&email), "registration rejected: email taken");
            return Err(email_taken(email));
        }

        let password_hash = hash_password(&request.password)?;
        let account = self
            .accounts
            .create(NewAccount {
                email: email.clone(),
                password_hash,
                name: request.name.trim().to_string(),
            })
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    email_taken(email.clone())
                } else {
                    AppError::from(e)
                }
            })?;

        info!(email = %mask_email(&account.email), "account registered");
        Ok(RegisterResponse {
            message: "User registered successfully".to_string(),
            user: UserView::from(&account),
        })
    }

    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AppError> {
        require_non_empty(&request.email, "email")?;
        require_non_empty(&request.password, "password")?;

        let email = normalize_email(&request.email);
        let account = match self.accounts.find_by_email(&email).await? {
            Some(account) => account,
            None => {
                warn!(email = %mask_email(&email), "login failed: unknown account");
                return Err(invalid_credentials());
            }
        };

        if !verify_password(&account.password_hash, &request.password)? {
            warn!(email = %mask_email(&email), "login failed: wrong password");
            return Err(invalid_credentials());
        }

        let access_token = self.sessions.issue(account.id, &account.email)?;
        info!(email = %mask_email(&account.email), "login succeeded");

        Ok(LoginResponse {
            access_token,
            user: UserView::from(&account),
        })
    }
}

fn email_taken(email: String) -> AppError {
    AppError::new(AppErrorKind::Domain(DomainError::EmailAlreadyRegistered {
        email,
    }))
}
