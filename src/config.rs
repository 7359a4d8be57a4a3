//! Application configuration module
//! Loads environment variables once at startup and validates them before the server binds.
//! Components receive the section they need; nothing reads the environment afterwards.

use std::env;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageBackend,
    pub database: Option<DatabaseConfig>,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub gateway: PaymentGatewayConfig,
    pub webhook: WebhookConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

/// Where records are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,   // seconds
    pub idle_timeout: Option<u64>, // seconds
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Plain,
}

/// Session token settings
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

/// Payment aggregator settings
#[derive(Clone)]
pub struct PaymentGatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub pg_key: String,
    pub callback_url: String,
    pub timeout_secs: u64,
}

/// Inbound callback settings
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub signing_secret: Option<String>,
    pub signature_header: String,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv::dotenv().ok();

        let storage = StorageBackend::from_env()?;
        let database = match storage {
            StorageBackend::Postgres => Some(DatabaseConfig::from_env()?),
            StorageBackend::Memory => None,
        };

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            storage,
            database,
            logging: LoggingConfig::from_env()?,
            auth: AuthConfig::from_env()?,
            gateway: PaymentGatewayConfig::from_env()?,
            webhook: WebhookConfig::from_env(),
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        if let Some(database) = &self.database {
            database.validate()?;
        }
        self.logging.validate()?;
        self.auth.validate()?;
        self.gateway.validate()?;
        self.webhook.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue("PORT cannot be 0".to_string()));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue("HOST cannot be empty".to_string()));
        }

        Ok(())
    }
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(ConfigError::InvalidValue(format!(
                "STORAGE_BACKEND must be postgres or memory, got '{}'",
                other
            ))),
        }
    }
}

impl StorageBackend {
    pub fn from_env() -> Result<Self, ConfigError> {
        env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse()
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_CONNECTION_TIMEOUT".to_string()))?,
            idle_timeout: env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|val| val.parse().ok()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

impl AuthConfig {
    /// One year
    pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(AuthConfig {
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| ConfigError::MissingVariable("JWT_SECRET".to_string()))?,
            token_ttl_hours: env::var("JWT_TTL_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::InvalidValue("JWT_SECRET".to_string()));
        }

        if self.token_ttl_hours <= 0 || self.token_ttl_hours > AuthConfig::MAX_TOKEN_TTL_HOURS {
            return Err(ConfigError::InvalidValue(format!(
                "JWT_TTL_HOURS must be between 1 and {}",
                AuthConfig::MAX_TOKEN_TTL_HOURS
            )));
        }

        Ok(())
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_hours", &self.token_ttl_hours)
            .finish()
    }
}

impl PaymentGatewayConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://dev-vanilla.edviron.com/erp";

    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(PaymentGatewayConfig {
            base_url: env::var("PAYMENT_GATEWAY_URL")
                .unwrap_or_else(|_| Self::DEFAULT_BASE_URL.to_string()),
            api_key: env::var("PAYMENT_API_KEY")
                .map_err(|_| ConfigError::MissingVariable("PAYMENT_API_KEY".to_string()))?,
            pg_key: env::var("PG_KEY")
                .map_err(|_| ConfigError::MissingVariable("PG_KEY".to_string()))?,
            callback_url: env::var("CALLBACK_URL")
                .map_err(|_| ConfigError::MissingVariable("CALLBACK_URL".to_string()))?,
            timeout_secs: env::var("PAYMENT_GATEWAY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("PAYMENT_GATEWAY_URL", &self.base_url),
            ("CALLBACK_URL", &self.callback_url),
        ] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be a valid URL",
                    name
                )));
            }
        }

        if self.api_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue("PAYMENT_API_KEY".to_string()));
        }

        if self.pg_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue("PG_KEY".to_string()));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "PAYMENT_GATEWAY_TIMEOUT_SECS".to_string(),
            ));
        }

        Ok(())
    }
}

impl std::fmt::Debug for PaymentGatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentGatewayConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("pg_key", &"<redacted>")
            .field("callback_url", &self.callback_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            signing_secret: None,
            signature_header: "x-webhook-signature".to_string(),
        }
    }
}

impl WebhookConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        WebhookConfig {
            signing_secret: env::var("WEBHOOK_SIGNING_SECRET")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            signature_header: env::var("WEBHOOK_SIGNATURE_HEADER")
                .map(|h| h.to_lowercase())
                .unwrap_or(defaults.signature_header),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signature_header.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "WEBHOOK_SIGNATURE_HEADER".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

impl From<std::num::ParseIntError> for ConfigError {
    fn from(_: std::num::ParseIntError) -> Self {
        ConfigError::InvalidValue("Failed to parse integer value".to_string())
    }
}
