use crate::database::error::DatabaseError;
use crate::database::repository::WebhookLogStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const WEBHOOK_LOG_COLUMNS: &str =
    "id, webhook_id, event_type, payload, status, error_message, received_at, processed_at";

/// Lifecycle of a single callback attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookLogStatus {
    Processing,
    Success,
    Failed,
}

impl WebhookLogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookLogStatus::Processing => "processing",
            WebhookLogStatus::Success => "success",
            WebhookLogStatus::Failed => "failed",
        }
    }
}

/// Audit record of one callback attempt
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WebhookLog {
    pub id: Uuid,
    pub webhook_id: String,
    pub event_type: String,
    pub payload: JsonValue,
    pub status: String,
    pub error_message: Option<String>,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewWebhookLog {
    pub webhook_id: String,
    pub event_type: String,
    pub payload: JsonValue,
}

impl NewWebhookLog {
    /// Postgres TEXT and JSONB reject NUL, so it is dropped before the entry is written.
    /// The attempt is recorded either way.
    pub fn without_nul(self) -> Self {
        Self {
            webhook_id: strip_nul(&self.webhook_id),
            event_type: strip_nul(&self.event_type),
            payload: payload_without_nul(self.payload),
        }
    }
}

pub fn strip_nul(text: &str) -> String {
    text.replace('\0', "")
}

pub fn payload_without_nul(value: JsonValue) -> JsonValue {
    match value {
        JsonValue::String(text) => JsonValue::String(strip_nul(&text)),
        JsonValue::Array(items) => {
            JsonValue::Array(items.into_iter().map(payload_without_nul).collect())
        }
        JsonValue::Object(fields) => JsonValue::Object(
            fields
                .into_iter()
                .map(|(key, value)| (strip_nul(&key), payload_without_nul(value)))
                .collect(),
        ),
        other => other,
    }
}

/// Terminal outcome recorded on a log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Success,
    Failed { error_message: String },
}

impl WebhookOutcome {
    pub fn status(&self) -> WebhookLogStatus {
        match self {
            WebhookOutcome::Success => WebhookLogStatus::Success,
            WebhookOutcome::Failed { .. } => WebhookLogStatus::Failed,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            WebhookOutcome::Success => None,
            WebhookOutcome::Failed { error_message } => Some(error_message),
        }
    }
}

/// Repository for the callback audit trail
pub struct WebhookLogRepository {
    pool: PgPool,
}

impl WebhookLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookLogStore for WebhookLogRepository {
    async fn open(&self, entry: NewWebhookLog) -> Result<WebhookLog, DatabaseError> {
        let entry = entry.without_nul();
        let query = format!(
            "INSERT INTO webhook_logs (webhook_id, event_type, payload, status)
             VALUES ($1, $2, $3, $4)
             RETURNING {}",
            WEBHOOK_LOG_COLUMNS
        );
        sqlx::query_as::<_, WebhookLog>(&query)
            .bind(&entry.webhook_id)
            .bind(&entry.event_type)
            .bind(&entry.payload)
            .bind(WebhookLogStatus::Processing.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    async fn finish(&self, id: Uuid, outcome: WebhookOutcome) -> Result<WebhookLog, DatabaseError> {
        let query = format!(
            "UPDATE webhook_logs
             SET status = $2, error_message = $3, processed_at = NOW()
             WHERE id = $1
             RETURNING {}",
            WEBHOOK_LOG_COLUMNS
        );
        sqlx::query_as::<_, WebhookLog>(&query)
            .bind(id)
            .bind(outcome.status().as_str())
            .bind(outcome.error_message().map(strip_nul))
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    async fn list_for_webhook(&self, webhook_id: &str) -> Result<Vec<WebhookLog>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM webhook_logs WHERE webhook_id = $1 ORDER BY received_at ASC",
            WEBHOOK_LOG_COLUMNS
        );
        sqlx::query_as::<_, WebhookLog>(&query)
            .bind(webhook_id)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }
}
