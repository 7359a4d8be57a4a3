//! Storage seams used by the services.
//!
//! Each trait has a Postgres implementation in this module tree and an in-process one in
//! [`crate::database::memory::MemoryStore`]. Both must agree on ordering and no-match
//! behaviour.

use crate::database::account_repository::{Account, NewAccount};
use crate::database::error::DatabaseError;
use crate::database::order_repository::{NewOrder, Order, OrderStatus, Settlement};
use crate::database::transaction_repository::{TransactionQuery, TransactionView};
use crate::database::webhook_log_repository::{NewWebhookLog, WebhookLog, WebhookOutcome};
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, DatabaseError>;

    /// Fails with `UniqueViolation` when the email is taken
    async fn create(&self, account: NewAccount) -> Result<Account, DatabaseError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Write the order and its status record together, or neither
    async fn create_with_status(
        &self,
        order: NewOrder,
    ) -> Result<(Order, OrderStatus), DatabaseError>;

    /// Overwrite the settlement fields and the order's coarse status.
    ///
    /// Returns `None` when no status record carries `settlement.collect_id`.
    async fn apply_settlement(
        &self,
        settlement: &Settlement,
    ) -> Result<Option<OrderStatus>, DatabaseError>;

    async fn find_status(&self, collect_id: &str) -> Result<Option<OrderStatus>, DatabaseError>;

    async fn find_order(&self, collect_request_id: &str) -> Result<Option<Order>, DatabaseError>;
}

#[async_trait]
pub trait TransactionReader: Send + Sync {
    async fn list_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<Vec<TransactionView>, DatabaseError>;

    async fn list_by_school(&self, school_id: &str) -> Result<Vec<TransactionView>, DatabaseError>;
}

#[async_trait]
pub trait WebhookLogStore: Send + Sync {
    async fn open(&self, entry: NewWebhookLog) -> Result<WebhookLog, DatabaseError>;

    async fn finish(&self, id: Uuid, outcome: WebhookOutcome) -> Result<WebhookLog, DatabaseError>;

    async fn list_for_webhook(&self, webhook_id: &str) -> Result<Vec<WebhookLog>, DatabaseError>;
}
