//! In-process store implementing every storage trait.
//!
//! Used for `STORAGE_BACKEND=memory` and by tests. Mirrors the Postgres repositories:
//! unique emails and collect ids, atomic order pairs, nulls-first ascending sorts and
//! insertion-order ties.

use crate::database::account_repository::{Account, NewAccount};
use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::database::order_repository::{NewOrder, Order, OrderStatus, Settlement};
use crate::database::repository::{AccountStore, OrderStore, TransactionReader, WebhookLogStore};
use crate::database::transaction_repository::{
    SortField, SortOrder, TransactionQuery, TransactionView,
};
use crate::database::webhook_log_repository::{
    strip_nul, NewWebhookLog, WebhookLog, WebhookLogStatus, WebhookOutcome,
};
use crate::payments::types::PaymentStatus;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    accounts: Vec<Account>,
    orders: Vec<Order>,
    statuses: Vec<OrderStatus>,
    webhook_logs: Vec<WebhookLog>,
    next_status_id: i64,
}

impl Tables {
    fn view(&self, status: &OrderStatus) -> Option<TransactionView> {
        let order = self
            .orders
            .iter()
            .find(|o| o.collect_request_id == status.collect_id)?;

        Some(TransactionView {
            collect_id: status.collect_id.clone(),
            school_id: order.school_id.clone(),
            gateway: order.gateway_name.clone(),
            order_amount: status.order_amount.clone(),
            transaction_amount: status.transaction_amount.clone(),
            status: status.status.clone(),
            custom_order_id: status.collect_id.clone(),
            payment_time: status.payment_time,
            created_at: order.created_at,
            student_info: order.student_info(),
        })
    }
}

/// Shared, cloneable in-memory store
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    pub async fn status_count(&self) -> usize {
        self.tables.read().await.statuses.len()
    }
}

fn compare_views(a: &TransactionView, b: &TransactionView, field: SortField) -> Ordering {
    match field {
        SortField::CollectId => a.collect_id.cmp(&b.collect_id),
        SortField::SchoolId => a.school_id.cmp(&b.school_id),
        SortField::Gateway => a.gateway.cmp(&b.gateway),
        SortField::OrderAmount => a.order_amount.cmp(&b.order_amount),
        SortField::TransactionAmount => a.transaction_amount.cmp(&b.transaction_amount),
        SortField::Status => a.status.cmp(&b.status),
        // None < Some, so ascending puts nulls first and the reversed order puts them last
        SortField::PaymentTime => a.payment_time.cmp(&b.payment_time),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::Unsorted => Ordering::Equal,
    }
}

fn duplicate(constraint: &str) -> DatabaseError {
    DatabaseError::new(DatabaseErrorKind::UniqueViolation {
        constraint: Some(constraint.to_string()),
    })
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.accounts.iter().find(|a| a.email == email).cloned())
    }

    async fn create(&self, account: NewAccount) -> Result<Account, DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables.accounts.iter().any(|a| a.email == account.email) {
            return Err(duplicate("users_email_key"));
        }

        let created = Account {
            id: Uuid::new_v4(),
            email: account.email,
            password_hash: account.password_hash,
            name: account.name,
            created_at: Utc::now(),
        };
        tables.accounts.push(created.clone());
        Ok(created)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create_with_status(
        &self,
        order: NewOrder,
    ) -> Result<(Order, OrderStatus), DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables
            .orders
            .iter()
            .any(|o| o.collect_request_id == order.collect_request_id)
        {
            return Err(duplicate("orders_collect_request_id_key"));
        }

        let now = Utc::now();
        tables.next_status_id += 1;

        let created = Order {
            id: Uuid::new_v4(),
            school_id: order.school_id,
            trustee_id: order.trustee_id,
            student_name: order.student_info.name,
            student_id: order.student_info.id,
            student_email: order.student_info.email,
            gateway_name: order.gateway_name,
            amount: order.amount,
            collect_request_id: order.collect_request_id.clone(),
            collect_request_url: order.collect_request_url,
            status: PaymentStatus::Pending.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };
        let status = OrderStatus {
            id: tables.next_status_id,
            collect_id: order.collect_request_id,
            order_amount: order.order_amount,
            transaction_amount: BigDecimal::from(0),
            payment_mode: String::new(),
            payment_details: String::new(),
            bank_reference: String::new(),
            payment_message: String::new(),
            status: PaymentStatus::Pending.as_str().to_string(),
            error_message: String::new(),
            payment_time: None,
            created_at: now,
            updated_at: now,
        };

        tables.orders.push(created.clone());
        tables.statuses.push(status.clone());
        Ok((created, status))
    }

    async fn apply_settlement(
        &self,
        settlement: &Settlement,
    ) -> Result<Option<OrderStatus>, DatabaseError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let status_text = settlement.status.as_str().to_string();

        let updated = match tables
            .statuses
            .iter_mut()
            .find(|s| s.collect_id == settlement.collect_id)
        {
            Some(status) => {
                status.transaction_amount = settlement.transaction_amount.clone();
                status.payment_mode = settlement.payment_mode.clone();
                status.payment_details = settlement.payment_details.clone();
                status.bank_reference = settlement.bank_reference.clone();
                status.payment_message = settlement.payment_message.clone();
                status.status = status_text.clone();
                status.error_message = settlement.error_message.clone();
                status.payment_time = Some(settlement.payment_time);
                status.updated_at = now;
                Some(status.clone())
            }
            None => None,
        };

        if let Some(order) = tables
            .orders
            .iter_mut()
            .find(|o| o.collect_request_id == settlement.collect_id)
        {
            order.status = status_text;
            order.updated_at = now;
        }

        Ok(updated)
    }

    async fn find_status(&self, collect_id: &str) -> Result<Option<OrderStatus>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .statuses
            .iter()
            .find(|s| s.collect_id == collect_id)
            .cloned())
    }

    async fn find_order(&self, collect_request_id: &str) -> Result<Option<Order>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .iter()
            .find(|o| o.collect_request_id == collect_request_id)
            .cloned())
    }
}

#[async_trait]
impl TransactionReader for MemoryStore {
    async fn list_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<Vec<TransactionView>, DatabaseError> {
        let tables = self.tables.read().await;

        let mut views: Vec<TransactionView> = tables
            .statuses
            .iter()
            .filter_map(|s| tables.view(s))
            .filter(|v| query.status.as_deref().map_or(true, |st| v.status == st))
            .filter(|v| {
                query
                    .school_id
                    .as_deref()
                    .map_or(true, |school| v.school_id == school)
            })
            .collect();

        // stable sort keeps insertion order for ties in both directions
        views.sort_by(|a, b| match query.order {
            SortOrder::Asc => compare_views(a, b, query.sort),
            SortOrder::Desc => compare_views(b, a, query.sort),
        });

        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);
        Ok(views.into_iter().skip(offset).take(limit).collect())
    }

    async fn list_by_school(&self, school_id: &str) -> Result<Vec<TransactionView>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .statuses
            .iter()
            .filter_map(|s| tables.view(s))
            .filter(|v| v.school_id == school_id)
            .collect())
    }
}

#[async_trait]
impl WebhookLogStore for MemoryStore {
    async fn open(&self, entry: NewWebhookLog) -> Result<WebhookLog, DatabaseError> {
        let entry = entry.without_nul();
        let log = WebhookLog {
            id: Uuid::new_v4(),
            webhook_id: entry.webhook_id,
            event_type: entry.event_type,
            payload: entry.payload,
            status: WebhookLogStatus::Processing.as_str().to_string(),
            error_message: None,
            received_at: Utc::now(),
            processed_at: None,
        };
        self.tables.write().await.webhook_logs.push(log.clone());
        Ok(log)
    }

    async fn finish(&self, id: Uuid, outcome: WebhookOutcome) -> Result<WebhookLog, DatabaseError> {
        let mut tables = self.tables.write().await;
        let log = tables
            .webhook_logs
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| {
                DatabaseError::new(DatabaseErrorKind::NotFound {
                    entity: "WebhookLog".to_string(),
                    id: id.to_string(),
                })
            })?;

        log.status = outcome.status().as_str().to_string();
        log.error_message = outcome.error_message().map(strip_nul);
        log.processed_at = Some(Utc::now());
        Ok(log.clone())
    }

    async fn list_for_webhook(&self, webhook_id: &str) -> Result<Vec<WebhookLog>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .webhook_logs
            .iter()
            .filter(|l| l.webhook_id == webhook_id)
            .cloned()
            .collect())
    }
}
