//! Dashboard reads over orders and their settlement state

use crate::database::error::DatabaseError;
use crate::database::order_repository::OrderStatus;
use crate::database::repository::{OrderStore, TransactionReader};
use crate::database::transaction_repository::{
    SortField, SortOrder, TransactionQuery, TransactionView, DEFAULT_PAGE_LIMIT,
};
use crate::payments::types::decimal_number;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub const NOT_FOUND_MESSAGE: &str = "Transaction not found";

/// Raw listing parameters as they arrive on the query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListTransactionsParams {
    pub limit: Option<String>,
    pub page: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub status: Option<String>,
    pub school_id: Option<String>,
}

/// Zero, negative or unparseable values fall back to the default
fn positive_or(value: Option<&str>, default: i64) -> i64 {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ListTransactionsParams {
    pub fn to_query(&self) -> TransactionQuery {
        let defaults = TransactionQuery::default();
        TransactionQuery {
            limit: positive_or(self.limit.as_deref(), DEFAULT_PAGE_LIMIT),
            page: positive_or(self.page.as_deref(), 1),
            sort: self
                .sort
                .as_deref()
                .map(SortField::from_param)
                .unwrap_or(defaults.sort),
            order: self
                .order
                .as_deref()
                .map(SortOrder::from_param)
                .unwrap_or(defaults.order),
            status: non_blank(self.status.as_ref()),
            school_id: non_blank(self.school_id.as_ref()),
        }
    }
}

/// Fixed projection returned by a status lookup
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TransactionStatusView {
    pub collect_id: String,
    #[serde(with = "decimal_number")]
    pub order_amount: BigDecimal,
    #[serde(with = "decimal_number")]
    pub transaction_amount: BigDecimal,
    pub status: String,
    pub payment_time: Option<DateTime<Utc>>,
}

impl From<OrderStatus> for TransactionStatusView {
    fn from(status: OrderStatus) -> Self {
        Self {
            collect_id: status.collect_id,
            order_amount: status.order_amount,
            transaction_amount: status.transaction_amount,
            status: status.status,
            payment_time: status.payment_time,
        }
    }
}

/// An unknown id is an ordinary answer, not an error
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum StatusLookup {
    Found(TransactionStatusView),
    NotFound { message: String },
}

pub struct TransactionQueryService {
    reader: Arc<dyn TransactionReader>,
    orders: Arc<dyn OrderStore>,
}

impl TransactionQueryService {
    pub fn new(reader: Arc<dyn TransactionReader>, orders: Arc<dyn OrderStore>) -> Self {
        Self { reader, orders }
    }

    pub async fn list_transactions(
        &self,
        params: &ListTransactionsParams,
    ) -> Result<Vec<TransactionView>, DatabaseError> {
        let query = params.to_query();
        debug!(
            limit = query.limit,
            page = query.page,
            sort = ?query.sort,
            order = ?query.order,
            "listing transactions"
        );
        self.reader.list_transactions(&query).await
    }

    pub async fn list_by_school(
        &self,
        school_id: &str,
    ) -> Result<Vec<TransactionView>, DatabaseError> {
        self.reader.list_by_school(school_id.trim()).await
    }

    pub async fn get_status(&self, collect_id: &str) -> Result<StatusLookup, DatabaseError> {
        Ok(match self.orders.find_status(collect_id.trim()).await? {
            Some(status) => StatusLookup::Found(status.into()),
            None => StatusLookup::NotFound {
                message: NOT_FOUND_MESSAGE.to_string(),
            },
        })
    }
}
