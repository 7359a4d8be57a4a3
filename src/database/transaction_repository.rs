//! Joined order / order-status views for the dashboard

use crate::database::error::DatabaseError;
use crate::database::repository::TransactionReader;
use crate::middleware::logging::log_database_query;
use crate::payments::types::{decimal_number, StudentInfo};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{types::BigDecimal, FromRow, PgPool};

pub const DEFAULT_PAGE_LIMIT: i64 = 20;

const VIEW_SELECT: &str = "SELECT os.collect_id, o.school_id, o.gateway_name, os.order_amount, \
     os.transaction_amount, os.status, os.payment_time, o.created_at, o.student_name, \
     o.student_id, o.student_email \
     FROM order_statuses os \
     JOIN orders o ON o.collect_request_id = os.collect_id";

/// Flattened transaction record
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TransactionView {
    pub collect_id: String,
    pub school_id: String,
    pub gateway: String,
    #[serde(with = "decimal_number")]
    pub order_amount: BigDecimal,
    #[serde(with = "decimal_number")]
    pub transaction_amount: BigDecimal,
    pub status: String,
    pub custom_order_id: String,
    pub payment_time: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    pub student_info: StudentInfo,
}

#[derive(Debug, FromRow)]
struct TransactionRow {
    collect_id: String,
    school_id: String,
    gateway_name: String,
    order_amount: BigDecimal,
    transaction_amount: BigDecimal,
    status: String,
    payment_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    student_name: String,
    student_id: String,
    student_email: String,
}

impl From<TransactionRow> for TransactionView {
    fn from(row: TransactionRow) -> Self {
        Self {
            custom_order_id: row.collect_id.clone(),
            collect_id: row.collect_id,
            school_id: row.school_id,
            gateway: row.gateway_name,
            order_amount: row.order_amount,
            transaction_amount: row.transaction_amount,
            status: row.status,
            payment_time: row.payment_time,
            created_at: row.created_at,
            student_info: StudentInfo {
                name: row.student_name,
                id: row.student_id,
                email: row.student_email,
            },
        }
    }
}

/// Fields of [`TransactionView`] a listing can be sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CollectId,
    SchoolId,
    Gateway,
    OrderAmount,
    TransactionAmount,
    Status,
    PaymentTime,
    CreatedAt,
    /// Not a projected field: every row ties, so rows keep insertion order
    Unsorted,
}

impl SortField {
    pub fn from_param(field: &str) -> Self {
        match field.trim() {
            "collect_id" | "custom_order_id" => SortField::CollectId,
            "school_id" => SortField::SchoolId,
            "gateway" | "gateway_name" => SortField::Gateway,
            "order_amount" => SortField::OrderAmount,
            "transaction_amount" => SortField::TransactionAmount,
            "status" => SortField::Status,
            "payment_time" => SortField::PaymentTime,
            "createdAt" | "created_at" => SortField::CreatedAt,
            _ => SortField::Unsorted,
        }
    }

    fn column(&self) -> Option<&'static str> {
        match self {
            SortField::CollectId => Some("os.collect_id"),
            SortField::SchoolId => Some("o.school_id"),
            SortField::Gateway => Some("o.gateway_name"),
            SortField::OrderAmount => Some("os.order_amount"),
            SortField::TransactionAmount => Some("os.transaction_amount"),
            SortField::Status => Some("os.status"),
            SortField::PaymentTime => Some("os.payment_time"),
            SortField::CreatedAt => Some("o.created_at"),
            SortField::Unsorted => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// `asc` sorts ascending; anything else sorts descending
    pub fn from_param(order: &str) -> Self {
        if order.trim().eq_ignore_ascii_case("asc") {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }
}

/// One page of the transaction listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionQuery {
    pub limit: i64,
    pub page: i64,
    pub sort: SortField,
    pub order: SortOrder,
    pub status: Option<String>,
    pub school_id: Option<String>,
}

impl Default for TransactionQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            page: 1,
            sort: SortField::PaymentTime,
            order: SortOrder::Desc,
            status: None,
            school_id: None,
        }
    }
}

impl TransactionQuery {
    /// Rows to skip. Saturates, so a page past the end is empty rather than an overflow.
    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0).saturating_mul(self.limit.max(0))
    }

    /// ORDER BY clause built only from the closed set of sort columns.
    ///
    /// Nulls come first ascending and last descending; ties keep insertion order.
    pub fn order_by_clause(&self) -> String {
        match self.sort.column() {
            Some(column) => {
                let direction = match self.order {
                    SortOrder::Asc => "ASC NULLS FIRST",
                    SortOrder::Desc => "DESC NULLS LAST",
                };
                format!("ORDER BY {} {}, os.id ASC", column, direction)
            }
            None => "ORDER BY os.id ASC".to_string(),
        }
    }
}

/// Read-only repository over the order / order-status join
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionReader for TransactionRepository {
    async fn list_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<Vec<TransactionView>, DatabaseError> {
        let sql = format!(
            "{} WHERE ($1::text IS NULL OR os.status = $1)
               AND ($2::text IS NULL OR o.school_id = $2)
             {}
             LIMIT $3 OFFSET $4",
            VIEW_SELECT,
            query.order_by_clause()
        );

        let rows = log_database_query(
            "list_transactions",
            sqlx::query_as::<_, TransactionRow>(&sql)
                .bind(query.status.as_deref())
                .bind(query.school_id.as_deref())
                .bind(query.limit)
                .bind(query.offset())
                .fetch_all(&self.pool),
        )
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(rows.into_iter().map(TransactionView::from).collect())
    }

    async fn list_by_school(&self, school_id: &str) -> Result<Vec<TransactionView>, DatabaseError> {
        let sql = format!("{} WHERE o.school_id = $1 ORDER BY os.id ASC", VIEW_SELECT);

        let rows = log_database_query(
            "list_transactions_by_school",
            sqlx::query_as::<_, TransactionRow>(&sql)
                .bind(school_id)
                .fetch_all(&self.pool),
        )
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(rows.into_iter().map(TransactionView::from).collect())
    }
}
