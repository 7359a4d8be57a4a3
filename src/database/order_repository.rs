use crate::database::error::DatabaseError;
use crate::database::repository::OrderStore;
use crate::payments::types::{decimal_number, PaymentStatus, StudentInfo};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{types::BigDecimal, FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

const ORDER_COLUMNS: &str = "id, school_id, trustee_id, student_name, student_id, student_email, \
     gateway_name, amount, collect_request_id, collect_request_url, status, created_at, updated_at";

const ORDER_STATUS_COLUMNS: &str = "id, collect_id, order_amount, transaction_amount, payment_mode, \
     payment_details, bank_reference, payment_message, status, error_message, payment_time, \
     created_at, updated_at";

/// Payment intent: one row per collect request opened with the aggregator
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub school_id: String,
    pub trustee_id: String,
    pub student_name: String,
    pub student_id: String,
    pub student_email: String,
    pub gateway_name: String,
    pub amount: String,
    pub collect_request_id: String,
    pub collect_request_url: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn student_info(&self) -> StudentInfo {
        StudentInfo {
            name: self.student_name.clone(),
            id: self.student_id.clone(),
            email: self.student_email.clone(),
        }
    }
}

/// Settlement state for one collect request, overwritten by each callback
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrderStatus {
    #[serde(skip_serializing)]
    pub id: i64,
    pub collect_id: String,
    #[serde(with = "decimal_number")]
    pub order_amount: BigDecimal,
    #[serde(with = "decimal_number")]
    pub transaction_amount: BigDecimal,
    pub payment_mode: String,
    pub payment_details: String,
    pub bank_reference: String,
    pub payment_message: String,
    pub status: String,
    pub error_message: String,
    pub payment_time: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub school_id: String,
    pub trustee_id: String,
    pub student_info: StudentInfo,
    pub gateway_name: String,
    pub amount: String,
    pub order_amount: BigDecimal,
    pub collect_request_id: String,
    pub collect_request_url: String,
}

/// Settlement fields carried by a callback. Applied as a full replace.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub collect_id: String,
    pub status: PaymentStatus,
    pub transaction_amount: BigDecimal,
    pub payment_mode: String,
    pub payment_details: String,
    pub bank_reference: String,
    pub payment_message: String,
    pub error_message: String,
    pub payment_time: DateTime<Utc>,
}

/// Repository for orders and their status records
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn create_with_status(
        &self,
        order: NewOrder,
    ) -> Result<(Order, OrderStatus), DatabaseError> {
        let insert_order = format!(
            "INSERT INTO orders
             (school_id, trustee_id, student_name, student_id, student_email, gateway_name,
              amount, collect_request_id, collect_request_url, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {}",
            ORDER_COLUMNS
        );
        let insert_status = format!(
            "INSERT INTO order_statuses (collect_id, order_amount, transaction_amount, status)
             VALUES ($1, $2, 0, $3)
             RETURNING {}",
            ORDER_STATUS_COLUMNS
        );

        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let created = sqlx::query_as::<_, Order>(&insert_order)
            .bind(&order.school_id)
            .bind(&order.trustee_id)
            .bind(&order.student_info.name)
            .bind(&order.student_info.id)
            .bind(&order.student_info.email)
            .bind(&order.gateway_name)
            .bind(&order.amount)
            .bind(&order.collect_request_id)
            .bind(&order.collect_request_url)
            .bind(PaymentStatus::Pending.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let status = sqlx::query_as::<_, OrderStatus>(&insert_status)
            .bind(&order.collect_request_id)
            .bind(&order.order_amount)
            .bind(PaymentStatus::Pending.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok((created, status))
    }

    async fn apply_settlement(
        &self,
        settlement: &Settlement,
    ) -> Result<Option<OrderStatus>, DatabaseError> {
        let update_status = format!(
            "UPDATE order_statuses
             SET transaction_amount = $2,
                 payment_mode = $3,
                 payment_details = $4,
                 bank_reference = $5,
                 payment_message = $6,
                 status = $7,
                 error_message = $8,
                 payment_time = $9,
                 updated_at = NOW()
             WHERE collect_id = $1
             RETURNING {}",
            ORDER_STATUS_COLUMNS
        );

        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let updated = sqlx::query_as::<_, OrderStatus>(&update_status)
            .bind(&settlement.collect_id)
            .bind(&settlement.transaction_amount)
            .bind(&settlement.payment_mode)
            .bind(&settlement.payment_details)
            .bind(&settlement.bank_reference)
            .bind(&settlement.payment_message)
            .bind(settlement.status.as_str())
            .bind(&settlement.error_message)
            .bind(settlement.payment_time)
            .fetch_optional(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let orders = sqlx::query(
            "UPDATE orders SET status = $2, updated_at = NOW() WHERE collect_request_id = $1",
        )
        .bind(&settlement.collect_id)
        .bind(settlement.status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;

        debug!(
            collect_id = %settlement.collect_id,
            status_matched = updated.is_some(),
            orders_matched = orders.rows_affected(),
            "settlement applied"
        );
        Ok(updated)
    }

    async fn find_status(&self, collect_id: &str) -> Result<Option<OrderStatus>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM order_statuses WHERE collect_id = $1",
            ORDER_STATUS_COLUMNS
        );
        sqlx::query_as::<_, OrderStatus>(&query)
            .bind(collect_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    async fn find_order(&self, collect_request_id: &str) -> Result<Option<Order>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM orders WHERE collect_request_id = $1",
            ORDER_COLUMNS
        );
        sqlx::query_as::<_, Order>(&query)
            .bind(collect_request_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }
}
