//! PostgreSQL implementation of OrderStore

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use std::time::Duration;
use uuid::Uuid;

use super::{ListQuery, OrderFilter, OrderStore, Revenue, SortDirection, StoreError, StoreResult};
use crate::domain::aggregates::{LineItem, Order, OrderStatus, ShippingAddress, StatusUpdate};
use crate::domain::value_objects::OrderNumber;

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    customer_name: String,
    customer_email: String,
    customer_phone: String,
    shipping_address: Json<ShippingAddress>,
    products: Json<Vec<LineItem>>,
    subtotal: Decimal,
    tax: Decimal,
    shipping_fee: Decimal,
    total_amount: Decimal,
    payment_method: String,
    payment_status: String,
    order_status: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let corrupt = |field: &str, e: &dyn std::fmt::Display| StoreError::Corrupt(format!("{} {field}: {e}", row.order_number));
        Ok(Order {
            id: row.id,
            payment_method: row.payment_method.parse().map_err(|e| corrupt("payment_method", &e))?,
            payment_status: row.payment_status.parse().map_err(|e| corrupt("payment_status", &e))?,
            order_status: row.order_status.parse().map_err(|e| corrupt("order_status", &e))?,
            order_number: OrderNumber::from_stored(row.order_number),
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            customer_phone: row.customer_phone,
            shipping_address: row.shipping_address.0,
            products: row.products.0,
            subtotal: row.subtotal,
            tax: row.tax,
            shipping_fee: row.shipping_fee,
            total_amount: row.total_amount,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Escapes LIKE metacharacters so user search text matches literally.
fn like_pattern(needle: &str) -> String {
    let escaped = needle.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

/// Binds page bounds as BIGINT, saturating instead of wrapping negative.
fn bigint(value: u64) -> i64 { i64::try_from(value).unwrap_or(i64::MAX) }

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    qb.push(" WHERE TRUE");
    if let Some(status) = filter.order_status {
        qb.push(" AND order_status = ").push_bind(status.as_str());
    }
    if let Some(status) = filter.payment_status {
        qb.push(" AND payment_status = ").push_bind(status.as_str());
    }
    if let Some(email) = &filter.email {
        qb.push(" AND LOWER(customer_email) = LOWER(").push_bind(email.clone()).push(")");
    }
    if let Some(from) = filter.created_from {
        qb.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(before) = filter.created_before {
        qb.push(" AND created_at < ").push_bind(before);
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        qb.push(" AND (order_number ILIKE ").push_bind(pattern.clone());
        qb.push(" OR customer_name ILIKE ").push_bind(pattern.clone());
        qb.push(" OR customer_email ILIKE ").push_bind(pattern.clone());
        qb.push(" OR customer_phone ILIKE ").push_bind(pattern).push(")");
    }
}

#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    /// Opens the pool and applies pending migrations.
    pub async fn connect(url: &str, max_connections: u32, acquire_timeout: Duration) -> StoreResult<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).acquire_timeout(acquire_timeout).connect(url).await?;
        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| StoreError::Unavailable(format!("migration failed: {e}")))?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(&self, order: &Order) -> StoreResult<()> {
        sqlx::query("INSERT INTO orders (id, order_number, customer_name, customer_email, customer_phone, shipping_address, products, subtotal, tax, shipping_fee, total_amount, payment_method, payment_status, order_status, notes, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)")
            .bind(order.id).bind(order.order_number.as_str()).bind(&order.customer_name).bind(&order.customer_email).bind(&order.customer_phone)
            .bind(Json(&order.shipping_address)).bind(Json(&order.products))
            .bind(order.subtotal).bind(order.tax).bind(order.shipping_fee).bind(order.total_amount)
            .bind(order.payment_method.as_str()).bind(order.payment_status.as_str()).bind(order.order_status.as_str())
            .bind(&order.notes).bind(order.created_at).bind(order.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateOrderNumber(order.order_number.to_string()),
                other => StoreError::Database(other),
            })?;
        Ok(())
    }

    async fn find_by_number(&self, order_number: &str) -> StoreResult<Option<Order>> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE order_number = $1")
            .bind(order_number).fetch_optional(&self.pool).await?
            .map(Order::try_from).transpose()
    }

    async fn list(&self, query: &ListQuery) -> StoreResult<(Vec<Order>, u64)> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM orders");
        push_filter(&mut qb, &query.filter);
        let direction = match query.direction { SortDirection::Asc => "ASC", SortDirection::Desc => "DESC" };
        qb.push(format_args!(" ORDER BY {} {direction}, order_number {direction}", query.sort.column()));
        qb.push(" LIMIT ").push_bind(bigint(query.limit)).push(" OFFSET ").push_bind(bigint(query.offset));
        let rows = qb.build_query_as::<OrderRow>().fetch_all(&self.pool).await?;
        let orders = rows.into_iter().map(Order::try_from).collect::<StoreResult<Vec<_>>>()?;
        Ok((orders, self.count(&query.filter).await?))
    }

    async fn count(&self, filter: &OrderFilter) -> StoreResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders");
        push_filter(&mut qb, filter);
        let total = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(total.max(0) as u64)
    }

    async fn update_status(&self, order_number: &str, update: StatusUpdate, at: DateTime<Utc>) -> StoreResult<Option<Order>> {
        sqlx::query_as::<_, OrderRow>("UPDATE orders SET order_status = COALESCE($2, order_status), payment_status = COALESCE($3, payment_status), updated_at = GREATEST($4, created_at) WHERE order_number = $1 RETURNING *")
            .bind(order_number)
            .bind(update.order_status.map(|s| s.as_str()))
            .bind(update.payment_status.map(|s| s.as_str()))
            .bind(at)
            .fetch_optional(&self.pool).await?
            .map(Order::try_from).transpose()
    }

    async fn next_daily_sequence(&self, day: NaiveDate) -> StoreResult<u32> {
        let value: i32 = sqlx::query_scalar("INSERT INTO order_sequences (day, last_value) VALUES ($1, 1) ON CONFLICT (day) DO UPDATE SET last_value = order_sequences.last_value + 1 RETURNING last_value")
            .bind(day).fetch_one(&self.pool).await?;
        u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative sequence for {day}")))
    }

    async fn count_by_status(&self) -> StoreResult<Vec<(OrderStatus, u64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as("SELECT order_status, COUNT(*) FROM orders GROUP BY order_status")
            .fetch_all(&self.pool).await?;
        Ok(OrderStatus::ALL
            .into_iter()
            .map(|status| {
                let n = rows.iter().find(|(s, _)| s == status.as_str()).map_or(0, |(_, n)| *n);
                (status, n.max(0) as u64)
            })
            .collect())
    }

    async fn revenue(&self) -> StoreResult<Revenue> {
        let (total_revenue, avg_order_value): (Decimal, Decimal) =
            sqlx::query_as("SELECT COALESCE(SUM(total_amount), 0), COALESCE(ROUND(AVG(total_amount), 2), 0) FROM orders")
                .fetch_one(&self.pool).await?;
        Ok(Revenue { total_revenue, avg_order_value })
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
