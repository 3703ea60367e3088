//! Order persistence
//!
//! [`OrderStore`] is the only seam between the services and the database.
//! Implementations must reject a second order with an existing order number
//! with [`StoreError::DuplicateOrderNumber`].

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::domain::aggregates::{Order, OrderStatus, PaymentStatus, StatusUpdate};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryOrderStore;
pub use postgres::PgOrderStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("order number {0} already exists")]
    DuplicateOrderNumber(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored order is unreadable: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Row filter shared by listing, counting and search.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderFilter {
    pub order_status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    /// Exact match, compared case-insensitively.
    pub email: Option<String>,
    /// Inclusive lower bound on `created_at`.
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub created_before: Option<DateTime<Utc>>,
    /// Case-insensitive substring over number, name, email and phone.
    pub search: Option<String>,
}

impl OrderFilter {
    pub fn created_between(from: DateTime<Utc>, before: DateTime<Utc>) -> Self {
        Self { created_from: Some(from), created_before: Some(before), ..Self::default() }
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.order_status.map_or(true, |s| order.order_status == s)
            && self.payment_status.map_or(true, |s| order.payment_status == s)
            && self.email.as_deref().map_or(true, |e| order.customer_email.eq_ignore_ascii_case(e))
            && self.created_from.map_or(true, |t| order.created_at >= t)
            && self.created_before.map_or(true, |t| order.created_at < t)
            && self.search.as_deref().map_or(true, |needle| {
                let needle = needle.to_lowercase();
                [order.order_number.as_str(), &order.customer_name, &order.customer_email, &order.customer_phone]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortField { #[default] CreatedAt, UpdatedAt, OrderNumber, CustomerName, TotalAmount, Subtotal, OrderStatus, PaymentStatus }

impl SortField {
    /// Maps the API's camelCase field names; unknown names fall back to `createdAt`.
    pub fn from_param(value: &str) -> Self {
        match value {
            "updatedAt" => Self::UpdatedAt,
            "orderNumber" => Self::OrderNumber,
            "customerName" => Self::CustomerName,
            "totalAmount" => Self::TotalAmount,
            "subtotal" => Self::Subtotal,
            "orderStatus" | "status" => Self::OrderStatus,
            "paymentStatus" => Self::PaymentStatus,
            _ => Self::CreatedAt,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::OrderNumber => "order_number",
            Self::CustomerName => "customer_name",
            Self::TotalAmount => "total_amount",
            Self::Subtotal => "subtotal",
            Self::OrderStatus => "order_status",
            Self::PaymentStatus => "payment_status",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortDirection { Asc, #[default] Desc }

#[derive(Clone, Debug, PartialEq)]
pub struct ListQuery {
    pub filter: OrderFilter,
    pub sort: SortField,
    pub direction: SortDirection,
    pub offset: u64,
    pub limit: u64,
}

/// Sum and mean of `total_amount` over every stored order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Revenue { pub total_revenue: Decimal, pub avg_order_value: Decimal }

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order, enforcing order number uniqueness.
    async fn insert(&self, order: &Order) -> StoreResult<()>;
    async fn find_by_number(&self, order_number: &str) -> StoreResult<Option<Order>>;
    /// Returns one page of matching orders plus the total number of matches.
    async fn list(&self, query: &ListQuery) -> StoreResult<(Vec<Order>, u64)>;
    async fn count(&self, filter: &OrderFilter) -> StoreResult<u64>;
    /// Applies a partial status change; `None` when the order does not exist.
    async fn update_status(&self, order_number: &str, update: StatusUpdate, at: DateTime<Utc>) -> StoreResult<Option<Order>>;
    /// Atomically increments and returns the sequence counter for `day` (first call yields 1).
    async fn next_daily_sequence(&self, day: NaiveDate) -> StoreResult<u32>;
    async fn count_by_status(&self) -> StoreResult<Vec<(OrderStatus, u64)>>;
    async fn revenue(&self) -> StoreResult<Revenue>;
    async fn ping(&self) -> StoreResult<()>;
}
