//! In-memory implementation of OrderStore for tests and local development

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{ListQuery, OrderFilter, OrderStore, Revenue, SortDirection, SortField, StoreError, StoreResult};
use crate::domain::aggregates::{Order, OrderStatus, StatusUpdate};

#[derive(Default)]
struct Inner {
    orders: HashMap<String, Order>,
    sequences: HashMap<NaiveDate, u32>,
}

/// Thread-safe store backed by a `RwLock`ed map keyed by order number.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self { Self::default() }

    fn read<T>(&self, f: impl FnOnce(&Inner) -> T) -> StoreResult<T> {
        let inner = self.inner.read().map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))?;
        Ok(f(&inner))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> StoreResult<T> {
        let mut inner = self.inner.write().map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))?;
        Ok(f(&mut inner))
    }
}

fn compare(a: &Order, b: &Order, field: SortField) -> Ordering {
    match field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortField::OrderNumber => a.order_number.as_str().cmp(b.order_number.as_str()),
        SortField::CustomerName => a.customer_name.cmp(&b.customer_name),
        SortField::TotalAmount => a.total_amount.cmp(&b.total_amount),
        SortField::Subtotal => a.subtotal.cmp(&b.subtotal),
        SortField::OrderStatus => a.order_status.as_str().cmp(b.order_status.as_str()),
        SortField::PaymentStatus => a.payment_status.as_str().cmp(b.payment_status.as_str()),
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &Order) -> StoreResult<()> {
        self.write(|inner| {
            let key = order.order_number.as_str().to_string();
            if inner.orders.contains_key(&key) {
                return Err(StoreError::DuplicateOrderNumber(key));
            }
            inner.orders.insert(key, order.clone());
            Ok(())
        })?
    }

    async fn find_by_number(&self, order_number: &str) -> StoreResult<Option<Order>> {
        self.read(|inner| inner.orders.get(order_number).cloned())
    }

    async fn list(&self, query: &ListQuery) -> StoreResult<(Vec<Order>, u64)> {
        self.read(|inner| {
            let mut matched: Vec<&Order> = inner.orders.values().filter(|o| query.filter.matches(o)).collect();
            matched.sort_by(|a, b| {
                let ord = compare(a, b, query.sort).then_with(|| a.order_number.as_str().cmp(b.order_number.as_str()));
                match query.direction { SortDirection::Asc => ord, SortDirection::Desc => ord.reverse() }
            });
            let total = matched.len() as u64;
            let page = matched.into_iter().skip(usize::try_from(query.offset).unwrap_or(usize::MAX)).take(usize::try_from(query.limit).unwrap_or(usize::MAX)).cloned().collect();
            (page, total)
        })
    }

    async fn count(&self, filter: &OrderFilter) -> StoreResult<u64> {
        self.read(|inner| inner.orders.values().filter(|o| filter.matches(o)).count() as u64)
    }

    async fn update_status(&self, order_number: &str, update: StatusUpdate, at: DateTime<Utc>) -> StoreResult<Option<Order>> {
        self.write(|inner| {
            let Some(order) = inner.orders.get_mut(order_number) else { return Ok(None) };
            order.apply_status(update, at).map_err(|e| StoreError::Corrupt(e.to_string()))?;
            Ok(Some(order.clone()))
        })?
    }

    async fn next_daily_sequence(&self, day: NaiveDate) -> StoreResult<u32> {
        self.write(|inner| {
            let counter = inner.sequences.entry(day).or_insert(0);
            *counter += 1;
            *counter
        })
    }

    async fn count_by_status(&self) -> StoreResult<Vec<(OrderStatus, u64)>> {
        self.read(|inner| {
            OrderStatus::ALL
                .into_iter()
                .map(|status| (status, inner.orders.values().filter(|o| o.order_status == status).count() as u64))
                .collect()
        })
    }

    async fn revenue(&self) -> StoreResult<Revenue> {
        self.read(|inner| {
            let count = inner.orders.len();
            let total: Decimal = inner.orders.values().map(|o| o.total_amount).sum();
            let avg = if count == 0 { Decimal::ZERO } else { (total / Decimal::from(count)).round_dp(2) };
            Revenue { total_revenue: total, avg_order_value: avg }
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        self.read(|_| ())
    }
}
