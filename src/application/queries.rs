//! Read side and status changes over stored orders

use chrono::{DateTime, Datelike, Days, Local, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::numbering::{midnight_in, start_of_day};
use crate::domain::aggregates::{Order, OrderStatus, PaymentStatus, StatusUpdate};
use crate::domain::events::OrderEvent;
use crate::error::{AppError, FieldError, Result};
use crate::events::EventPublisher;
use crate::store::{ListQuery, OrderFilter, OrderStore, SortDirection, SortField};

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;
/// Largest offset a SQL `OFFSET` bind (BIGINT) can carry.
const MAX_OFFSET: u64 = i64::MAX as u64;

/// Query string of the listing endpoint.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub email: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub order_status: Option<String>,
    pub payment_status: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub pagination: Pagination,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    pub total_orders: u64,
    pub today_orders: u64,
    pub yesterday_orders: u64,
    pub this_month_orders: u64,
    pub by_status: BTreeMap<&'static str, u64>,
    pub total_revenue: Decimal,
    pub avg_order_value: Decimal,
    pub generated_at: DateTime<Utc>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates in server local time.
/// A plain end date covers its whole day.
fn parse_bound(value: &str, end: bool) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        let t = t.with_timezone(&Utc);
        return Some(if end { t + chrono::Duration::nanoseconds(1) } else { t });
    }
    let day = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    let day = if end { day.checked_add_days(Days::new(1))? } else { day };
    Some(midnight_in(&Local, day))
}

fn parse_status<T: std::str::FromStr>(field: &str, value: Option<&str>, allowed: &[&str], errors: &mut Vec<FieldError>) -> Option<T> {
    let value = value?;
    match value.parse() {
        Ok(status) => Some(status),
        Err(_) => {
            errors.push(FieldError::new(field, format!("{field} must be one of: {}", allowed.join(", "))));
            None
        }
    }
}

fn order_status_names() -> Vec<&'static str> { OrderStatus::ALL.iter().map(OrderStatus::as_str).collect() }
fn payment_status_names() -> Vec<&'static str> { PaymentStatus::ALL.iter().map(PaymentStatus::as_str).collect() }

impl ListOrdersParams {
    pub fn page(&self) -> u64 { self.page.unwrap_or(1).max(1) }
    pub fn limit(&self) -> u64 { self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE) }

    pub fn to_query(&self) -> Result<ListQuery> {
        let mut errors = Vec::new();
        let order_status = parse_status("status", non_blank(&self.status), &order_status_names(), &mut errors);
        let payment_status = parse_status("paymentStatus", non_blank(&self.payment_status), &payment_status_names(), &mut errors);
        let mut bound = |field: &str, value: Option<&str>, end: bool| {
            let value = value?;
            let parsed = parse_bound(value, end);
            if parsed.is_none() {
                errors.push(FieldError::new(field, format!("{field} must be a date (YYYY-MM-DD) or RFC 3339 timestamp")));
            }
            parsed
        };
        let created_from = bound("startDate", non_blank(&self.start_date), false);
        let created_before = bound("endDate", non_blank(&self.end_date), true);
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let direction = match non_blank(&self.sort_order) {
            Some(o) if o.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        };
        Ok(ListQuery {
            filter: OrderFilter {
                order_status,
                payment_status,
                email: non_blank(&self.email).map(str::to_string),
                created_from,
                created_before,
                search: non_blank(&self.search).map(str::to_string),
            },
            sort: non_blank(&self.sort_by).map(SortField::from_param).unwrap_or_default(),
            direction,
            offset: (self.page() - 1).saturating_mul(self.limit()).min(MAX_OFFSET),
            limit: self.limit(),
        })
    }
}

impl UpdateStatusRequest {
    pub fn to_update(&self) -> Result<StatusUpdate> {
        let mut errors = Vec::new();
        let update = StatusUpdate {
            order_status: parse_status("orderStatus", non_blank(&self.order_status), &order_status_names(), &mut errors),
            payment_status: parse_status("paymentStatus", non_blank(&self.payment_status), &payment_status_names(), &mut errors),
        };
        if errors.is_empty() && update.is_empty() {
            errors.push(FieldError::new("orderStatus", "Provide orderStatus or paymentStatus"));
        }
        if errors.is_empty() { Ok(update) } else { Err(AppError::Validation(errors)) }
    }
}

#[derive(Clone)]
pub struct OrderQueryService {
    store: Arc<dyn OrderStore>,
    events: EventPublisher,
}

impl OrderQueryService {
    pub fn new(store: Arc<dyn OrderStore>, events: EventPublisher) -> Self { Self { store, events } }

    pub async fn get_by_number(&self, order_number: &str) -> Result<Order> {
        self.store
            .find_by_number(order_number)
            .await?
            .ok_or_else(|| AppError::NotFound { order_number: order_number.to_string() })
    }

    pub async fn list_orders(&self, params: &ListOrdersParams) -> Result<OrderPage> {
        let query = params.to_query()?;
        let (orders, total) = self.store.list(&query).await?;
        Ok(OrderPage {
            orders,
            pagination: Pagination { page: params.page(), limit: query.limit, total, pages: total.div_ceil(query.limit) },
        })
    }

    /// Validates the request first, so a bad status is a 400 even for unknown orders.
    pub async fn update_status(&self, order_number: &str, request: &UpdateStatusRequest) -> Result<Order> {
        let update = request.to_update()?;
        let order = self
            .store
            .update_status(order_number, update, Utc::now())
            .await?
            .ok_or_else(|| AppError::NotFound { order_number: order_number.to_string() })?;
        tracing::info!(
            order_number = %order.order_number,
            order_status = %order.order_status,
            payment_status = %order.payment_status,
            "order status updated"
        );
        self.events.publish(OrderEvent::status_changed(&order));
        Ok(order)
    }

    pub async fn get_stats(&self) -> Result<OrderStats> {
        self.get_stats_at(Local::now()).await
    }

    pub async fn get_stats_at<Tz: TimeZone>(&self, now: DateTime<Tz>) -> Result<OrderStats>
    where
        Tz::Offset: Send,
    {
        let tz = now.timezone();
        let today = now.date_naive();
        let today_start = start_of_day(&now);
        let yesterday_start = midnight_in(&tz, today.pred_opt().unwrap_or(today));
        let month_start = midnight_in(&tz, today.with_day(1).unwrap_or(today));
        let since = |from: DateTime<Utc>| OrderFilter { created_from: Some(from), ..OrderFilter::default() };

        let total_orders = self.store.count(&OrderFilter::default()).await?;
        let today_orders = self.store.count(&since(today_start)).await?;
        let yesterday_orders = self.store.count(&OrderFilter::created_between(yesterday_start, today_start)).await?;
        let this_month_orders = self.store.count(&since(month_start)).await?;
        let by_status = self.store.count_by_status().await?.into_iter().map(|(s, n)| (s.as_str(), n)).collect();
        let revenue = self.store.revenue().await?;

        Ok(OrderStats {
            total_orders,
            today_orders,
            yesterday_orders,
            this_month_orders,
            by_status,
            total_revenue: revenue.total_revenue,
            avg_order_value: revenue.avg_order_value,
            generated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::order::tests::draft;
    use crate::domain::value_objects::OrderNumber;
    use crate::store::InMemoryOrderStore;
    use chrono::Duration;

    async fn seed(store: &InMemoryOrderStore, number: &str, name: &str, created_at: DateTime<Utc>) -> Order {
        let mut d = draft();
        d.customer_name = name.into();
        let order = Order::place(OrderNumber::from_stored(number), d, created_at).unwrap();
        store.insert(&order).await.unwrap();
        order
    }

    fn service(store: &InMemoryOrderStore) -> OrderQueryService {
        OrderQueryService::new(Arc::new(store.clone()), EventPublisher::disabled())
    }

    #[tokio::test]
    async fn test_get_by_number_not_found() {
        let svc = service(&InMemoryOrderStore::new());
        let err = svc.get_by_number("TRB0000000000").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_search_pagination_reflects_filtered_total() {
        let store = InMemoryOrderStore::new();
        let now = Utc::now();
        for i in 0..7 {
            seed(&store, &format!("TRB17500{i:02}"), "Ravi", now - Duration::minutes(i)).await;
        }
        for i in 0..5 {
            seed(&store, &format!("HV25010100{i:02}"), "Meera", now).await;
        }
        let params = ListOrdersParams { search: Some("trb-175".into()), ..Default::default() };
        assert_eq!(service(&store).list_orders(&params).await.unwrap().pagination.total, 0);

        let params = ListOrdersParams { search: Some("trb175".into()), limit: Some(3), page: Some(3), ..Default::default() };
        let page = service(&store).list_orders(&params).await.unwrap();
        assert_eq!(page.pagination, Pagination { page: 3, limit: 3, total: 7, pages: 3 });
        assert_eq!(page.orders.len(), 1);
        // Newest first: the oldest order lands on the last page.
        assert_eq!(page.orders[0].order_number.as_str(), "TRB1750006");
    }

    #[tokio::test]
    async fn test_search_matches_hyphenated_numbers() {
        let store = InMemoryOrderStore::new();
        seed(&store, "TRB-1759-A", "Ravi", Utc::now()).await;
        seed(&store, "TRB2501010001", "Trb-175 Fan", Utc::now()).await;
        seed(&store, "TRB2501010002", "Meera", Utc::now()).await;
        let params = ListOrdersParams { search: Some("trb-175".into()), ..Default::default() };
        let page = service(&store).list_orders(&params).await.unwrap();
        assert_eq!(page.pagination.total, 2);
        assert_eq!(page.pagination.pages, 1);
    }

    #[tokio::test]
    async fn test_list_rejects_bad_filters() {
        let params = ListOrdersParams { status: Some("lost".into()), start_date: Some("yesterday".into()), ..Default::default() };
        let Err(AppError::Validation(errors)) = params.to_query() else { panic!("expected validation error") };
        assert_eq!(errors.iter().map(|e| e.field.as_str()).collect::<Vec<_>>(), vec!["status", "startDate"]);
    }

    #[test]
    fn test_list_defaults() {
        let query = ListOrdersParams { limit: Some(1000), sort_by: Some("totalAmount".into()), sort_order: Some("ASC".into()), ..Default::default() }
            .to_query()
            .unwrap();
        assert_eq!(query.limit, MAX_PAGE_SIZE);
        assert_eq!(query.offset, 0);
        assert_eq!(query.sort, SortField::TotalAmount);
        assert_eq!(query.direction, SortDirection::Asc);
        let query = ListOrdersParams::default().to_query().unwrap();
        assert_eq!((query.limit, query.sort, query.direction), (DEFAULT_PAGE_SIZE, SortField::CreatedAt, SortDirection::Desc));
    }

    #[test]
    fn test_huge_page_keeps_offset_in_range() {
        let query = ListOrdersParams { page: Some(u64::MAX), limit: Some(100), ..Default::default() }.to_query().unwrap();
        assert_eq!(query.offset, i64::MAX as u64);
        assert!(i64::try_from(query.offset).is_ok());
    }

    #[tokio::test]
    async fn test_page_past_the_end_is_empty() {
        let store = InMemoryOrderStore::new();
        seed(&store, "TRB2501010001", "Ravi", Utc::now()).await;
        let params = ListOrdersParams { page: Some(u64::MAX), ..Default::default() };
        let page = service(&store).list_orders(&params).await.unwrap();
        assert!(page.orders.is_empty());
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.pagination.page, u64::MAX);
    }

    #[tokio::test]
    async fn test_filter_by_email_and_payment_status() {
        let store = InMemoryOrderStore::new();
        for i in 1..=3 {
            seed(&store, &format!("TRB250101000{i}"), "Asha", Utc::now()).await;
        }
        let mut other = draft();
        other.customer_email = "ravi@example.com".into();
        let order = Order::place(OrderNumber::from_stored("TRB2501010004"), other, Utc::now()).unwrap();
        store.insert(&order).await.unwrap();
        store.update_status("TRB2501010002", StatusUpdate { order_status: None, payment_status: Some(PaymentStatus::Paid) }, Utc::now()).await.unwrap();
        store.update_status("TRB2501010004", StatusUpdate { order_status: None, payment_status: Some(PaymentStatus::Paid) }, Utc::now()).await.unwrap();
        let svc = service(&store);

        let params = ListOrdersParams { email: Some("ASHA@EXAMPLE.COM".into()), limit: Some(2), ..Default::default() };
        let page = svc.list_orders(&params).await.unwrap();
        assert_eq!(page.pagination, Pagination { page: 1, limit: 2, total: 3, pages: 2 });
        assert!(page.orders.iter().all(|o| o.customer_email == "asha@example.com"));

        let params = ListOrdersParams { payment_status: Some("paid".into()), ..Default::default() };
        let page = svc.list_orders(&params).await.unwrap();
        assert_eq!(page.pagination.total, 2);
        assert!(page.orders.iter().all(|o| o.payment_status == PaymentStatus::Paid));

        let params = ListOrdersParams { email: Some("asha@example.com".into()), payment_status: Some("paid".into()), ..Default::default() };
        let page = svc.list_orders(&params).await.unwrap();
        assert_eq!(page.orders.iter().map(|o| o.order_number.as_str()).collect::<Vec<_>>(), vec!["TRB2501010002"]);

        let params = ListOrdersParams { payment_status: Some("settled".into()), ..Default::default() };
        assert!(matches!(svc.list_orders(&params).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_filter_by_date_range() {
        let store = InMemoryOrderStore::new();
        let day = |d: u32, h: u32| Local.with_ymd_and_hms(2025, 3, d, h, 0, 0).single().unwrap().with_timezone(&Utc);
        seed(&store, "TRB2503050001", "A", day(5, 23)).await;
        seed(&store, "TRB2503060001", "B", day(6, 0)).await;
        seed(&store, "TRB2503070001", "C", day(7, 23)).await;
        seed(&store, "TRB2503080001", "D", day(8, 0)).await;
        let svc = service(&store);
        let numbers = |page: OrderPage| page.orders.into_iter().map(|o| o.order_number.to_string()).collect::<Vec<_>>();

        let params = ListOrdersParams {
            start_date: Some("2025-03-06".into()),
            end_date: Some("2025-03-07".into()),
            sort_order: Some("asc".into()),
            ..Default::default()
        };
        let page = svc.list_orders(&params).await.unwrap();
        assert_eq!(page.pagination.total, 2);
        assert_eq!(numbers(page), vec!["TRB2503060001", "TRB2503070001"]);

        let from = day(7, 0).to_rfc3339();
        let params = ListOrdersParams { start_date: Some(from), ..Default::default() };
        assert_eq!(svc.list_orders(&params).await.unwrap().pagination.total, 2);
    }

    #[test]
    fn test_date_only_end_bound_covers_the_day() {
        let start = parse_bound("2025-03-07", false).unwrap();
        let end = parse_bound("2025-03-07", true).unwrap();
        assert_eq!(end - start, Duration::days(1));
        let exact = parse_bound("2025-03-07T10:00:00Z", true).unwrap();
        assert!(exact > Utc.with_ymd_and_hms(2025, 3, 7, 10, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_update_only_order_status() {
        let store = InMemoryOrderStore::new();
        let original = seed(&store, "TRB2501010001", "Ravi", Utc::now() - Duration::hours(1)).await;
        let request = UpdateStatusRequest { order_status: Some("shipped".into()), payment_status: None };
        let updated = service(&store).update_status("TRB2501010001", &request).await.unwrap();
        assert_eq!(updated.order_status, OrderStatus::Shipped);
        assert_eq!(updated.payment_status, original.payment_status);
        assert!(updated.updated_at > original.updated_at);
        let restored = Order { order_status: original.order_status, updated_at: original.updated_at, ..updated };
        assert_eq!(restored, original);
    }

    #[tokio::test]
    async fn test_update_status_errors() {
        let store = InMemoryOrderStore::new();
        seed(&store, "TRB2501010001", "Ravi", Utc::now()).await;
        let svc = service(&store);
        let bad = UpdateStatusRequest { order_status: Some("teleported".into()), payment_status: None };
        assert!(matches!(svc.update_status("TRB2501010001", &bad).await, Err(AppError::Validation(_))));
        assert!(matches!(svc.update_status("TRB2501010001", &UpdateStatusRequest::default()).await, Err(AppError::Validation(_))));
        let good = UpdateStatusRequest { order_status: None, payment_status: Some("paid".into()) };
        assert!(matches!(svc.update_status("TRB9999999999", &good).await, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_stats() {
        let store = InMemoryOrderStore::new();
        let now = Local.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).single().unwrap();
        let at = |days: i64| (now - Duration::days(days)).with_timezone(&Utc);
        seed(&store, "TRB2506150001", "A", at(0)).await;
        seed(&store, "TRB2506150002", "B", at(0)).await;
        seed(&store, "TRB2506140001", "C", at(1)).await;
        seed(&store, "TRB2506010001", "D", at(14)).await;
        seed(&store, "TRB2505200001", "E", at(26)).await;
        store.update_status("TRB2506150001", StatusUpdate { order_status: Some(OrderStatus::Delivered), payment_status: None }, Utc::now()).await.unwrap();

        let stats = service(&store).get_stats_at(now).await.unwrap();
        assert_eq!(stats.total_orders, 5);
        assert_eq!(stats.today_orders, 2);
        assert_eq!(stats.yesterday_orders, 1);
        assert_eq!(stats.this_month_orders, 4);
        assert_eq!(stats.by_status["pending"], 4);
        assert_eq!(stats.by_status["delivered"], 1);
        assert_eq!(stats.total_revenue, Decimal::new(5400, 0));
        assert_eq!(stats.avg_order_value, Decimal::new(1080, 0));
    }
}
