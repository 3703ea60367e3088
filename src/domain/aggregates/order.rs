//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::value_objects::{OrderNumber, PaymentMethod, UnknownVariant};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_number: OrderNumber,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub shipping_address: ShippingAddress,
    pub products: Vec<LineItem>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping_fee: Decimal,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: u32,
    pub price: Decimal,
    #[serde(default, alias = "capsuleType", skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl LineItem {
    /// `None` when the product does not fit in a `Decimal`.
    pub fn checked_line_total(&self) -> Option<Decimal> { self.price.checked_mul(Decimal::from(self.quantity)) }
    pub fn line_total(&self) -> Decimal { self.price.saturating_mul(Decimal::from(self.quantity)) }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress { pub street: String, pub city: String, pub state: String, pub zip_code: String, pub country: String }

impl ShippingAddress {
    pub fn one_line(&self) -> String {
        format!("{}, {}, {} {}, {}", self.street, self.city, self.state, self.zip_code, self.country)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Processing, Shipped, Delivered, Cancelled }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus { #[default] Pending, Paid, Failed, Refunded }

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [Self::Pending, Self::Processing, Self::Shipped, Self::Delivered, Self::Cancelled];
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [Self::Pending, Self::Paid, Self::Failed, Self::Refunded];
    pub fn as_str(&self) -> &'static str {
        match self { Self::Pending => "pending", Self::Paid => "paid", Self::Failed => "failed", Self::Refunded => "refunded" }
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|v| v.as_str() == s).ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|v| v.as_str() == s).ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Validated order contents, before a number is assigned.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderDraft {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub shipping_address: ShippingAddress,
    pub products: Vec<LineItem>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping_fee: Decimal,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

impl OrderDraft {
    /// `subtotal + tax + shippingFee`; `None` on overflow.
    pub fn total_amount(&self) -> Option<Decimal> { self.subtotal.checked_add(self.tax)?.checked_add(self.shipping_fee) }
    pub fn items_total(&self) -> Option<Decimal> {
        self.products.iter().try_fold(Decimal::ZERO, |sum, item| sum.checked_add(item.checked_line_total()?))
    }
}

/// Partial status change; `None` leaves the field untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusUpdate { pub order_status: Option<OrderStatus>, pub payment_status: Option<PaymentStatus> }

impl StatusUpdate {
    pub fn is_empty(&self) -> bool { self.order_status.is_none() && self.payment_status.is_none() }
}

impl Order {
    /// Turns a draft into a new order carrying its final number and initial statuses.
    pub fn place(order_number: OrderNumber, draft: OrderDraft, now: DateTime<Utc>) -> Result<Self, OrderError> {
        if draft.products.is_empty() { return Err(OrderError::NoItems); }
        let total_amount = draft.total_amount().ok_or(OrderError::AmountOverflow)?;
        Ok(Self {
            id: Uuid::now_v7(), order_number,
            customer_name: draft.customer_name, customer_email: draft.customer_email, customer_phone: draft.customer_phone,
            shipping_address: draft.shipping_address, products: draft.products,
            subtotal: draft.subtotal, tax: draft.tax, shipping_fee: draft.shipping_fee, total_amount,
            payment_method: draft.payment_method, payment_status: PaymentStatus::Pending, order_status: OrderStatus::Pending,
            notes: draft.notes, created_at: now, updated_at: now,
        })
    }

    pub fn item_count(&self) -> u32 { self.products.iter().fold(0u32, |n, i| n.saturating_add(i.quantity)) }

    pub fn apply_status(&mut self, update: StatusUpdate, now: DateTime<Utc>) -> Result<(), OrderError> {
        if update.is_empty() { return Err(OrderError::EmptyUpdate); }
        if let Some(status) = update.order_status { self.order_status = status; }
        if let Some(status) = update.payment_status { self.payment_status = status; }
        self.touch(now);
        Ok(())
    }

    fn touch(&mut self, now: DateTime<Utc>) { self.updated_at = now.max(self.created_at); }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("order must contain at least one product")]
    NoItems,
    #[error("status update must change orderStatus or paymentStatus")]
    EmptyUpdate,
    #[error("order total is too large")]
    AmountOverflow,
}
