//! Domain events
use crate::domain::aggregates::{Order, OrderStatus, PaymentStatus};
use crate::domain::value_objects::OrderNumber;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    #[serde(rename_all = "camelCase")]
    Placed { order_number: OrderNumber, customer_email: String, total_amount: Decimal },
    #[serde(rename_all = "camelCase")]
    StatusChanged { order_number: OrderNumber, order_status: OrderStatus, payment_status: PaymentStatus },
}

impl OrderEvent {
    pub fn placed(order: &Order) -> Self {
        Self::Placed { order_number: order.order_number.clone(), customer_email: order.customer_email.clone(), total_amount: order.total_amount }
    }

    pub fn status_changed(order: &Order) -> Self {
        Self::StatusChanged { order_number: order.order_number.clone(), order_status: order.order_status, payment_status: order.payment_status }
    }

    /// Subject suffix used when publishing.
    pub fn kind(&self) -> &'static str {
        match self { Self::Placed { .. } => "placed", Self::StatusChanged { .. } => "status_changed" }
    }

    pub fn order_number(&self) -> &OrderNumber {
        match self { Self::Placed { order_number, .. } | Self::StatusChanged { order_number, .. } => order_number }
    }
}
