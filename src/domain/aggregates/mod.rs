//! Aggregates module
pub mod order;

pub use order::{LineItem, Order, OrderDraft, OrderError, OrderStatus, PaymentStatus, ShippingAddress, StatusUpdate};
