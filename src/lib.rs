//! Order intake service
//!
//! Accepts storefront orders over HTTP, assigns day-scoped order numbers,
//! persists them and emails the customer and the store admin in the background.
//!
//! ## Features
//! - Order creation with server-side totals
//! - Collision-free daily order numbering
//! - Listing, search, status updates and statistics
//! - SMTP notifications and NATS domain events

pub mod api;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod notifications;
pub mod store;

pub use api::{router, AppState};
pub use config::Config;
pub use domain::aggregates::{Order, OrderStatus, PaymentStatus};
pub use domain::value_objects::{OrderNumber, PaymentMethod};
pub use error::{AppError, ApiError};
