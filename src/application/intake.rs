//! Order intake: validate, number, persist, notify

use chrono::Utc;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use validator::ValidateEmail;

use super::numbering::OrderNumberGenerator;
use crate::config::OrderConfig;
use crate::domain::aggregates::{LineItem, Order, OrderDraft, ShippingAddress};
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::PaymentMethod;
use crate::error::{AppError, FieldError, Result};
use crate::events::EventPublisher;
use crate::notifications::NotificationDispatcher;
use crate::store::{OrderStore, StoreError};

const NAME_LEN: std::ops::RangeInclusive<usize> = 2..=100;

/// Creation payload as sent by the storefront. Everything is optional here so
/// that missing fields are reported per field instead of as a parse failure.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_email: String,
    #[serde(default)]
    pub customer_phone: String,
    pub shipping_address: Option<AddressInput>,
    #[serde(default)]
    pub products: Vec<LineItemInput>,
    pub subtotal: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub shipping_fee: Option<Decimal>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub country: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LineItemInput {
    #[serde(default)]
    pub name: String,
    pub quantity: Option<i64>,
    pub price: Option<Decimal>,
    #[serde(default, alias = "capsuleType")]
    pub variant: Option<String>,
}

/// Input rules that depend on configuration.
pub struct IntakeRules {
    phone: Regex,
    phone_digits: usize,
    default_payment_method: PaymentMethod,
}

impl IntakeRules {
    pub fn new(config: &OrderConfig) -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            phone: Regex::new(&format!(r"^[0-9]{{{}}}$", config.phone_digits))?,
            phone_digits: config.phone_digits,
            default_payment_method: config.default_payment_method,
        })
    }

    /// Checks every field, collecting all failures, and builds the draft.
    pub fn validate(&self, request: CreateOrderRequest) -> std::result::Result<OrderDraft, Vec<FieldError>> {
        let mut errors = Vec::new();
        let mut required = |field: &str, value: String, label: &str| -> String {
            let value = value.trim().to_string();
            if value.is_empty() {
                errors.push(FieldError::new(field, format!("{label} is required")));
            }
            value
        };

        let customer_name = required("customerName", request.customer_name, "Customer name");
        let customer_email = required("customerEmail", request.customer_email, "Email").to_lowercase();
        let customer_phone = required("customerPhone", request.customer_phone, "Phone number");
        let address = request.shipping_address.unwrap_or_default();
        let shipping_address = ShippingAddress {
            street: required("shippingAddress.street", address.street, "Street address"),
            city: required("shippingAddress.city", address.city, "City"),
            state: required("shippingAddress.state", address.state, "State"),
            zip_code: required("shippingAddress.zipCode", address.zip_code, "Zip code"),
            country: required("shippingAddress.country", address.country, "Country"),
        };

        if !customer_name.is_empty() && !NAME_LEN.contains(&customer_name.chars().count()) {
            errors.push(FieldError::new("customerName", "Customer name must be between 2 and 100 characters"));
        }
        if !customer_email.is_empty() && !customer_email.validate_email() {
            errors.push(FieldError::new("customerEmail", "Please provide a valid email"));
        }
        if !customer_phone.is_empty() && !self.phone.is_match(&customer_phone) {
            errors.push(FieldError::new("customerPhone", format!("Phone number must be {} digits", self.phone_digits)));
        }

        if request.products.is_empty() {
            errors.push(FieldError::new("products", "At least one product is required"));
        }
        let mut products = Vec::with_capacity(request.products.len());
        for (i, item) in request.products.into_iter().enumerate() {
            let name = item.name.trim().to_string();
            if name.is_empty() {
                errors.push(FieldError::new(format!("products[{i}].name"), "Product name is required"));
            }
            let quantity = match item.quantity.map(u32::try_from) {
                Some(Ok(q)) if q >= 1 => q,
                _ => {
                    errors.push(FieldError::new(format!("products[{i}].quantity"), "Quantity must be at least 1"));
                    0
                }
            };
            let price = match item.price {
                Some(p) if !p.is_sign_negative() => p,
                _ => {
                    errors.push(FieldError::new(format!("products[{i}].price"), "Price must be a positive number"));
                    Decimal::ZERO
                }
            };
            let variant = item.variant.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
            let item = LineItem { name, quantity, price, variant };
            if item.checked_line_total().is_none() {
                errors.push(FieldError::new(format!("products[{i}].price"), "Price times quantity is too large"));
            }
            products.push(item);
        }

        let mut amount = |field: &str, value: Option<Decimal>, label: &str, mandatory: bool| match value {
            Some(v) if !v.is_sign_negative() => v,
            None if !mandatory => Decimal::ZERO,
            _ => {
                errors.push(FieldError::new(field, format!("{label} must be a positive number")));
                Decimal::ZERO
            }
        };
        let subtotal = amount("subtotal", request.subtotal, "Subtotal", true);
        let tax = amount("tax", request.tax, "Tax", false);
        let shipping_fee = amount("shippingFee", request.shipping_fee, "Shipping fee", false);
        if subtotal.checked_add(tax).and_then(|sum| sum.checked_add(shipping_fee)).is_none() {
            errors.push(FieldError::new("subtotal", "Order total is too large"));
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let (payment_method, coerced) = PaymentMethod::coerce(request.payment_method.as_deref(), self.default_payment_method);
        if coerced {
            tracing::warn!(requested = ?request.payment_method, fallback = %payment_method, "unknown payment method, using default");
        }

        Ok(OrderDraft {
            customer_name,
            customer_email,
            customer_phone,
            shipping_address,
            products,
            subtotal,
            tax,
            shipping_fee,
            payment_method,
            notes: request.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        })
    }
}

#[derive(Clone)]
pub struct OrderIntakeService {
    store: Arc<dyn OrderStore>,
    numbers: OrderNumberGenerator,
    rules: Arc<IntakeRules>,
    notifier: NotificationDispatcher,
    events: EventPublisher,
}

impl OrderIntakeService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        numbers: OrderNumberGenerator,
        rules: IntakeRules,
        notifier: NotificationDispatcher,
        events: EventPublisher,
    ) -> Self {
        Self { store, numbers, rules: Arc::new(rules), notifier, events }
    }

    pub fn notifier(&self) -> &NotificationDispatcher { &self.notifier }

    /// Creates an order and returns it as persisted. Notifications are
    /// scheduled after the insert and never awaited.
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order> {
        let draft = self.rules.validate(request).map_err(AppError::Validation)?;
        match draft.items_total() {
            Some(items_total) if items_total == draft.subtotal => {}
            items_total => tracing::debug!(subtotal = %draft.subtotal, items_total = ?items_total, "client subtotal differs from line items"),
        }

        let order_number = self.numbers.next().await.map_err(|e| {
            tracing::error!(error = %e, "failed to assign order number");
            AppError::Store(e)
        })?;
        let order = Order::place(order_number, draft, Utc::now()).map_err(|e| AppError::validation("products", e.to_string()))?;

        match self.store.insert(&order).await {
            Ok(()) => {}
            Err(StoreError::DuplicateOrderNumber(order_number)) => {
                tracing::warn!(order_number = %order_number, "order number collision");
                return Err(AppError::Conflict { order_number });
            }
            Err(e) => {
                tracing::error!(order_number = %order.order_number, error = %e, "failed to persist order");
                return Err(e.into());
            }
        }

        tracing::info!(
            order_number = %order.order_number,
            email = %order.customer_email,
            total = %order.total_amount,
            "order created"
        );
        self.notifier.dispatch(order.clone());
        self.events.publish(OrderEvent::placed(&order));
        Ok(order)
    }
}
