//! Email bodies rendered with tera

use rust_decimal::Decimal;
use serde::Serialize;
use tera::{Context, Tera};

use super::{Email, NotificationError};
use crate::domain::aggregates::Order;

const CUSTOMER_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Order Confirmation</title></head>
<body style="font-family: Arial, sans-serif; color: #333; max-width: 600px; margin: 0 auto;">
  <h1 style="background: #dc2626; color: #fff; padding: 16px; text-align: center;">Thank you for your order!</h1>
  <p>Hi {{ customer_name }}, we have received your order and will let you know when it ships.</p>
  <h2>Order {{ order_number }}</h2>
  <table style="width: 100%; border-collapse: collapse;">
    <tr><th align="left">Product</th><th>Qty</th><th align="right">Price</th><th align="right">Total</th></tr>
    {% for item in items %}
    <tr>
      <td>{{ item.name }}{% if item.variant %} ({{ item.variant }}){% endif %}</td>
      <td align="center">{{ item.quantity }}</td>
      <td align="right">{{ item.price }}</td>
      <td align="right">{{ item.line_total }}</td>
    </tr>
    {% endfor %}
  </table>
  <p>Subtotal: {{ subtotal }}<br>Tax: {{ tax }}<br>Shipping: {{ shipping_fee }}<br><strong>Total: {{ total_amount }}</strong></p>
  <p><strong>Shipping to:</strong> {{ address }}</p>
  <p><strong>Payment method:</strong> {{ payment_method }}<br>
     <strong>Order status:</strong> {{ order_status }}<br>
     <strong>Payment status:</strong> {{ payment_status }}</p>
  <p style="color: #666; font-size: 12px;">{{ store_name }}</p>
</body>
</html>
"#;

const CUSTOMER_TEXT: &str = r#"Thank you for your order, {{ customer_name }}!

Order number: {{ order_number }}
{% for item in items %}
- {{ item.name }}{% if item.variant %} ({{ item.variant }}){% endif %} x {{ item.quantity }} @ {{ item.price }} = {{ item.line_total }}{% endfor %}

Subtotal: {{ subtotal }}
Tax: {{ tax }}
Shipping: {{ shipping_fee }}
Total: {{ total_amount }}

Shipping to: {{ address }}
Payment method: {{ payment_method }}
Order status: {{ order_status }}
Payment status: {{ payment_status }}

{{ store_name }}
"#;

const ADMIN_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>New Order</title></head>
<body style="font-family: Arial, sans-serif; color: #333; max-width: 600px; margin: 0 auto;">
  <h1>New order {{ order_number }}</h1>
  <p><strong>{{ total_amount }}</strong> for {{ item_count }} item(s), paid by {{ payment_method }}.</p>
  <h2>Customer</h2>
  <p>{{ customer_name }}<br>{{ customer_email }}<br>{{ customer_phone }}<br>{{ address }}</p>
  <h2>Items</h2>
  <ul>
    {% for item in items %}<li>{{ item.name }}{% if item.variant %} ({{ item.variant }}){% endif %} x {{ item.quantity }} = {{ item.line_total }}</li>{% endfor %}
  </ul>
  {% if notes %}<p><strong>Notes:</strong> {{ notes }}</p>{% endif %}
  <p><strong>Action:</strong> confirm payment ({{ payment_status }}) and move the order out of {{ order_status }}.</p>
  <p style="color: #666; font-size: 12px;">Placed {{ created_at }}</p>
</body>
</html>
"#;

const ADMIN_TEXT: &str = r#"New order {{ order_number }}

Total: {{ total_amount }} ({{ item_count }} item(s), {{ payment_method }})
Customer: {{ customer_name }} <{{ customer_email }}>, {{ customer_phone }}
Ship to: {{ address }}
{% for item in items %}
- {{ item.name }}{% if item.variant %} ({{ item.variant }}){% endif %} x {{ item.quantity }} = {{ item.line_total }}{% endfor %}
{% if notes %}
Notes: {{ notes }}
{% endif %}
Action: confirm payment ({{ payment_status }}) and move the order out of {{ order_status }}.
Placed {{ created_at }}
"#;

#[derive(Serialize)]
struct ItemView {
    name: String,
    variant: Option<String>,
    quantity: u32,
    price: String,
    line_total: String,
}

#[derive(Serialize)]
struct OrderView {
    store_name: String,
    order_number: String,
    customer_name: String,
    customer_email: String,
    customer_phone: String,
    address: String,
    items: Vec<ItemView>,
    item_count: u32,
    subtotal: String,
    tax: String,
    shipping_fee: String,
    total_amount: String,
    payment_method: &'static str,
    payment_status: &'static str,
    order_status: &'static str,
    notes: Option<String>,
    created_at: String,
}

pub struct EmailTemplates {
    tera: Tera,
    store_name: String,
    currency_symbol: String,
}

impl EmailTemplates {
    pub fn new(store_name: impl Into<String>, currency_symbol: impl Into<String>) -> Result<Self, NotificationError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("customer.html", CUSTOMER_HTML),
            ("customer.txt", CUSTOMER_TEXT),
            ("admin.html", ADMIN_HTML),
            ("admin.txt", ADMIN_TEXT),
        ])?;
        Ok(Self { tera, store_name: store_name.into(), currency_symbol: currency_symbol.into() })
    }

    pub fn money(&self, amount: Decimal) -> String {
        format!("{}{:.2}", self.currency_symbol, amount.round_dp(2))
    }

    fn view(&self, order: &Order) -> OrderView {
        OrderView {
            store_name: self.store_name.clone(),
            order_number: order.order_number.to_string(),
            customer_name: order.customer_name.clone(),
            customer_email: order.customer_email.clone(),
            customer_phone: order.customer_phone.clone(),
            address: order.shipping_address.one_line(),
            items: order
                .products
                .iter()
                .map(|item| ItemView {
                    name: item.name.clone(),
                    variant: item.variant.clone(),
                    quantity: item.quantity,
                    price: self.money(item.price),
                    line_total: self.money(item.line_total()),
                })
                .collect(),
            item_count: order.item_count(),
            subtotal: self.money(order.subtotal),
            tax: self.money(order.tax),
            shipping_fee: self.money(order.shipping_fee),
            total_amount: self.money(order.total_amount),
            payment_method: order.payment_method.label(),
            payment_status: order.payment_status.as_str(),
            order_status: order.order_status.as_str(),
            notes: order.notes.clone(),
            created_at: order.created_at.format("%Y-%m-%d %H:%M UTC").to_string(),
        }
    }

    fn render(&self, name: &str, to: &str, subject: String, order: &Order) -> Result<Email, NotificationError> {
        let context = Context::from_serialize(self.view(order))?;
        Ok(Email {
            to: to.to_string(),
            subject,
            text: self.tera.render(&format!("{name}.txt"), &context)?,
            html: self.tera.render(&format!("{name}.html"), &context)?,
        })
    }

    pub fn customer_confirmation(&self, order: &Order) -> Result<Email, NotificationError> {
        let subject = format!("Order Confirmation - {}", order.order_number);
        self.render("customer", &order.customer_email, subject, order)
    }

    pub fn admin_alert(&self, order: &Order, admin_email: &str) -> Result<Email, NotificationError> {
        let subject = format!("New Order {} - {} from {}", order.order_number, self.money(order.total_amount), order.customer_name);
        self.render("admin", admin_email, subject, order)
    }

    pub fn test_message(&self, admin_email: &str) -> Result<Email, NotificationError> {
        let body = format!("This is a test message from {}. Email notifications are working.", self.store_name);
        Ok(Email {
            to: admin_email.to_string(),
            subject: format!("{} email test", self.store_name),
            html: format!("<p>{body}</p>"),
            text: body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::order::tests::draft;
    use crate::domain::value_objects::OrderNumber;
    use chrono::Utc;

    fn templates() -> EmailTemplates {
        EmailTemplates::new("Order Desk", "₹").unwrap()
    }

    fn order() -> Order {
        let mut d = draft();
        d.notes = Some("Leave at <gate>".into());
        Order::place(OrderNumber::from_stored("TRB2501010001"), d, Utc::now()).unwrap()
    }

    #[test]
    fn test_customer_email_itemizes_products() {
        let email = templates().customer_confirmation(&order()).unwrap();
        assert_eq!(email.to, "asha@example.com");
        assert_eq!(email.subject, "Order Confirmation - TRB2501010001");
        assert!(email.text.contains("Booster (60 caps) x 2 @ ₹500.00 = ₹1000.00"));
        assert!(email.text.contains("Total: ₹1080.00"));
        assert!(email.html.contains("TRB2501010001"));
        assert!(email.html.contains("UPI"));
    }

    #[test]
    fn test_admin_email_escapes_html() {
        let email = templates().admin_alert(&order(), "admin@example.com").unwrap();
        assert_eq!(email.to, "admin@example.com");
        assert!(email.subject.contains("₹1080.00"));
        assert!(email.html.contains("Leave at &lt;gate&gt;"));
        assert!(email.text.contains("Leave at <gate>"));
        assert!(email.text.contains("9876543210"));
    }

    #[test]
    fn test_money_formatting() {
        let t = templates();
        assert_eq!(t.money(Decimal::new(5, 1)), "₹0.50");
        assert_eq!(t.money(Decimal::new(1080, 0)), "₹1080.00");
    }
}
