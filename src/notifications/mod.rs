//! Order notification emails
//!
//! The [`NotificationDispatcher`] runs in its own tokio task once an order is
//! persisted. Every failure is logged and dropped: nothing here can reach the
//! response of the request that created the order.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::domain::aggregates::Order;

pub mod smtp;
pub mod templates;

pub use smtp::SmtpMailer;
pub use templates::EmailTemplates;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("notifications are disabled")]
    Disabled,

    #[error("invalid address `{address}`: {reason}")]
    Address { address: String, reason: String },

    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("could not build message: {0}")]
    Message(String),

    #[error("smtp transport error: {0}")]
    Transport(String),

    #[error("send timed out after {0:?}")]
    Timeout(Duration),
}

/// A rendered message ready for the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), NotificationError>;

    /// Checks that the server is reachable and accepts our credentials.
    async fn verify(&self) -> Result<(), NotificationError> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery { Sent, Failed, Skipped }

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchReport { pub customer: Delivery, pub admin: Delivery }

#[derive(Clone)]
pub struct NotificationDispatcher {
    mailer: Option<Arc<dyn Mailer>>,
    templates: Arc<EmailTemplates>,
    admin_email: String,
    delay: Duration,
    send_timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(mailer: Arc<dyn Mailer>, templates: EmailTemplates, admin_email: impl Into<String>) -> Self {
        Self {
            mailer: Some(mailer),
            templates: Arc::new(templates),
            admin_email: admin_email.into(),
            delay: Duration::ZERO,
            send_timeout: Duration::from_secs(30),
        }
    }

    /// A dispatcher that logs and skips every notification.
    pub fn disabled(templates: EmailTemplates) -> Self {
        Self { mailer: None, templates: Arc::new(templates), admin_email: String::new(), delay: Duration::ZERO, send_timeout: Duration::ZERO }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn is_enabled(&self) -> bool { self.mailer.is_some() }

    /// Fires the notifications for `order` without waiting for them.
    pub fn dispatch(&self, order: Order) -> JoinHandle<DispatchReport> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.deliver(&order).await })
    }

    /// Sends both emails concurrently; each outcome is independent of the other.
    pub async fn deliver(&self, order: &Order) -> DispatchReport {
        let Some(mailer) = self.mailer.as_deref() else {
            tracing::info!(order_number = %order.order_number, "notifications unavailable, skipping order emails");
            return DispatchReport { customer: Delivery::Skipped, admin: Delivery::Skipped };
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let (customer, admin) = tokio::join!(
            self.send(mailer, "customer", order, self.templates.customer_confirmation(order)),
            self.send(mailer, "admin", order, self.templates.admin_alert(order, &self.admin_email)),
        );
        DispatchReport { customer, admin }
    }

    async fn send(&self, mailer: &dyn Mailer, kind: &'static str, order: &Order, email: Result<Email, NotificationError>) -> Delivery {
        let result = match email {
            Ok(email) => {
                let sent = tokio::time::timeout(self.send_timeout, mailer.send(&email)).await;
                match sent {
                    Ok(result) => result.map(|()| email.to),
                    Err(_) => Err(NotificationError::Timeout(self.send_timeout)),
                }
            }
            Err(e) => Err(e),
        };
        match result {
            Ok(recipient) => {
                tracing::info!(order_number = %order.order_number, kind, recipient = %recipient, "order email sent");
                Delivery::Sent
            }
            Err(e) => {
                tracing::error!(order_number = %order.order_number, kind, error = %e, "order email failed");
                Delivery::Failed
            }
        }
    }

    /// Sends a diagnostic message to the admin address and reports the outcome.
    pub async fn send_test_email(&self) -> Result<String, NotificationError> {
        let mailer = self.mailer.as_deref().ok_or(NotificationError::Disabled)?;
        let email = self.templates.test_message(&self.admin_email)?;
        tokio::time::timeout(self.send_timeout, mailer.send(&email))
            .await
            .map_err(|_| NotificationError::Timeout(self.send_timeout))??;
        Ok(email.to)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::aggregates::order::tests::draft;
    use crate::domain::value_objects::OrderNumber;
    use chrono::Utc;
    use std::sync::Mutex;

    /// Records every message; fails the ones addressed to `fail_for`.
    #[derive(Default)]
    pub(crate) struct RecordingMailer {
        pub sent: Mutex<Vec<Email>>,
        pub fail_for: Option<String>,
    }

    impl RecordingMailer {
        pub(crate) fn failing_for(address: &str) -> Self {
            Self { sent: Mutex::default(), fail_for: Some(address.to_string()) }
        }

        pub(crate) fn recipients(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|e| e.to.clone()).collect()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &Email) -> Result<(), NotificationError> {
            self.sent.lock().unwrap().push(email.clone());
            match &self.fail_for {
                Some(addr) if addr == "*" || *addr == email.to => Err(NotificationError::Transport("connection refused".into())),
                _ => Ok(()),
            }
        }
    }

    struct StalledMailer;

    #[async_trait]
    impl Mailer for StalledMailer {
        async fn send(&self, _email: &Email) -> Result<(), NotificationError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    pub(crate) fn templates() -> EmailTemplates {
        EmailTemplates::new("Order Desk", "₹").unwrap()
    }

    fn order() -> Order {
        Order::place(OrderNumber::from_stored("TRB2501010001"), draft(), Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_each_email_attempted_once() {
        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher = NotificationDispatcher::new(mailer.clone(), templates(), "admin@example.com");
        let report = dispatcher.dispatch(order()).await.unwrap();
        assert_eq!(report, DispatchReport { customer: Delivery::Sent, admin: Delivery::Sent });
        let mut recipients = mailer.recipients();
        recipients.sort();
        assert_eq!(recipients, vec!["admin@example.com", "asha@example.com"]);
    }

    #[tokio::test]
    async fn test_customer_failure_does_not_block_admin() {
        let mailer = Arc::new(RecordingMailer::failing_for("asha@example.com"));
        let dispatcher = NotificationDispatcher::new(mailer.clone(), templates(), "admin@example.com");
        let report = dispatcher.deliver(&order()).await;
        assert_eq!(report, DispatchReport { customer: Delivery::Failed, admin: Delivery::Sent });
        assert_eq!(mailer.recipients().len(), 2);
    }

    #[tokio::test]
    async fn test_disabled_dispatcher_skips() {
        let dispatcher = NotificationDispatcher::disabled(templates());
        assert!(!dispatcher.is_enabled());
        let report = dispatcher.deliver(&order()).await;
        assert_eq!(report, DispatchReport { customer: Delivery::Skipped, admin: Delivery::Skipped });
        assert!(matches!(dispatcher.send_test_email().await, Err(NotificationError::Disabled)));
    }

    #[tokio::test]
    async fn test_stalled_transport_times_out() {
        let dispatcher = NotificationDispatcher::new(Arc::new(StalledMailer), templates(), "admin@example.com")
            .with_send_timeout(Duration::from_millis(20));
        let report = dispatcher.deliver(&order()).await;
        assert_eq!(report, DispatchReport { customer: Delivery::Failed, admin: Delivery::Failed });
    }

    #[tokio::test]
    async fn test_send_test_email_goes_to_admin() {
        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher = NotificationDispatcher::new(mailer.clone(), templates(), "admin@example.com");
        assert_eq!(dispatcher.send_test_email().await.unwrap(), "admin@example.com");
        assert_eq!(mailer.recipients(), vec!["admin@example.com"]);
    }
}
