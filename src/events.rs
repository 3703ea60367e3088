//! Best-effort publishing of order events to NATS

use crate::domain::events::OrderEvent;

#[derive(Clone, Default)]
pub struct EventPublisher {
    client: Option<async_nats::Client>,
    subject_prefix: String,
}

impl EventPublisher {
    /// A publisher that drops every event; used when `NATS_URL` is unset.
    pub fn disabled() -> Self { Self::default() }

    pub async fn connect(url: &str, subject_prefix: impl Into<String>) -> Result<Self, async_nats::ConnectError> {
        let client = async_nats::connect(url).await?;
        Ok(Self { client: Some(client), subject_prefix: subject_prefix.into() })
    }

    pub fn is_enabled(&self) -> bool { self.client.is_some() }

    pub fn subject(&self, event: &OrderEvent) -> String {
        format!("{}.{}", self.subject_prefix, event.kind())
    }

    /// Publishes in the background; failures are logged and dropped.
    pub fn publish(&self, event: OrderEvent) {
        let Some(client) = self.client.clone() else { return };
        let subject = self.subject(&event);
        tokio::spawn(async move {
            let payload = match serde_json::to_vec(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::error!(error = %e, "failed to encode order event");
                    return;
                }
            };
            if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                tracing::warn!(subject = %subject, order_number = %event.order_number(), error = %e, "failed to publish order event");
            }
        });
    }
}
