//! SMTP mailer backed by a pooled lettre transport

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::PoolConfig;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{Email, Mailer, NotificationError};
use crate::config::EmailConfig;

/// Port that speaks TLS from the first byte; every other port upgrades with STARTTLS.
const IMPLICIT_TLS_PORT: u16 = 465;

/// One transport per process; connections are pooled and reused across orders.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

fn mailbox(address: &str) -> Result<Mailbox, NotificationError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| NotificationError::Address { address: address.to_string(), reason: e.to_string() })
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self, NotificationError> {
        let builder = if config.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| NotificationError::Transport(e.to_string()))?;

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(config.username.clone(), config.password.clone()))
            .timeout(Some(config.timeout))
            .pool_config(PoolConfig::new().max_size(config.pool_size))
            .build();

        Ok(Self { transport, from: mailbox(&config.from)? })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<(), NotificationError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(mailbox(&email.to)?)
            .subject(email.subject.clone())
            .multipart(MultiPart::alternative_plain_html(email.text.clone(), email.html.clone()))
            .map_err(|e| NotificationError::Message(e.to_string()))?;
        self.transport.send(message).await.map_err(|e| NotificationError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn verify(&self) -> Result<(), NotificationError> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(NotificationError::Transport("server did not accept the connection test".into())),
            Err(e) => Err(NotificationError::Transport(e.to_string())),
        }
    }
}
