//! Order intake HTTP server

use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use order_intake::config::{Config, DatabaseConfig};
use order_intake::events::EventPublisher;
use order_intake::notifications::{EmailTemplates, Mailer, NotificationDispatcher, SmtpMailer};
use order_intake::store::{InMemoryOrderStore, OrderStore, PgOrderStore};
use order_intake::{router, AppState};

async fn notifier(config: &Config) -> Result<NotificationDispatcher> {
    let templates = EmailTemplates::new(config.store_name.clone(), config.currency_symbol.clone())?;
    let Some(email) = &config.email else {
        tracing::warn!("EMAIL_USER/EMAIL_PASS not set, order emails are disabled");
        return Ok(NotificationDispatcher::disabled(templates));
    };
    let mailer = match SmtpMailer::new(email) {
        Ok(mailer) => mailer,
        Err(e) => {
            tracing::error!(error = %e, "invalid email configuration, order emails are disabled");
            return Ok(NotificationDispatcher::disabled(templates));
        }
    };
    if let Err(e) = mailer.verify().await {
        tracing::error!(host = %email.host, port = email.port, error = %e, "SMTP verification failed, order emails are disabled");
        return Ok(NotificationDispatcher::disabled(templates));
    }
    tracing::info!(host = %email.host, port = email.port, admin = %email.admin, "SMTP transport ready");
    Ok(NotificationDispatcher::new(Arc::new(mailer), templates, email.admin.clone())
        .with_delay(config.notification_delay)
        .with_send_timeout(email.timeout))
}

async fn events(config: &Config) -> EventPublisher {
    let Some(url) = &config.nats_url else { return EventPublisher::disabled() };
    match EventPublisher::connect(url, config.nats_subject_prefix.clone()).await {
        Ok(publisher) => {
            tracing::info!(url = %url, "connected to NATS");
            publisher
        }
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "NATS unavailable, order events are disabled");
            EventPublisher::disabled()
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    let config = Config::from_env()?;

    let store: Arc<dyn OrderStore> = match &config.database {
        DatabaseConfig::Postgres { url, max_connections, acquire_timeout } => {
            Arc::new(PgOrderStore::connect(url, *max_connections, *acquire_timeout).await?)
        }
        DatabaseConfig::InMemory => {
            tracing::warn!("using the in-memory store, orders will not survive a restart");
            Arc::new(InMemoryOrderStore::new())
        }
    };
    let state = AppState::assemble(store, notifier(&config).await?, events(&config).await, &config)?;
    let app = router(state, &config.cors_origins);

    let addr = config.bind_addr();
    tracing::info!(addr = %addr, production = config.production, "order intake listening");
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
