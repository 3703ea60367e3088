//! Environment configuration

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::application::numbering::SequenceStrategy;
use crate::domain::value_objects::PaymentMethod;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value `{value}`")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub production: bool,
    pub cors_origins: Vec<String>,
    pub database: DatabaseConfig,
    pub orders: OrderConfig,
    pub email: Option<EmailConfig>,
    pub notification_delay: Duration,
    pub store_name: String,
    pub currency_symbol: String,
    pub nats_url: Option<String>,
    pub nats_subject_prefix: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DatabaseConfig {
    Postgres { url: String, max_connections: u32, acquire_timeout: Duration },
    /// `DATABASE_URL=memory:`; data lives only as long as the process.
    InMemory,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderConfig {
    pub number_prefix: String,
    pub sequence_strategy: SequenceStrategy,
    pub phone_digits: usize,
    pub default_payment_method: PaymentMethod,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub admin: String,
    pub timeout: Duration,
    pub pool_size: u32,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            number_prefix: "TRB".into(),
            sequence_strategy: SequenceStrategy::DailyCounter,
            phone_digits: 10,
            default_payment_method: PaymentMethod::CreditCard,
        }
    }
}

struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
        }
    }
}

impl Config {
    /// Reads the process environment (after `.env` has been loaded by the caller).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_map(vars: &HashMap<&str, &str>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env { lookup };

        let database_url = env.get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let database = if database_url.starts_with("memory:") {
            DatabaseConfig::InMemory
        } else {
            DatabaseConfig::Postgres {
                url: database_url,
                max_connections: env.parse("DB_MAX_CONNECTIONS", 10)?,
                acquire_timeout: Duration::from_secs(env.parse("DB_ACQUIRE_TIMEOUT_SECS", 10)?),
            }
        };

        let orders = OrderConfig {
            number_prefix: env.or("ORDER_NUMBER_PREFIX", "TRB"),
            sequence_strategy: env.parse("ORDER_SEQUENCE_STRATEGY", SequenceStrategy::DailyCounter)?,
            phone_digits: env.parse("PHONE_DIGITS", 10)?,
            default_payment_method: env.parse("DEFAULT_PAYMENT_METHOD", PaymentMethod::CreditCard)?,
        };
        if orders.phone_digits == 0 {
            return Err(ConfigError::Invalid { key: "PHONE_DIGITS", value: "0".into() });
        }

        // Email stays off unless both credentials are present.
        let email = match (env.get("EMAIL_USER"), env.get("EMAIL_PASS")) {
            (Some(username), Some(password)) => Some(EmailConfig {
                host: env.or("EMAIL_HOST", "smtp.gmail.com"),
                port: env.parse("EMAIL_PORT", 587)?,
                from: env.get("EMAIL_FROM").unwrap_or_else(|| username.clone()),
                admin: env.get("EMAIL_ADMIN").unwrap_or_else(|| username.clone()),
                timeout: Duration::from_secs(env.parse("EMAIL_TIMEOUT_SECS", 15)?),
                pool_size: env.parse("EMAIL_POOL_SIZE", 4)?,
                username,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            host: env.or("HOST", "0.0.0.0"),
            port: env.parse("PORT", 4500)?,
            production: env.or("APP_ENV", "development").eq_ignore_ascii_case("production"),
            cors_origins: env
                .get("CORS_ORIGINS")
                .map(|v| v.split(',').map(|o| o.trim().to_string()).filter(|o| !o.is_empty()).collect())
                .unwrap_or_default(),
            database,
            orders,
            email,
            notification_delay: Duration::from_millis(env.parse("NOTIFICATION_DELAY_MS", 0)?),
            store_name: env.or("STORE_NAME", "Order Desk"),
            currency_symbol: env.or("CURRENCY_SYMBOL", "₹"),
            nats_url: env.get("NATS_URL"),
            nats_subject_prefix: env.or("NATS_SUBJECT_PREFIX", "orders"),
        })
    }

    pub fn bind_addr(&self) -> String { format!("{}:{}", self.host, self.port) }
}
