//! HTTP surface: routes, shared state and middleware

use axum::http::{HeaderValue, Method};
use axum::routing::{get, patch, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::application::{IntakeRules, OrderIntakeService, OrderNumberGenerator, OrderQueryService};
use crate::config::Config;
use crate::error::{ApiError, AppError};
use crate::events::EventPublisher;
use crate::notifications::NotificationDispatcher;
use crate::store::OrderStore;

mod handlers;

#[derive(Clone)]
pub struct AppState {
    pub intake: OrderIntakeService,
    pub queries: OrderQueryService,
    pub store: Arc<dyn OrderStore>,
    pub notifier: NotificationDispatcher,
    pub events: EventPublisher,
    /// Hides error details from responses.
    pub production: bool,
}

impl AppState {
    /// Wires the services over the given store, notifier and publisher.
    pub fn assemble(
        store: Arc<dyn OrderStore>,
        notifier: NotificationDispatcher,
        events: EventPublisher,
        config: &Config,
    ) -> Result<Self, regex::Error> {
        let numbers = OrderNumberGenerator::new(store.clone(), config.orders.number_prefix.clone(), config.orders.sequence_strategy);
        let rules = IntakeRules::new(&config.orders)?;
        Ok(Self {
            intake: OrderIntakeService::new(store.clone(), numbers, rules, notifier.clone(), events.clone()),
            queries: OrderQueryService::new(store.clone(), events.clone()),
            store,
            notifier,
            events,
            production: config.production,
        })
    }

    pub fn api_error(&self, error: impl Into<AppError>) -> ApiError {
        ApiError { error: error.into(), expose_details: !self.production }
    }
}

fn cors(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::OPTIONS])
        .allow_headers(Any)
}

pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/orders", get(handlers::list_orders).post(handlers::create_order))
        .route("/api/orders/stats", get(handlers::order_stats))
        .route("/api/orders/:order_number", get(handlers::get_order))
        .route("/api/orders/:order_number/status", patch(handlers::update_status).put(handlers::update_status))
        .route("/api/orders/test-email", get(handlers::test_notification))
        .route("/api/notifications/test", post(handlers::test_notification))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors(cors_origins))
        .with_state(state)
}
