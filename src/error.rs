//! Service errors and their HTTP mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::notifications::NotificationError;
use crate::store::StoreError;

/// One failed input constraint, reported back to the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Order number {order_number} was taken by a concurrent order, please retry")]
    Conflict { order_number: String },

    #[error("Order {order_number} not found")]
    NotFound { order_number: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Email notifications are not configured")]
    NotificationsUnavailable,

    #[error("Email delivery failed: {0}")]
    Notification(#[from] NotificationError),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotificationsUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Notification(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Client-facing message. Server-side failures get a generic text; the detail goes in `error`.
    fn public_message(&self) -> String {
        match self {
            Self::Store(_) => "Internal server error".to_string(),
            Self::Notification(_) => "Email delivery failed".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// An [`AppError`] on its way out of a handler, carrying the redaction policy.
#[derive(Debug)]
pub struct ApiError {
    pub error: AppError,
    pub expose_details: bool,
}

impl ApiError {
    pub fn body(&self) -> ErrorBody {
        let detail = match &self.error {
            AppError::Store(e) => Some(e.to_string()),
            AppError::Notification(e) => Some(e.to_string()),
            _ => None,
        };
        ErrorBody {
            success: false,
            message: self.error.public_message(),
            errors: match &self.error { AppError::Validation(errors) => errors.clone(), _ => Vec::new() },
            error: detail.filter(|_| self.expose_details),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.error.status_code().is_server_error() {
            tracing::error!(error = %self.error, "request failed");
        }
        (self.error.status_code(), Json(self.body())).into_response()
    }
}
