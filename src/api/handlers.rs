use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use super::AppState;
use crate::application::{CreateOrderRequest, ListOrdersParams, UpdateStatusRequest};
use crate::error::{ApiError, AppError, ErrorBody};
use crate::notifications::NotificationError;

type ApiResult<T> = Result<T, ApiError>;

fn body<T>(s: &AppState, payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload.map(|Json(value)| value).map_err(|e| s.api_error(AppError::validation("body", e.body_text())))
}

pub async fn create_order(State(s): State<AppState>, payload: Result<Json<CreateOrderRequest>, JsonRejection>) -> ApiResult<(StatusCode, Json<Value>)> {
    let request = body(&s, payload)?;
    let order = s.intake.create_order(request).await.map_err(|e| s.api_error(e))?;
    Ok((StatusCode::CREATED, Json(json!({"success": true, "message": "Order created successfully", "order": order}))))
}

pub async fn get_order(State(s): State<AppState>, Path(order_number): Path<String>) -> ApiResult<Json<Value>> {
    let order = s.queries.get_by_number(&order_number).await.map_err(|e| s.api_error(e))?;
    Ok(Json(json!({"success": true, "order": order})))
}

pub async fn list_orders(State(s): State<AppState>, params: Result<Query<ListOrdersParams>, QueryRejection>) -> ApiResult<Json<Value>> {
    let Query(params) = params.map_err(|e| s.api_error(AppError::validation("query", e.body_text())))?;
    let page = s.queries.list_orders(&params).await.map_err(|e| s.api_error(e))?;
    Ok(Json(json!({"success": true, "orders": page.orders, "pagination": page.pagination})))
}

pub async fn update_status(
    State(s): State<AppState>,
    Path(order_number): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let request = body(&s, payload)?;
    let order = s.queries.update_status(&order_number, &request).await.map_err(|e| s.api_error(e))?;
    Ok(Json(json!({"success": true, "message": "Order status updated", "order": order})))
}

pub async fn order_stats(State(s): State<AppState>) -> ApiResult<Json<Value>> {
    let stats = s.queries.get_stats().await.map_err(|e| s.api_error(e))?;
    Ok(Json(json!({"success": true, "stats": stats})))
}

pub async fn test_notification(State(s): State<AppState>) -> ApiResult<Json<Value>> {
    let recipient = s.notifier.send_test_email().await.map_err(|e| match e {
        NotificationError::Disabled => s.api_error(AppError::NotificationsUnavailable),
        other => s.api_error(other),
    })?;
    tracing::info!(recipient = %recipient, "test email sent");
    Ok(Json(json!({"success": true, "message": format!("Test email sent to {recipient}")})))
}

/// Always 200; dependency state is reported in the body.
pub async fn health(State(s): State<AppState>) -> Json<Value> {
    let database = match s.store.ping().await {
        Ok(()) => "up",
        Err(e) => {
            tracing::warn!(error = %e, "health check: store unreachable");
            "down"
        }
    };
    let enabled = |on: bool| if on { "enabled" } else { "disabled" };
    Json(json!({
        "success": true,
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "database": database,
        "notifications": enabled(s.notifier.is_enabled()),
        "events": enabled(s.events.is_enabled()),
        "timestamp": Utc::now(),
    }))
}

pub async fn not_found(uri: Uri) -> impl IntoResponse {
    let body = ErrorBody { success: false, message: format!("Route {} not found", uri.path()), errors: Vec::new(), error: None };
    (StatusCode::NOT_FOUND, Json(body))
}
