use actix_web::error::JsonPayloadError;
use actix_web::http::Method;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::errors::ApiError;
use crate::auth::AuthenticatedUser;
use crate::domain::order::{ChangeStatus, CreateOrder, OrderCommandHandler, OrderError, OrderItem};
use crate::health::{ComponentHealth, HealthStatus};
use crate::metrics::Metrics;

// ============================================================================
// Request Payloads
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
    /// Optional optimistic-concurrency guard.
    #[serde(default)]
    pub version: Option<i64>,
}

fn parse_order_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("Invalid order ID".to_string()))
}

/// Count the failure, then hand it to the error boundary.
fn failed(metrics: &Metrics, operation: &str, error: OrderError) -> ApiError {
    metrics.record_failure(operation, error.kind());
    error.into()
}

/// Error handler for request bodies the JSON extractor cannot read. Counted
/// as a validation failure of the operation the route serves.
pub fn reject_body(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    let operation = if req.method() == Method::POST {
        "create order"
    } else {
        "update order"
    };

    if let Some(metrics) = req.app_data::<web::Data<Metrics>>() {
        metrics.record_failure(operation, "validation");
    }
    tracing::debug!(path = %req.path(), error = %err, "Rejected request body");

    ApiError::BadRequest(err.to_string()).into()
}

// ============================================================================
// Order Handlers
// ============================================================================

pub async fn create_order(
    user: AuthenticatedUser,
    body: web::Json<CreateOrderRequest>,
    orders: web::Data<OrderCommandHandler>,
    metrics: web::Data<Metrics>,
) -> Result<HttpResponse, ApiError> {
    let command = CreateOrder {
        owner_id: user.user_id,
        items: body.into_inner().items,
    };

    let order = orders
        .create(command)
        .await
        .map_err(|e| failed(&metrics, "create order", e))?;

    metrics.record_order_created();
    Ok(HttpResponse::Created().json(order))
}

pub async fn get_order(
    user: AuthenticatedUser,
    path: web::Path<String>,
    orders: web::Data<OrderCommandHandler>,
    metrics: web::Data<Metrics>,
) -> Result<HttpResponse, ApiError> {
    let order_id = parse_order_id(&path)?;

    let order = orders
        .get(&user.user_id, order_id)
        .await
        .map_err(|e| failed(&metrics, "get order", e))?;

    Ok(HttpResponse::Ok().json(order))
}

pub async fn get_user_orders(
    user: AuthenticatedUser,
    path: web::Path<String>,
    orders: web::Data<OrderCommandHandler>,
    metrics: web::Data<Metrics>,
) -> Result<HttpResponse, ApiError> {
    let owner_id = path.into_inner();

    let list = orders
        .list_for_owner(&user.user_id, &owner_id)
        .await
        .map_err(|e| failed(&metrics, "get orders", e))?;

    Ok(HttpResponse::Ok().json(list))
}

pub async fn update_order_status(
    user: AuthenticatedUser,
    path: web::Path<String>,
    body: web::Json<UpdateOrderStatusRequest>,
    orders: web::Data<OrderCommandHandler>,
    metrics: web::Data<Metrics>,
) -> Result<HttpResponse, ApiError> {
    let order_id = parse_order_id(&path)?;
    let UpdateOrderStatusRequest { status, version } = body.into_inner();

    tracing::debug!(
        order_id = %order_id,
        requested_by = %user.user_id,
        status = %status,
        "Status change requested"
    );

    let change = orders
        .change_status(ChangeStatus {
            order_id,
            status,
            expected_version: version,
        })
        .await
        .map_err(|e| failed(&metrics, "update order", e))?;

    metrics.record_transition(change.from.as_str(), change.to.as_str());

    Ok(HttpResponse::Ok().json(json!({
        "message": "Order status updated successfully",
        "status": change.to,
        "version": change.new_version,
    })))
}

// ============================================================================
// Operational Handlers
// ============================================================================

pub async fn health(
    orders: web::Data<OrderCommandHandler>,
    metrics: web::Data<Metrics>,
) -> HttpResponse {
    let status = match orders.check_store().await {
        Ok(()) => HealthStatus::Healthy,
        Err(e) => {
            tracing::error!(error = %e, "Database ping failed");
            HealthStatus::Unhealthy(e.to_string())
        }
    };

    metrics.set_store_up(status.is_healthy());
    let health = ComponentHealth::new("database", status);

    if health.status.is_healthy() {
        HttpResponse::Ok().json(health.to_report())
    } else {
        HttpResponse::ServiceUnavailable().json(health.to_report())
    }
}

pub async fn metrics_handler(metrics: web::Data<Metrics>) -> HttpResponse {
    match metrics.encode() {
        Ok(buffer) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(buffer),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}
