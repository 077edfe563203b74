use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::entities::order;
use crate::errors::ServiceError;
use crate::services::orders::{CheckoutRequest, OrderDetail, UpdateOrderStatusRequest};
use crate::{ApiResponse, AppState, ListQuery, PaginatedResponse};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    pub reason: String,
}

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(checkout))
        .route("/orders", get(list_orders))
        .route("/orders/mine", get(my_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/orders/:id/status", put(update_order_status))
}

/// Place an order: stock, bookings, and delivery settle atomically
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    responses(
        (status = 201, description = "Order placed"),
        (status = 400, description = "Invalid lines or booking window"),
        (status = 409, description = "Insufficient stock or fully booked slot")
    ),
    tag = "Orders"
)]
pub async fn checkout(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderDetail>>), ServiceError> {
    let detail = state.services.orders.checkout(&auth, req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(detail))))
}

/// List the tenant's orders, newest first (staff only)
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    responses(
        (status = 200, description = "Paginated orders"),
        (status = 403, description = "Caller is not staff")
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<order::Model>>>, ServiceError> {
    auth.require_staff()?;
    let (items, total) = state
        .services
        .orders
        .list_orders(auth.tenant_id, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, &query,
    ))))
}

/// List the calling customer's own orders
#[utoipa::path(
    get,
    path = "/api/v1/orders/mine",
    responses((status = 200, description = "The caller's orders")),
    tag = "Orders"
)]
pub async fn my_orders(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<order::Model>>>, ServiceError> {
    let orders = state
        .services
        .orders
        .my_orders(auth.tenant_id, auth.user_id)
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// Fetch an order with its lines and bookings
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    responses(
        (status = 200, description = "Order detail"),
        (status = 403, description = "Order belongs to another tenant"),
        (status = 404, description = "Unknown order")
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderDetail>>, ServiceError> {
    let detail = state.services.orders.get_order(auth.tenant_id, id).await?;

    // Customers see only their own orders; staff see all of the tenant's
    if !auth.is_staff() && detail.order.user_id != auth.user_id {
        return Err(ServiceError::Forbidden(
            "order belongs to another customer".to_string(),
        ));
    }
    Ok(Json(ApiResponse::success(detail)))
}

/// Cancel an order, restoring stock and cancelling its bookings
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    responses(
        (status = 200, description = "Order cancelled"),
        (status = 404, description = "Unknown order"),
        (status = 409, description = "Order is past cancellation")
    ),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelOrderRequest>,
) -> Result<Json<ApiResponse<OrderDetail>>, ServiceError> {
    let current = state.services.orders.get_order(auth.tenant_id, id).await?;
    if !auth.is_staff() && current.order.user_id != auth.user_id {
        return Err(ServiceError::Forbidden(
            "order belongs to another customer".to_string(),
        ));
    }

    let detail = state
        .services
        .orders
        .cancel_order(auth.tenant_id, id, &req.reason)
        .await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// Advance an order through the fulfilment machine (staff only)
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    responses(
        (status = 200, description = "Status updated"),
        (status = 403, description = "Caller is not staff"),
        (status = 409, description = "Illegal transition")
    ),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<order::Model>>, ServiceError> {
    auth.require_staff()?;
    let updated = state
        .services
        .orders
        .update_order_status(auth.tenant_id, id, req.status)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}
