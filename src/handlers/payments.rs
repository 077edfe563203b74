use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::entities::payment;
use crate::errors::ServiceError;
use crate::services::payments::{CreatePaymentRequest, UploadReceiptRequest};
use crate::{ApiResponse, AppState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectPaymentRequest {
    pub reason: String,
}

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/payments", post(create_payment))
        .route("/payments/pending", get(pending_payments))
        .route("/payments/:id/receipt", post(upload_receipt))
        .route("/payments/:id/approve", post(approve_payment))
        .route("/payments/:id/reject", post(reject_payment))
}

/// Create the payment for an order; gateway methods return a checkout link
#[utoipa::path(
    post,
    path = "/api/v1/payments",
    responses(
        (status = 201, description = "Payment created"),
        (status = 404, description = "Unknown order"),
        (status = 409, description = "Order already has a payment"),
        (status = 502, description = "Gateway intent creation failed")
    ),
    tag = "Payments"
)]
pub async fn create_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<payment::Model>>), ServiceError> {
    let model = state
        .services
        .payments
        .create_payment(auth.tenant_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(model))))
}

/// Open payments awaiting review (staff only)
#[utoipa::path(
    get,
    path = "/api/v1/payments/pending",
    responses(
        (status = 200, description = "Pending and processing payments"),
        (status = 403, description = "Caller is not staff")
    ),
    tag = "Payments"
)]
pub async fn pending_payments(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<payment::Model>>>, ServiceError> {
    auth.require_staff()?;
    let models = state.services.payments.pending_payments(auth.tenant_id).await?;
    Ok(Json(ApiResponse::success(models)))
}

/// Attach a transfer/cash receipt to a pending payment
#[utoipa::path(
    post,
    path = "/api/v1/payments/{id}/receipt",
    responses(
        (status = 200, description = "Receipt recorded"),
        (status = 404, description = "Unknown payment"),
        (status = 409, description = "Payment is not pending")
    ),
    tag = "Payments"
)]
pub async fn upload_receipt(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UploadReceiptRequest>,
) -> Result<Json<ApiResponse<payment::Model>>, ServiceError> {
    let model = state
        .services
        .payments
        .upload_receipt(auth.tenant_id, id, req)
        .await?;
    Ok(Json(ApiResponse::success(model)))
}

/// Approve a payment; the order and its bookings confirm with it (staff only)
#[utoipa::path(
    post,
    path = "/api/v1/payments/{id}/approve",
    responses(
        (status = 200, description = "Payment approved"),
        (status = 403, description = "Caller is not staff"),
        (status = 409, description = "Payment is not open")
    ),
    tag = "Payments"
)]
pub async fn approve_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<payment::Model>>, ServiceError> {
    auth.require_staff()?;
    let model = state
        .services
        .payments
        .approve_payment(auth.tenant_id, id)
        .await?;
    Ok(Json(ApiResponse::success(model)))
}

/// Reject a payment; the order is cancelled and stock restored (staff only)
#[utoipa::path(
    post,
    path = "/api/v1/payments/{id}/reject",
    responses(
        (status = 200, description = "Payment rejected"),
        (status = 403, description = "Caller is not staff"),
        (status = 409, description = "Payment is not open")
    ),
    tag = "Payments"
)]
pub async fn reject_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectPaymentRequest>,
) -> Result<Json<ApiResponse<payment::Model>>, ServiceError> {
    auth.require_staff()?;
    let model = state
        .services
        .payments
        .reject_payment(auth.tenant_id, id, &req.reason)
        .await?;
    Ok(Json(ApiResponse::success(model)))
}
