use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::entities::booking;
use crate::errors::ServiceError;
use crate::services::bookings::{CreateBookingRequest, RescheduleRequest, Slot};
use crate::{ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelBookingRequest {
    pub reason: String,
}

pub fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/services/:id/slots", get(available_slots))
        .route("/services/:id/bookings", get(service_bookings))
        .route("/bookings", post(create_booking))
        .route("/bookings/mine", get(my_bookings))
        .route("/bookings/:id/cancel", post(cancel_booking))
        .route("/bookings/:id/confirm", post(confirm_booking))
        .route("/bookings/:id/reschedule", put(reschedule_booking))
}

/// Free slots of a service for one day
#[utoipa::path(
    get,
    path = "/api/v1/services/{id}/slots",
    responses(
        (status = 200, description = "Slots with remaining capacity"),
        (status = 400, description = "Item is not a bookable service"),
        (status = 404, description = "Unknown service")
    ),
    tag = "Bookings"
)]
pub async fn available_slots(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<ApiResponse<Vec<Slot>>>, ServiceError> {
    let slots = state
        .services
        .bookings
        .get_available_slots(auth.tenant_id, id, query.date)
        .await?;
    Ok(Json(ApiResponse::success(slots)))
}

/// A service's bookings over a date range (staff only)
#[utoipa::path(
    get,
    path = "/api/v1/services/{id}/bookings",
    responses(
        (status = 200, description = "Bookings in the range"),
        (status = 403, description = "Caller is not staff")
    ),
    tag = "Bookings"
)]
pub async fn service_bookings(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<ApiResponse<Vec<booking::Model>>>, ServiceError> {
    auth.require_staff()?;
    let bookings = state
        .services
        .bookings
        .service_bookings(auth.tenant_id, id, query.from, query.to)
        .await?;
    Ok(Json(ApiResponse::success(bookings)))
}

/// Book a service slot outside any order
#[utoipa::path(
    post,
    path = "/api/v1/bookings",
    responses(
        (status = 201, description = "Booking created"),
        (status = 400, description = "Outside the service's calendar"),
        (status = 409, description = "Slot is fully booked")
    ),
    tag = "Bookings"
)]
pub async fn create_booking(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<booking::Model>>), ServiceError> {
    let model = state.services.bookings.create_booking(&auth, req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(model))))
}

/// The calling customer's bookings
#[utoipa::path(
    get,
    path = "/api/v1/bookings/mine",
    responses((status = 200, description = "The caller's bookings")),
    tag = "Bookings"
)]
pub async fn my_bookings(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<booking::Model>>>, ServiceError> {
    let bookings = state
        .services
        .bookings
        .my_bookings(auth.tenant_id, auth.user_id)
        .await?;
    Ok(Json(ApiResponse::success(bookings)))
}

/// Cancel an active booking
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/cancel",
    responses(
        (status = 200, description = "Booking cancelled"),
        (status = 404, description = "Unknown booking"),
        (status = 409, description = "Booking already closed")
    ),
    tag = "Bookings"
)]
pub async fn cancel_booking(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelBookingRequest>,
) -> Result<Json<ApiResponse<booking::Model>>, ServiceError> {
    let current = booking_for_caller(&state, &auth, id).await?;
    let model = state
        .services
        .bookings
        .cancel_booking(auth.tenant_id, current.id, &req.reason)
        .await?;
    Ok(Json(ApiResponse::success(model)))
}

/// Confirm a pending booking (staff only)
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/confirm",
    responses(
        (status = 200, description = "Booking confirmed"),
        (status = 403, description = "Caller is not staff"),
        (status = 409, description = "Booking is not pending")
    ),
    tag = "Bookings"
)]
pub async fn confirm_booking(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<booking::Model>>, ServiceError> {
    auth.require_staff()?;
    let model = state
        .services
        .bookings
        .confirm_booking(auth.tenant_id, id)
        .await?;
    Ok(Json(ApiResponse::success(model)))
}

/// Move a booking to a new slot, keeping the same row
#[utoipa::path(
    put,
    path = "/api/v1/bookings/{id}/reschedule",
    responses(
        (status = 200, description = "Booking rescheduled"),
        (status = 400, description = "Outside the service's calendar"),
        (status = 409, description = "Target slot is fully booked")
    ),
    tag = "Bookings"
)]
pub async fn reschedule_booking(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<RescheduleRequest>,
) -> Result<Json<ApiResponse<booking::Model>>, ServiceError> {
    let current = booking_for_caller(&state, &auth, id).await?;
    let model = state
        .services
        .bookings
        .reschedule_booking(auth.tenant_id, current.id, req)
        .await?;
    Ok(Json(ApiResponse::success(model)))
}

/// Customers may only touch their own bookings; staff any in the tenant.
async fn booking_for_caller(
    state: &AppState,
    auth: &AuthUser,
    booking_id: Uuid,
) -> Result<booking::Model, ServiceError> {
    use sea_orm::EntityTrait;

    let model = booking::Entity::find_by_id(booking_id)
        .one(&*state.db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("booking {} not found", booking_id)))?;
    if model.tenant_id != auth.tenant_id {
        return Err(ServiceError::Forbidden(
            "booking belongs to another tenant".to_string(),
        ));
    }
    if !auth.is_staff() && model.user_id != auth.user_id {
        return Err(ServiceError::Forbidden(
            "booking belongs to another customer".to_string(),
        ));
    }
    Ok(model)
}
