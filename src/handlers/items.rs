use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use chrono::NaiveTime;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::models::{weekdays_to_csv, CatalogKind};
use crate::services::catalog::{CreateItemRequest, ItemRecord, UpdateItemRequest};
use crate::{ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub struct ProductInfo {
    pub product_type: String,
    pub stock: i32,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub duration_minutes: i32,
    pub max_capacity: i32,
    pub requires_booking: bool,
    pub available_days: Vec<String>,
    pub work_start: NaiveTime,
    pub work_end: NaiveTime,
    pub slot_interval_minutes: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub category: Option<String>,
    pub kind: String,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceInfo>,
}

impl From<ItemRecord> for ItemResponse {
    fn from(record: ItemRecord) -> Self {
        let (product, service) = match &record.kind {
            CatalogKind::Product {
                product_type,
                stock,
            } => (
                Some(ProductInfo {
                    product_type: product_type.to_string(),
                    stock: *stock,
                }),
                None,
            ),
            CatalogKind::Service {
                duration_minutes,
                max_capacity,
                requires_booking,
                available_days,
                work_start,
                work_end,
                slot_interval_minutes,
            } => (
                None,
                Some(ServiceInfo {
                    duration_minutes: *duration_minutes,
                    max_capacity: *max_capacity,
                    requires_booking: *requires_booking,
                    available_days: weekdays_to_csv(available_days)
                        .split(',')
                        .map(str::to_string)
                        .collect(),
                    work_start: *work_start,
                    work_end: *work_end,
                    slot_interval_minutes: *slot_interval_minutes,
                }),
            ),
        };

        Self {
            id: record.item.id,
            name: record.item.name,
            description: record.item.description,
            price: record.item.price,
            category: record.item.category,
            kind: record.item.kind,
            active: record.item.active,
            product,
            service,
        }
    }
}

pub fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_items))
        .route("/items", post(create_item))
        .route("/items/:id", get(get_item))
        .route("/items/:id", put(update_item))
        .route("/items/:id", delete(deactivate_item))
}

/// List the tenant's active catalog items
#[utoipa::path(
    get,
    path = "/api/v1/items",
    responses(
        (status = 200, description = "Active items for the tenant"),
        (status = 401, description = "Missing identity headers")
    ),
    tag = "Catalog"
)]
pub async fn list_items(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<ItemResponse>>>, ServiceError> {
    let records = state.services.catalog.list_items(auth.tenant_id).await?;
    let items = records.into_iter().map(ItemResponse::from).collect();
    Ok(Json(ApiResponse::success(items)))
}

/// Fetch one item with its subtype details
#[utoipa::path(
    get,
    path = "/api/v1/items/{id}",
    responses(
        (status = 200, description = "Item detail"),
        (status = 403, description = "Item belongs to another tenant"),
        (status = 404, description = "Unknown item")
    ),
    tag = "Catalog"
)]
pub async fn get_item(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ItemResponse>>, ServiceError> {
    let record = state.services.catalog.get_item(auth.tenant_id, id).await?;
    Ok(Json(ApiResponse::success(record.into())))
}

/// Create a catalog item (staff only)
#[utoipa::path(
    post,
    path = "/api/v1/items",
    responses(
        (status = 201, description = "Item created"),
        (status = 400, description = "Invalid item payload"),
        (status = 403, description = "Caller is not staff")
    ),
    tag = "Catalog"
)]
pub async fn create_item(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ItemResponse>>), ServiceError> {
    auth.require_staff()?;
    let record = state
        .services
        .catalog
        .create_item(auth.tenant_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(record.into()))))
}

/// Update a catalog item (staff only)
#[utoipa::path(
    put,
    path = "/api/v1/items/{id}",
    responses(
        (status = 200, description = "Item updated"),
        (status = 400, description = "Invalid update payload"),
        (status = 403, description = "Caller is not staff"),
        (status = 404, description = "Unknown item")
    ),
    tag = "Catalog"
)]
pub async fn update_item(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<ApiResponse<ItemResponse>>, ServiceError> {
    auth.require_staff()?;
    let record = state
        .services
        .catalog
        .update_item(auth.tenant_id, id, req)
        .await?;
    Ok(Json(ApiResponse::success(record.into())))
}

/// Deactivate a catalog item (staff only, soft delete)
#[utoipa::path(
    delete,
    path = "/api/v1/items/{id}",
    responses(
        (status = 200, description = "Item deactivated"),
        (status = 403, description = "Caller is not staff"),
        (status = 404, description = "Unknown item")
    ),
    tag = "Catalog"
)]
pub async fn deactivate_item(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    auth.require_staff()?;
    state
        .services
        .catalog
        .deactivate_item(auth.tenant_id, id)
        .await?;
    Ok(Json(ApiResponse::success(())))
}
