use chrono::{NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::{item, product, service_item};
use crate::errors::ServiceError;
use crate::models::{
    parse_status, parse_weekdays, weekdays_to_csv, CatalogItem, CatalogKind, ItemKind, ProductType,
};

/// An item row joined with its subtype row.
#[derive(Debug, Clone)]
pub struct ItemRecord {
    pub item: item::Model,
    pub kind: CatalogKind,
}

impl ItemRecord {
    pub fn to_catalog_item(&self) -> CatalogItem {
        CatalogItem {
            id: self.item.id,
            tenant_id: self.item.tenant_id,
            name: self.item.name.clone(),
            price: self.item.price,
            kind: self.kind.clone(),
        }
    }
}

/// Subtype payload for item creation and updates.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemKindInput {
    Product {
        product_type: ProductType,
        stock: i32,
    },
    Service {
        duration_minutes: i32,
        max_capacity: i32,
        requires_booking: bool,
        /// Weekday names, e.g. ["mon", "wed", "fri"]
        available_days: Vec<String>,
        work_start: NaiveTime,
        work_end: NaiveTime,
        slot_interval_minutes: Option<i32>,
    },
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateItemRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub category: Option<String>,
    #[serde(flatten)]
    pub kind: ItemKindInput,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateItemRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub category: Option<String>,
    pub active: Option<bool>,
    /// Replaces the subtype configuration; must match the item's kind.
    pub kind: Option<ItemKindInput>,
}

/// Resolves catalog items with their subtype rows and owns staff-side
/// item maintenance. Price changes only affect future orders; checkout
/// snapshots name and price onto the order line.
#[derive(Clone)]
pub struct CatalogService {
    db_pool: Arc<DbPool>,
}

impl CatalogService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Loads an item with its subtype on any connection, so checkout can
    /// resolve lines inside its own transaction.
    pub async fn resolve<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        item_id: Uuid,
    ) -> Result<CatalogItem, ServiceError> {
        let record = Self::load_record(conn, tenant_id, item_id).await?;
        if !record.item.active {
            return Err(ServiceError::Validation(format!(
                "'{}' is no longer available",
                record.item.name
            )));
        }
        Ok(record.to_catalog_item())
    }

    async fn load_record<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        item_id: Uuid,
    ) -> Result<ItemRecord, ServiceError> {
        let item = item::Entity::find_by_id(item_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("item {} not found", item_id)))?;

        if item.tenant_id != tenant_id {
            warn!(
                %item_id,
                requesting_tenant = %tenant_id,
                owning_tenant = %item.tenant_id,
                "Cross-tenant item access rejected"
            );
            return Err(ServiceError::Forbidden(
                "item belongs to another tenant".to_string(),
            ));
        }

        let kind = match parse_status::<ItemKind>(&item.kind, "item kind")? {
            ItemKind::Product => {
                let row = product::Entity::find_by_id(item.id)
                    .one(conn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("product row for item {} not found", item.id))
                    })?;
                CatalogKind::Product {
                    product_type: parse_status(&row.product_type, "product type")?,
                    stock: row.stock,
                }
            }
            ItemKind::Service => {
                let row = service_item::Entity::find_by_id(item.id)
                    .one(conn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("service row for item {} not found", item.id))
                    })?;
                CatalogKind::Service {
                    duration_minutes: row.duration_minutes,
                    max_capacity: row.max_capacity,
                    requires_booking: row.requires_booking,
                    available_days: parse_weekdays(&row.available_days)?,
                    work_start: row.work_start,
                    work_end: row.work_end,
                    slot_interval_minutes: row.slot_interval_minutes,
                }
            }
        };

        Ok(ItemRecord { item, kind })
    }

    #[instrument(skip(self))]
    pub async fn get_item(&self, tenant_id: Uuid, item_id: Uuid) -> Result<ItemRecord, ServiceError> {
        Self::load_record(&*self.db_pool, tenant_id, item_id).await
    }

    /// Lists a tenant's active items with their subtype rows.
    #[instrument(skip(self))]
    pub async fn list_items(&self, tenant_id: Uuid) -> Result<Vec<ItemRecord>, ServiceError> {
        let items = item::Entity::find()
            .filter(item::Column::TenantId.eq(tenant_id))
            .filter(item::Column::Active.eq(true))
            .order_by_asc(item::Column::Name)
            .all(&*self.db_pool)
            .await?;

        let mut records = Vec::with_capacity(items.len());
        for it in items {
            records.push(Self::load_record(&*self.db_pool, tenant_id, it.id).await?);
        }
        Ok(records)
    }

    #[instrument(skip(self, req))]
    pub async fn create_item(
        &self,
        tenant_id: Uuid,
        req: CreateItemRequest,
    ) -> Result<ItemRecord, ServiceError> {
        req.validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;
        validate_kind_input(&req.kind)?;

        let item_id = Uuid::new_v4();
        let kind_str = match req.kind {
            ItemKindInput::Product { .. } => ItemKind::Product,
            ItemKindInput::Service { .. } => ItemKind::Service,
        }
        .to_string();

        let txn = self.db_pool.begin().await?;

        let item = item::ActiveModel {
            id: Set(item_id),
            tenant_id: Set(tenant_id),
            name: Set(req.name),
            description: Set(req.description),
            price: Set(req.price),
            category: Set(req.category),
            kind: Set(kind_str),
            active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await?;

        match req.kind {
            ItemKindInput::Product {
                product_type,
                stock,
            } => {
                product::ActiveModel {
                    item_id: Set(item_id),
                    product_type: Set(product_type.to_string()),
                    stock: Set(stock),
                }
                .insert(&txn)
                .await?;
            }
            ItemKindInput::Service {
                duration_minutes,
                max_capacity,
                requires_booking,
                ref available_days,
                work_start,
                work_end,
                slot_interval_minutes,
            } => {
                let days = parse_days_input(available_days)?;
                service_item::ActiveModel {
                    item_id: Set(item_id),
                    duration_minutes: Set(duration_minutes),
                    max_capacity: Set(max_capacity),
                    requires_booking: Set(requires_booking),
                    available_days: Set(days),
                    work_start: Set(work_start),
                    work_end: Set(work_end),
                    slot_interval_minutes: Set(slot_interval_minutes),
                }
                .insert(&txn)
                .await?;
            }
        }

        txn.commit().await?;
        self.get_item(tenant_id, item.id).await
    }

    #[instrument(skip(self, req))]
    pub async fn update_item(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
        req: UpdateItemRequest,
    ) -> Result<ItemRecord, ServiceError> {
        req.validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        let txn = self.db_pool.begin().await?;
        let record = Self::load_record(&txn, tenant_id, item_id).await?;

        let mut active: item::ActiveModel = record.item.clone().into();
        if let Some(name) = req.name {
            active.name = Set(name);
        }
        if let Some(description) = req.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = req.price {
            active.price = Set(price);
        }
        if let Some(category) = req.category {
            active.category = Set(Some(category));
        }
        if let Some(is_active) = req.active {
            active.active = Set(is_active);
        }
        active.updated_at = Set(Some(Utc::now()));
        active.update(&txn).await?;

        if let Some(kind_input) = req.kind {
            validate_kind_input(&kind_input)?;
            match (&record.kind, kind_input) {
                (
                    CatalogKind::Product { .. },
                    ItemKindInput::Product {
                        product_type,
                        stock,
                    },
                ) => {
                    let mut row: product::ActiveModel = product::Entity::find_by_id(item_id)
                        .one(&txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "product row for item {} not found",
                                item_id
                            ))
                        })?
                        .into();
                    row.product_type = Set(product_type.to_string());
                    row.stock = Set(stock);
                    row.update(&txn).await?;
                }
                (
                    CatalogKind::Service { .. },
                    ItemKindInput::Service {
                        duration_minutes,
                        max_capacity,
                        requires_booking,
                        available_days,
                        work_start,
                        work_end,
                        slot_interval_minutes,
                    },
                ) => {
                    let mut row: service_item::ActiveModel = service_item::Entity::find_by_id(
                        item_id,
                    )
                    .one(&txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("service row for item {} not found", item_id))
                    })?
                    .into();
                    row.duration_minutes = Set(duration_minutes);
                    row.max_capacity = Set(max_capacity);
                    row.requires_booking = Set(requires_booking);
                    row.available_days = Set(parse_days_input(&available_days)?);
                    row.work_start = Set(work_start);
                    row.work_end = Set(work_end);
                    row.slot_interval_minutes = Set(slot_interval_minutes);
                    row.update(&txn).await?;
                }
                _ => {
                    return Err(ServiceError::InvalidOperation(
                        "item kind cannot be changed".to_string(),
                    ));
                }
            }
        }

        txn.commit().await?;
        self.get_item(tenant_id, item_id).await
    }

    /// Soft delete; past order lines keep their snapshots.
    #[instrument(skip(self))]
    pub async fn deactivate_item(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
    ) -> Result<(), ServiceError> {
        let record = Self::load_record(&*self.db_pool, tenant_id, item_id).await?;
        let mut active: item::ActiveModel = record.item.into();
        active.active = Set(false);
        active.updated_at = Set(Some(Utc::now()));
        active.update(&*self.db_pool).await?;
        Ok(())
    }
}

fn validate_kind_input(input: &ItemKindInput) -> Result<(), ServiceError> {
    match input {
        ItemKindInput::Product { stock, .. } => {
            if *stock < 0 {
                return Err(ServiceError::Validation(
                    "stock cannot be negative".to_string(),
                ));
            }
        }
        ItemKindInput::Service {
            duration_minutes,
            max_capacity,
            work_start,
            work_end,
            slot_interval_minutes,
            ..
        } => {
            if *duration_minutes <= 0 {
                return Err(ServiceError::Validation(
                    "duration_minutes must be positive".to_string(),
                ));
            }
            if *max_capacity <= 0 {
                return Err(ServiceError::Validation(
                    "max_capacity must be positive".to_string(),
                ));
            }
            if work_end <= work_start {
                return Err(ServiceError::Validation(
                    "work_end must be after work_start".to_string(),
                ));
            }
            if let Some(interval) = slot_interval_minutes {
                if *interval <= 0 {
                    return Err(ServiceError::Validation(
                        "slot_interval_minutes must be positive".to_string(),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn parse_days_input(days: &[String]) -> Result<String, ServiceError> {
    if days.is_empty() {
        return Err(ServiceError::Validation(
            "available_days cannot be empty".to_string(),
        ));
    }
    let parsed = parse_weekdays(&days.join(","))
        .map_err(|_| ServiceError::Validation("unrecognized weekday name".to_string()))?;
    Ok(weekdays_to_csv(&parsed))
}
