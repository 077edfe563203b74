use chrono::{NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::entities::{booking, order, order_item, user};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{parse_status, CatalogItem, CatalogKind, OrderStatus, PaymentMethod};
use crate::services::bookings::BookingService;
use crate::services::catalog::CatalogService;
use crate::services::inventory::{InventoryService, StockLine};
use crate::services::shipping::ShippingRates;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckoutLine {
    pub item_id: Uuid,
    pub quantity: i32,
    /// Required for services that take bookings
    pub booking_date: Option<NaiveDate>,
    pub booking_time: Option<NaiveTime>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DeliveryRequest {
    pub address: String,
    pub postal_code: String,
    /// A method previously quoted to the client; re-priced server-side
    pub shipping_method_id: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutLine>,
    pub payment_method: Option<PaymentMethod>,
    pub notes: Option<String>,
    pub delivery: Option<DeliveryRequest>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

/// An order with its line items and any bookings created by checkout.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub bookings: Vec<booking::Model>,
}

/// A resolved checkout line, ready to be written.
struct ResolvedLine {
    catalog: CatalogItem,
    quantity: i32,
    booking_date: Option<NaiveDate>,
    booking_time: Option<NaiveTime>,
}

impl ResolvedLine {
    fn line_total(&self) -> Decimal {
        self.catalog.price * Decimal::from(self.quantity)
    }

    /// Snapshot value for the order line's `item_type` column. Cancel
    /// restores stock for "physical" lines only.
    fn item_type(&self) -> &'static str {
        match self.catalog.kind {
            CatalogKind::Product { product_type, .. } => match product_type {
                crate::models::ProductType::Physical => "physical",
                crate::models::ProductType::Digital => "digital",
            },
            CatalogKind::Service { .. } => "service",
        }
    }
}

/// The order aggregate. Checkout, cancellation, and the fulfilment
/// status machine all run as single transactions over orders, lines,
/// stock, and bookings.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    shipping: Arc<dyn ShippingRates>,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: EventSender,
        shipping: Arc<dyn ShippingRates>,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            shipping,
        }
    }

    /// Places an order. All-or-nothing: every line is resolved and
    /// validated (stock levels, booking windows, delivery method) before
    /// the first decrement, and any later failure rolls the whole
    /// transaction back.
    #[instrument(skip(self, auth, req), fields(tenant_id = %auth.tenant_id, user_id = %auth.user_id))]
    pub async fn checkout(
        &self,
        auth: &AuthUser,
        req: CheckoutRequest,
    ) -> Result<OrderDetail, ServiceError> {
        if req.items.is_empty() {
            return Err(ServiceError::Validation("order has no items".to_string()));
        }
        for line in &req.items {
            if line.quantity <= 0 {
                return Err(ServiceError::Validation(
                    "quantity must be positive".to_string(),
                ));
            }
        }

        let txn = self.db_pool.begin().await?;
        let tenant_row = crate::services::require_active_tenant(&txn, auth.tenant_id).await?;

        // Resolve every line and pre-validate booking inputs
        let mut resolved = Vec::with_capacity(req.items.len());
        for line in &req.items {
            let catalog = CatalogService::resolve(&txn, auth.tenant_id, line.item_id).await?;

            if let CatalogKind::Service {
                requires_booking, ..
            } = catalog.kind
            {
                if requires_booking {
                    let (date, time) = match (line.booking_date, line.booking_time) {
                        (Some(d), Some(t)) => (d, t),
                        _ => {
                            return Err(ServiceError::Validation(format!(
                                "'{}' requires a booking date and time",
                                catalog.name
                            )))
                        }
                    };
                    BookingService::validate_booking_window(&catalog, date, time)?;
                }
            }

            resolved.push(ResolvedLine {
                catalog,
                quantity: line.quantity,
                booking_date: line.booking_date,
                booking_time: line.booking_time,
            });
        }

        // Pre-validate every stock line before any decrement
        let stock_lines: Vec<StockLine> = resolved
            .iter()
            .filter(|line| line.catalog.consumes_stock())
            .map(|line| StockLine {
                item_id: line.catalog.id,
                item_name: line.catalog.name.clone(),
                quantity: line.quantity,
            })
            .collect();
        InventoryService::check_available(&txn, &stock_lines).await?;

        for stock_line in &stock_lines {
            InventoryService::reserve(&txn, stock_line).await?;
        }

        let subtotal: Decimal = resolved.iter().map(|l| l.line_total()).sum();

        // Delivery: re-price the selected shipping method server-side
        let (is_delivery, delivery_address, delivery_cost, delivery_notes, shipping_method_id) =
            match &req.delivery {
                Some(delivery) => {
                    let origin_zip = tenant_row.postal_code.clone().unwrap_or_default();
                    let options = self
                        .shipping
                        .quote(&origin_zip, &delivery.postal_code, subtotal)
                        .await?;
                    let option = options
                        .into_iter()
                        .find(|o| o.method_id == delivery.shipping_method_id)
                        .ok_or_else(|| {
                            ServiceError::Validation(format!(
                                "shipping method {} is not available",
                                delivery.shipping_method_id
                            ))
                        })?;
                    (
                        true,
                        Some(delivery.address.clone()),
                        option.cost,
                        delivery.notes.clone(),
                        Some(option.method_id),
                    )
                }
                None => (false, None, Decimal::ZERO, None, None),
            };

        let total = subtotal + delivery_cost;
        let order_id = Uuid::new_v4();

        let order_model = order::ActiveModel {
            id: Set(order_id),
            tenant_id: Set(auth.tenant_id),
            user_id: Set(auth.user_id),
            status: Set(OrderStatus::Pending.to_string()),
            total: Set(total),
            payment_method: Set(req.payment_method.map(|m| m.to_string())),
            notes: Set(req.notes.clone()),
            is_delivery: Set(is_delivery),
            delivery_address: Set(delivery_address),
            delivery_cost: Set(delivery_cost),
            delivery_notes: Set(delivery_notes),
            shipping_method_id: Set(shipping_method_id),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
            version: Set(1),
        }
        .insert(&txn)
        .await?;

        let customer_name = user::Entity::find_by_id(auth.user_id)
            .one(&txn)
            .await?
            .map(|u| u.name)
            .unwrap_or_else(|| auth.email.clone());

        let mut items = Vec::with_capacity(resolved.len());
        let mut bookings = Vec::new();
        for line in &resolved {
            let order_item_model = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                item_id: Set(line.catalog.id),
                item_name: Set(line.catalog.name.clone()),
                item_type: Set(line.item_type().to_string()),
                quantity: Set(line.quantity),
                unit_price: Set(line.catalog.price),
                booking_date: Set(line.booking_date),
                booking_time: Set(line.booking_time),
                created_at: Set(Utc::now()),
            }
            .insert(&txn)
            .await?;

            // One booking per quantity unit, capacity re-checked on each
            if let CatalogKind::Service {
                requires_booking: true,
                ..
            } = line.catalog.kind
            {
                let date = line.booking_date.ok_or_else(|| {
                    ServiceError::Validation("booking date missing".to_string())
                })?;
                let time = line.booking_time.ok_or_else(|| {
                    ServiceError::Validation("booking time missing".to_string())
                })?;
                for _ in 0..line.quantity {
                    let booked = BookingService::reserve(
                        &txn,
                        auth.tenant_id,
                        auth.user_id,
                        &customer_name,
                        &auth.email,
                        &line.catalog,
                        date,
                        time,
                        Some(order_id),
                        Some(order_item_model.id),
                        None,
                    )
                    .await?;
                    bookings.push(booked);
                }
            }

            items.push(order_item_model);
        }

        txn.commit().await?;

        info!(%order_id, %total, "Order placed");
        self.event_sender.send(Event::OrderCreated(order_id)).await;
        for stock_line in &stock_lines {
            self.event_sender
                .send(Event::StockReserved {
                    item_id: stock_line.item_id,
                    quantity: stock_line.quantity,
                    order_id,
                })
                .await;
        }

        Ok(OrderDetail {
            order: order_model,
            items,
            bookings,
        })
    }

    async fn load_order<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        order_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        let model = order::Entity::find_by_id(order_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))?;
        if model.tenant_id != tenant_id {
            return Err(ServiceError::Forbidden(
                "order belongs to another tenant".to_string(),
            ));
        }
        Ok(model)
    }

    /// The cancellation core, on the caller's connection: restores stock
    /// for physical lines, cancels any active bookings, and records the
    /// reason. Returns the released (item, quantity) pairs so the caller
    /// can emit events after commit.
    pub async fn cancel_within<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        order_id: Uuid,
        reason: &str,
    ) -> Result<Vec<(Uuid, i32)>, ServiceError> {
        let model = Self::load_order(conn, tenant_id, order_id).await?;
        let status: OrderStatus = parse_status(&model.status, "order")?;
        if !status.is_cancellable() {
            return Err(ServiceError::InvalidStatus(format!(
                "order {} is {} and cannot be cancelled",
                order_id, status
            )));
        }

        let lines = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(conn)
            .await?;

        let mut released = Vec::new();
        for line in &lines {
            if line.item_type == "physical" {
                InventoryService::release(conn, line.item_id, line.quantity).await?;
                released.push((line.item_id, line.quantity));
            }
        }

        BookingService::cancel_for_order(conn, order_id, reason).await?;

        let version = model.version;
        let notes = model.notes.clone();
        let mut active: order::ActiveModel = model.into();
        active.status = Set(OrderStatus::Cancelled.to_string());
        active.notes = Set(Some(match notes {
            Some(n) if !n.is_empty() => format!("{}\nCancellation: {}", n, reason),
            _ => format!("Cancellation: {}", reason),
        }));
        active.version = Set(version + 1);
        active.update(conn).await?;

        Ok(released)
    }

    /// Cancels a Pending or Confirmed order in its own transaction.
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        reason: &str,
    ) -> Result<OrderDetail, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let released = Self::cancel_within(&txn, tenant_id, order_id, reason).await?;
        txn.commit().await?;

        info!(%order_id, "Order cancelled");
        self.event_sender.send(Event::OrderCancelled(order_id)).await;
        for (item_id, quantity) in released {
            self.event_sender
                .send(Event::StockReleased {
                    item_id,
                    quantity,
                    order_id,
                })
                .await;
        }

        self.get_order(tenant_id, order_id).await
    }

    /// Drives the fulfilment machine: Pending -> Confirmed -> Preparing
    /// -> Ready -> Completed. Cancellation goes through `cancel_order`
    /// so stock and bookings are restored.
    #[instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        if new_status == OrderStatus::Cancelled {
            return Err(ServiceError::InvalidOperation(
                "use the cancel operation to cancel an order".to_string(),
            ));
        }

        let model = Self::load_order(&*self.db_pool, tenant_id, order_id).await?;
        let current: OrderStatus = parse_status(&model.status, "order")?;
        if !current.can_transition_to(new_status) {
            return Err(ServiceError::InvalidStatus(format!(
                "order {} cannot move from {} to {}",
                order_id, current, new_status
            )));
        }

        let version = model.version;
        let mut active: order::ActiveModel = model.into();
        active.status = Set(new_status.to_string());
        active.version = Set(version + 1);
        let updated = active.update(&*self.db_pool).await?;

        self.event_sender
            .send(Event::OrderStatusChanged {
                order_id,
                old_status: current.to_string(),
                new_status: new_status.to_string(),
            })
            .await;
        Ok(updated)
    }

    /// Confirms a Pending order from the payment-approval cascade,
    /// inside the caller's transaction.
    pub async fn confirm_for_payment<C: ConnectionTrait>(
        conn: &C,
        order_id: Uuid,
    ) -> Result<(), ServiceError> {
        let model = order::Entity::find_by_id(order_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))?;
        let current: OrderStatus = parse_status(&model.status, "order")?;
        if current == OrderStatus::Confirmed {
            return Ok(());
        }
        if !current.can_transition_to(OrderStatus::Confirmed) {
            return Err(ServiceError::InvalidStatus(format!(
                "order {} cannot move from {} to confirmed",
                order_id, current
            )));
        }

        let version = model.version;
        let mut active: order::ActiveModel = model.into();
        active.status = Set(OrderStatus::Confirmed.to_string());
        active.version = Set(version + 1);
        active.update(conn).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderDetail, ServiceError> {
        let model = Self::load_order(&*self.db_pool, tenant_id, order_id).await?;
        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db_pool)
            .await?;
        let bookings = booking::Entity::find()
            .filter(booking::Column::OrderId.eq(order_id))
            .all(&*self.db_pool)
            .await?;
        Ok(OrderDetail {
            order: model,
            items,
            bookings,
        })
    }

    /// Staff listing, newest first. Returns the page and the total
    /// number of orders.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        tenant_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let paginator = order::Entity::find()
            .filter(order::Column::TenantId.eq(tenant_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db_pool, per_page.max(1));
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((models, total))
    }

    #[instrument(skip(self))]
    pub async fn my_orders(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<order::Model>, ServiceError> {
        let models = order::Entity::find()
            .filter(order::Column::TenantId.eq(tenant_id))
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?;
        Ok(models)
    }
}
