use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{order, order_item, payment};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{parse_status, OrderStatus, PaymentMethod, PaymentStatus};
use crate::services::bookings::BookingService;
use crate::services::gateway::{CheckoutPreference, PaymentGateway, PreferenceItem};
use crate::services::orders::OrderService;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreatePaymentRequest {
    pub order_id: Uuid,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UploadReceiptRequest {
    pub receipt_url: String,
    pub notes: Option<String>,
}

/// Payment ledger plus the webhook reconciler. Terminal transitions
/// cascade to the order and its bookings in the same transaction.
#[derive(Clone)]
pub struct PaymentService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    gateway: Arc<dyn PaymentGateway>,
    /// Policy: whether a gateway rejection also cancels the order,
    /// releasing its stock, or leaves it open for a payment retry.
    cancel_order_on_rejection: bool,
}

impl PaymentService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: EventSender,
        gateway: Arc<dyn PaymentGateway>,
        cancel_order_on_rejection: bool,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            gateway,
            cancel_order_on_rejection,
        }
    }

    /// Creates the order's payment. For gateway methods the external
    /// intent is created first; if that call fails nothing is persisted
    /// and the client may retry.
    #[instrument(skip(self))]
    pub async fn create_payment(
        &self,
        tenant_id: Uuid,
        req: CreatePaymentRequest,
    ) -> Result<payment::Model, ServiceError> {
        crate::services::require_active_tenant(&*self.db_pool, tenant_id).await?;
        let order_model = order::Entity::find_by_id(req.order_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", req.order_id)))?;
        if order_model.tenant_id != tenant_id {
            return Err(ServiceError::Forbidden(
                "order belongs to another tenant".to_string(),
            ));
        }

        let order_status: OrderStatus = parse_status(&order_model.status, "order")?;
        if order_status != OrderStatus::Pending {
            return Err(ServiceError::InvalidOperation(format!(
                "order {} is {} and cannot take a payment",
                req.order_id, order_status
            )));
        }

        let existing = payment::Entity::find()
            .filter(payment::Column::OrderId.eq(req.order_id))
            .one(&*self.db_pool)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "order {} already has a payment",
                req.order_id
            )));
        }

        let (external_id, payment_link) = if req.method.is_gateway() {
            let preference = self.build_preference(&order_model).await?;
            let created = self.gateway.create_preference(preference).await?;
            (Some(created.id), Some(created.init_point))
        } else {
            (None, None)
        };

        let model = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(req.order_id),
            tenant_id: Set(tenant_id),
            method: Set(req.method.to_string()),
            status: Set(PaymentStatus::Pending.to_string()),
            amount: Set(order_model.total),
            external_id: Set(external_id),
            external_status: Set(None),
            payment_link: Set(payment_link),
            receipt_url: Set(None),
            receipt_notes: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
            confirmed_at: Set(None),
        }
        .insert(&*self.db_pool)
        .await?;

        self.event_sender.send(Event::PaymentCreated(model.id)).await;
        Ok(model)
    }

    /// Each order line becomes a preference line; delivery rides as an
    /// extra line so the gateway total matches the order total.
    async fn build_preference(
        &self,
        order_model: &order::Model,
    ) -> Result<CheckoutPreference, ServiceError> {
        let lines = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_model.id))
            .all(&*self.db_pool)
            .await?;

        let mut items: Vec<PreferenceItem> = lines
            .into_iter()
            .map(|line| PreferenceItem {
                title: line.item_name,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();
        if order_model.delivery_cost > Decimal::ZERO {
            items.push(PreferenceItem {
                title: "Delivery".to_string(),
                quantity: 1,
                unit_price: order_model.delivery_cost,
            });
        }

        Ok(CheckoutPreference {
            external_reference: order_model.id.to_string(),
            items,
        })
    }

    async fn load_payment<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        payment_id: Uuid,
    ) -> Result<payment::Model, ServiceError> {
        let model = payment::Entity::find_by_id(payment_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("payment {} not found", payment_id)))?;
        if model.tenant_id != tenant_id {
            return Err(ServiceError::Forbidden(
                "payment belongs to another tenant".to_string(),
            ));
        }
        Ok(model)
    }

    /// Attaches a manual payment's proof. Receipts only make sense while
    /// the payment is still Pending.
    #[instrument(skip(self, req))]
    pub async fn upload_receipt(
        &self,
        tenant_id: Uuid,
        payment_id: Uuid,
        req: UploadReceiptRequest,
    ) -> Result<payment::Model, ServiceError> {
        let model = Self::load_payment(&*self.db_pool, tenant_id, payment_id).await?;
        let status: PaymentStatus = parse_status(&model.status, "payment")?;
        if status != PaymentStatus::Pending {
            return Err(ServiceError::InvalidStatus(format!(
                "payment {} is {} and cannot take a receipt",
                payment_id, status
            )));
        }

        let mut active: payment::ActiveModel = model.into();
        active.receipt_url = Set(Some(req.receipt_url));
        active.receipt_notes = Set(req.notes);
        let updated = active.update(&*self.db_pool).await?;
        Ok(updated)
    }

    /// Staff approval: payment Approved, order Confirmed, bookings
    /// Confirmed, one transaction.
    #[instrument(skip(self))]
    pub async fn approve_payment(
        &self,
        tenant_id: Uuid,
        payment_id: Uuid,
    ) -> Result<payment::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let model = Self::load_payment(&txn, tenant_id, payment_id).await?;
        let status: PaymentStatus = parse_status(&model.status, "payment")?;
        if !status.is_open() {
            return Err(ServiceError::InvalidStatus(format!(
                "payment {} is {} and cannot be approved",
                payment_id, status
            )));
        }

        let order_id = model.order_id;
        let mut active: payment::ActiveModel = model.into();
        active.status = Set(PaymentStatus::Approved.to_string());
        active.confirmed_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;

        OrderService::confirm_for_payment(&txn, order_id).await?;
        BookingService::confirm_for_order(&txn, order_id).await?;

        txn.commit().await?;

        info!(%payment_id, %order_id, "Payment approved");
        self.event_sender
            .send(Event::PaymentApproved(payment_id))
            .await;
        Ok(updated)
    }

    /// Staff rejection. The order is cancelled (stock and bookings
    /// restored) unless it already left a cancellable state.
    #[instrument(skip(self))]
    pub async fn reject_payment(
        &self,
        tenant_id: Uuid,
        payment_id: Uuid,
        reason: &str,
    ) -> Result<payment::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let model = Self::load_payment(&txn, tenant_id, payment_id).await?;
        let status: PaymentStatus = parse_status(&model.status, "payment")?;
        if !status.is_open() {
            return Err(ServiceError::InvalidStatus(format!(
                "payment {} is {} and cannot be rejected",
                payment_id, status
            )));
        }

        let order_id = model.order_id;
        let notes = model.receipt_notes.clone();
        let mut active: payment::ActiveModel = model.into();
        active.status = Set(PaymentStatus::Rejected.to_string());
        active.receipt_notes = Set(Some(match notes {
            Some(n) if !n.is_empty() => format!("{}\nRejection: {}", n, reason),
            _ => format!("Rejection: {}", reason),
        }));
        let updated = active.update(&txn).await?;

        Self::cancel_order_if_possible(&txn, tenant_id, order_id, reason).await?;

        txn.commit().await?;

        info!(%payment_id, %order_id, "Payment rejected");
        self.event_sender
            .send(Event::PaymentRejected(payment_id))
            .await;
        Ok(updated)
    }

    async fn cancel_order_if_possible<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        order_id: Uuid,
        reason: &str,
    ) -> Result<(), ServiceError> {
        let order_model = order::Entity::find_by_id(order_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))?;
        let status: OrderStatus = parse_status(&order_model.status, "order")?;
        if status.is_cancellable() {
            OrderService::cancel_within(conn, tenant_id, order_id, reason).await?;
        }
        Ok(())
    }

    /// Applies a gateway-reported status to the ledger. The external
    /// reference is the order id; a webhook for an order without a
    /// payment row is an error, not a no-op. Repeat deliveries of the
    /// same status are absorbed by the `external_status` guard.
    #[instrument(skip(self))]
    pub async fn reconcile_webhook(
        &self,
        external_reference: Uuid,
        reported_status: &str,
    ) -> Result<(), ServiceError> {
        let txn = self.db_pool.begin().await?;

        let order_model = order::Entity::find_by_id(external_reference)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "order {} from webhook reference not found",
                    external_reference
                ))
            })?;

        let model = payment::Entity::find()
            .filter(payment::Column::OrderId.eq(order_model.id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("order {} has no payment to reconcile", order_model.id))
            })?;

        if model.external_status.as_deref() == Some(reported_status) {
            info!(
                payment_id = %model.id,
                %reported_status,
                "Webhook already reconciled, skipping"
            );
            return Ok(());
        }

        let payment_id = model.id;
        let order_id = model.order_id;
        let tenant_id = model.tenant_id;
        let mut active: payment::ActiveModel = model.into();
        active.external_status = Set(Some(reported_status.to_string()));

        match reported_status {
            "approved" => {
                active.status = Set(PaymentStatus::Approved.to_string());
                active.confirmed_at = Set(Some(Utc::now()));
                active.update(&txn).await?;
                OrderService::confirm_for_payment(&txn, order_id).await?;
                BookingService::confirm_for_order(&txn, order_id).await?;
            }
            "rejected" | "cancelled" => {
                active.status = Set(PaymentStatus::Rejected.to_string());
                active.update(&txn).await?;
                if self.cancel_order_on_rejection {
                    Self::cancel_order_if_possible(
                        &txn,
                        tenant_id,
                        order_id,
                        "payment rejected by gateway",
                    )
                    .await?;
                }
            }
            "in_process" => {
                active.status = Set(PaymentStatus::Processing.to_string());
                active.update(&txn).await?;
            }
            other => {
                warn!(
                    %payment_id,
                    external_status = %other,
                    "Unrecognized gateway payment status, leaving payment pending"
                );
                active.status = Set(PaymentStatus::Pending.to_string());
                active.update(&txn).await?;
            }
        }

        txn.commit().await?;

        self.event_sender
            .send(Event::PaymentReconciled {
                payment_id,
                external_status: reported_status.to_string(),
            })
            .await;
        Ok(())
    }

    /// Open payments awaiting staff review, oldest first.
    #[instrument(skip(self))]
    pub async fn pending_payments(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<payment::Model>, ServiceError> {
        let models = payment::Entity::find()
            .filter(payment::Column::TenantId.eq(tenant_id))
            .filter(
                payment::Column::Status.is_in([
                    PaymentStatus::Pending.to_string(),
                    PaymentStatus::Processing.to_string(),
                ]),
            )
            .order_by_asc(payment::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?;
        Ok(models)
    }

    /// The gateway adapter, for the webhook handler's authoritative
    /// status fetch.
    pub fn gateway(&self) -> Arc<dyn PaymentGateway> {
        Arc::clone(&self.gateway)
    }
}
