use std::sync::Arc;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::bookings::BookingService;
use crate::services::catalog::CatalogService;
use crate::services::gateway::PaymentGateway;
use crate::services::inventory::InventoryService;
use crate::services::orders::OrderService;
use crate::services::payments::PaymentService;
use crate::services::shipping::ShippingRates;

pub mod bookings;
pub mod items;
pub mod orders;
pub mod payment_webhooks;
pub mod payments;

/// Shared service container handed to every handler through `AppState`.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub inventory: Arc<InventoryService>,
    pub bookings: Arc<BookingService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: EventSender,
        gateway: Arc<dyn PaymentGateway>,
        shipping: Arc<dyn ShippingRates>,
        cancel_order_on_rejection: bool,
    ) -> Self {
        Self {
            catalog: Arc::new(CatalogService::new(db_pool.clone())),
            inventory: Arc::new(InventoryService::new(db_pool.clone())),
            bookings: Arc::new(BookingService::new(db_pool.clone(), event_sender.clone())),
            orders: Arc::new(OrderService::new(
                db_pool.clone(),
                event_sender.clone(),
                shipping,
            )),
            payments: Arc::new(PaymentService::new(
                db_pool,
                event_sender,
                gateway,
                cancel_order_on_rejection,
            )),
        }
    }
}
