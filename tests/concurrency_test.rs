//! Contention tests for the guarded stock decrement and the booking
//! capacity check: concurrent buyers must never drive stock negative
//! or overlap a slot beyond its capacity.

mod common;

use common::{future_date, TestApp};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use storefront_api::auth::AuthUser;
use storefront_api::entities::product;
use storefront_api::services::bookings::CreateBookingRequest;
use storefront_api::services::orders::{CheckoutLine, CheckoutRequest};
use uuid::Uuid;

fn caller(tenant_id: Uuid, n: usize) -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        tenant_id,
        email: format!("buyer{n}@example.com"),
        role: "customer".to_string(),
    }
}

#[tokio::test]
async fn concurrent_checkouts_never_oversell() {
    let app = TestApp::new().await;
    let tenant = app.seed_tenant("shop").await;
    let item = app
        .seed_product(tenant.id, "Limited Print", dec!(40.00), "physical", 5)
        .await;

    let mut tasks = Vec::new();
    for n in 0..12 {
        let orders = app.state.services.orders.clone();
        let auth = caller(tenant.id, n);
        let item_id = item.id;
        tasks.push(tokio::spawn(async move {
            orders
                .checkout(
                    &auth,
                    CheckoutRequest {
                        items: vec![CheckoutLine {
                            item_id,
                            quantity: 1,
                            booking_date: None,
                            booking_time: None,
                        }],
                        payment_method: None,
                        notes: None,
                        delivery: None,
                    },
                )
                .await
                .is_ok()
        }));
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.expect("checkout task panicked") {
            successes += 1;
        }
    }
    assert_eq!(successes, 5, "exactly the seeded stock may be sold");

    let stock = product::Entity::find_by_id(item.id)
        .one(app.state.db.as_ref())
        .await
        .expect("query stock")
        .expect("product row")
        .stock;
    assert_eq!(stock, 0);
}

#[tokio::test]
async fn concurrent_bookings_never_exceed_capacity() {
    let app = TestApp::new().await;
    let tenant = app.seed_tenant("studio").await;
    let service = app
        .seed_service(tenant.id, "Haircut", dec!(30.00), 60, 1)
        .await;
    let date = future_date();

    let mut tasks = Vec::new();
    for n in 0..6 {
        let bookings = app.state.services.bookings.clone();
        let auth = caller(tenant.id, n);
        let service_id = service.id;
        tasks.push(tokio::spawn(async move {
            bookings
                .create_booking(
                    &auth,
                    CreateBookingRequest {
                        service_item_id: service_id,
                        booking_date: date,
                        start_time: chrono::NaiveTime::from_hms_opt(10, 0, 0)
                            .expect("valid time"),
                        notes: None,
                    },
                )
                .await
                .is_ok()
        }));
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.expect("booking task panicked") {
            successes += 1;
        }
    }
    assert_eq!(successes, 1, "only one booking may hold the slot");
}
