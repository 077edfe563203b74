//! Integration tests for the payment webhook reconciler.
//!
//! Tests cover:
//! - Signature verification (missing, tampered, stale)
//! - Approved webhooks confirming payment, order and bookings
//! - Rejected webhooks cancelling the order and restoring stock
//! - Idempotent redelivery and unknown-status degradation
//! - Acknowledging unusable payloads after a valid signature

mod common;

use axum::http::Method;
use chrono::Utc;
use common::{future_date, response_json, sign_webhook, TestApp};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;
use storefront_api::entities::{booking, order, payment, product};
use uuid::Uuid;

/// Checkout an order with a gateway payment, script the gateway's
/// answer for `gateway_payment_id`, and return the order id.
async fn order_with_gateway_payment(
    app: &TestApp,
    caller: &storefront_api::entities::user::Model,
    item_id: Uuid,
    with_booking: bool,
) -> Uuid {
    let line = if with_booking {
        json!({
            "item_id": item_id,
            "quantity": 1,
            "booking_date": future_date(),
            "booking_time": "10:00:00"
        })
    } else {
        json!({ "item_id": item_id, "quantity": 2 })
    };

    let created = app
        .request_as(
            caller,
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "items": [line] })),
        )
        .await;
    assert_eq!(created.status(), 201);
    let body = response_json(created).await;
    let order_id =
        Uuid::parse_str(body["data"]["order"]["id"].as_str().expect("order id")).expect("uuid");

    let payment_created = app
        .request_as(
            caller,
            Method::POST,
            "/api/v1/payments",
            Some(json!({ "order_id": order_id, "method": "mercado_pago" })),
        )
        .await;
    assert_eq!(payment_created.status(), 201);

    order_id
}

fn webhook_body(gateway_payment_id: &str) -> String {
    json!({ "type": "payment", "data": { "id": gateway_payment_id } }).to_string()
}

async fn payment_row(app: &TestApp, order_id: Uuid) -> payment::Model {
    payment::Entity::find()
        .filter(payment::Column::OrderId.eq(order_id))
        .one(app.state.db.as_ref())
        .await
        .expect("query payment")
        .expect("payment row")
}

#[tokio::test]
async fn approved_webhook_confirms_payment_order_and_bookings() {
    let app = TestApp::new().await;
    let tenant = app.seed_tenant("studio").await;
    let customer = app.seed_user(tenant.id, "buyer@example.com", "customer").await;
    let service = app
        .seed_service(tenant.id, "Massage", dec!(60.00), 60, 2)
        .await;
    let order_id = order_with_gateway_payment(&app, &customer, service.id, true).await;
    app.gateway.script_payment("gw-1", "approved", order_id);

    let body = webhook_body("gw-1");
    let signature = sign_webhook(Utc::now().timestamp(), &body);
    let response = app.post_webhook(&body, Some(&signature)).await;
    assert_eq!(response.status(), 200);

    let row = payment_row(&app, order_id).await;
    assert_eq!(row.status, "approved");
    assert_eq!(row.external_status.as_deref(), Some("approved"));
    assert!(row.confirmed_at.is_some());

    let order_row = order::Entity::find_by_id(order_id)
        .one(app.state.db.as_ref())
        .await
        .expect("query order")
        .expect("order row");
    assert_eq!(order_row.status, "confirmed");

    let bookings = booking::Entity::find()
        .filter(booking::Column::OrderId.eq(order_id))
        .all(app.state.db.as_ref())
        .await
        .expect("query bookings");
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].status, "confirmed");
}

#[tokio::test]
async fn redelivered_webhook_is_idempotent() {
    let app = TestApp::new().await;
    let tenant = app.seed_tenant("shop").await;
    let customer = app.seed_user(tenant.id, "buyer@example.com", "customer").await;
    let item = app
        .seed_product(tenant.id, "Notebook", dec!(8.00), "physical", 10)
        .await;
    let order_id = order_with_gateway_payment(&app, &customer, item.id, false).await;
    app.gateway.script_payment("gw-1", "approved", order_id);

    let body = webhook_body("gw-1");
    for _ in 0..3 {
        let signature = sign_webhook(Utc::now().timestamp(), &body);
        let response = app.post_webhook(&body, Some(&signature)).await;
        assert_eq!(response.status(), 200);
    }

    let row = payment_row(&app, order_id).await;
    assert_eq!(row.status, "approved");
}

#[tokio::test]
async fn rejected_webhook_cancels_the_order_and_restores_stock() {
    let app = TestApp::new().await;
    let tenant = app.seed_tenant("shop").await;
    let customer = app.seed_user(tenant.id, "buyer@example.com", "customer").await;
    let item = app
        .seed_product(tenant.id, "Notebook", dec!(8.00), "physical", 10)
        .await;
    let order_id = order_with_gateway_payment(&app, &customer, item.id, false).await;
    app.gateway.script_payment("gw-1", "rejected", order_id);

    let body = webhook_body("gw-1");
    let signature = sign_webhook(Utc::now().timestamp(), &body);
    let response = app.post_webhook(&body, Some(&signature)).await;
    assert_eq!(response.status(), 200);

    let row = payment_row(&app, order_id).await;
    assert_eq!(row.status, "rejected");

    let order_row = order::Entity::find_by_id(order_id)
        .one(app.state.db.as_ref())
        .await
        .expect("query order")
        .expect("order row");
    assert_eq!(order_row.status, "cancelled");

    let stock = product::Entity::find_by_id(item.id)
        .one(app.state.db.as_ref())
        .await
        .expect("query stock")
        .expect("product row")
        .stock;
    assert_eq!(stock, 10);
}

#[tokio::test]
async fn in_process_webhook_marks_the_payment_processing() {
    let app = TestApp::new().await;
    let tenant = app.seed_tenant("shop").await;
    let customer = app.seed_user(tenant.id, "buyer@example.com", "customer").await;
    let item = app
        .seed_product(tenant.id, "Notebook", dec!(8.00), "physical", 10)
        .await;
    let order_id = order_with_gateway_payment(&app, &customer, item.id, false).await;
    app.gateway.script_payment("gw-1", "in_process", order_id);

    let body = webhook_body("gw-1");
    let signature = sign_webhook(Utc::now().timestamp(), &body);
    app.post_webhook(&body, Some(&signature)).await;

    let row = payment_row(&app, order_id).await;
    assert_eq!(row.status, "processing");
    assert_eq!(row.external_status.as_deref(), Some("in_process"));

    // The order stays pending while the gateway settles.
    let order_row = order::Entity::find_by_id(order_id)
        .one(app.state.db.as_ref())
        .await
        .expect("query order")
        .expect("order row");
    assert_eq!(order_row.status, "pending");
}

#[tokio::test]
async fn unknown_status_leaves_the_payment_pending_but_records_it() {
    let app = TestApp::new().await;
    let tenant = app.seed_tenant("shop").await;
    let customer = app.seed_user(tenant.id, "buyer@example.com", "customer").await;
    let item = app
        .seed_product(tenant.id, "Notebook", dec!(8.00), "physical", 10)
        .await;
    let order_id = order_with_gateway_payment(&app, &customer, item.id, false).await;
    app.gateway.script_payment("gw-1", "charged_back", order_id);

    let body = webhook_body("gw-1");
    let signature = sign_webhook(Utc::now().timestamp(), &body);
    let response = app.post_webhook(&body, Some(&signature)).await;
    assert_eq!(response.status(), 200);

    let row = payment_row(&app, order_id).await;
    assert_eq!(row.status, "pending");
    assert_eq!(row.external_status.as_deref(), Some("charged_back"));
}

#[tokio::test]
async fn webhooks_without_a_valid_signature_are_unauthorized() {
    let app = TestApp::new().await;
    let body = webhook_body("gw-1");

    let missing = app.post_webhook(&body, None).await;
    assert_eq!(missing.status(), 401);

    let garbage = app.post_webhook(&body, Some("ts=abc,v1=nothex")).await;
    assert_eq!(garbage.status(), 401);

    // Signature computed over a different body.
    let foreign = sign_webhook(Utc::now().timestamp(), "{\"other\":true}");
    let tampered = app.post_webhook(&body, Some(&foreign)).await;
    assert_eq!(tampered.status(), 401);

    // Stale timestamp outside the tolerance window.
    let stale = sign_webhook(Utc::now().timestamp() - 3600, &body);
    let replayed = app.post_webhook(&body, Some(&stale)).await;
    assert_eq!(replayed.status(), 401);
}

#[tokio::test]
async fn signed_but_unusable_payloads_are_acknowledged() {
    let app = TestApp::new().await;

    // Not JSON at all.
    let body = "not json";
    let signature = sign_webhook(Utc::now().timestamp(), body);
    assert_eq!(app.post_webhook(body, Some(&signature)).await.status(), 200);

    // A non-payment event type.
    let body = json!({ "type": "plan", "data": { "id": "123" } }).to_string();
    let signature = sign_webhook(Utc::now().timestamp(), &body);
    assert_eq!(app.post_webhook(&body, Some(&signature)).await.status(), 200);

    // A payment id the gateway has never heard of.
    let body = webhook_body("gw-unknown");
    let signature = sign_webhook(Utc::now().timestamp(), &body);
    assert_eq!(app.post_webhook(&body, Some(&signature)).await.status(), 200);
}

#[tokio::test]
async fn numeric_payment_ids_are_accepted() {
    let app = TestApp::new().await;
    let tenant = app.seed_tenant("shop").await;
    let customer = app.seed_user(tenant.id, "buyer@example.com", "customer").await;
    let item = app
        .seed_product(tenant.id, "Notebook", dec!(8.00), "physical", 10)
        .await;
    let order_id = order_with_gateway_payment(&app, &customer, item.id, false).await;
    app.gateway.script_payment("12345", "approved", order_id);

    let body = json!({ "type": "payment", "data": { "id": 12345 } }).to_string();
    let signature = sign_webhook(Utc::now().timestamp(), &body);
    let response = app.post_webhook(&body, Some(&signature)).await;
    assert_eq!(response.status(), 200);

    let row = payment_row(&app, order_id).await;
    assert_eq!(row.status, "approved");
}
