use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = r#"
Multi-tenant commerce and booking API.

## Features

- **Catalog**: products (physical or digital) and bookable services
- **Checkout**: atomic orders over stock, bookings, and delivery
- **Bookings**: slot discovery and capacity-checked reservations
- **Payments**: manual receipts and Mercado Pago checkout links
- **Webhooks**: signature-verified gateway reconciliation

## Identity

Requests carry identity resolved by the edge proxy in the
`x-user-id`, `x-tenant-id`, `x-user-email`, and `x-user-role` headers.

## Error Handling

Errors use a consistent envelope with appropriate status codes:

```json
{
  "error": "Conflict",
  "message": "Insufficient stock for 'Yerba': available 2, requested 5",
  "timestamp": "2026-08-28T00:00:00Z"
}
```
"#
    ),
    paths(
        crate::handlers::items::list_items,
        crate::handlers::items::get_item,
        crate::handlers::items::create_item,
        crate::handlers::items::update_item,
        crate::handlers::items::deactivate_item,
        crate::handlers::orders::checkout,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::my_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::payments::create_payment,
        crate::handlers::payments::pending_payments,
        crate::handlers::payments::upload_receipt,
        crate::handlers::payments::approve_payment,
        crate::handlers::payments::reject_payment,
        crate::handlers::payment_webhooks::mercadopago_webhook,
        crate::handlers::bookings::available_slots,
        crate::handlers::bookings::service_bookings,
        crate::handlers::bookings::create_booking,
        crate::handlers::bookings::my_bookings,
        crate::handlers::bookings::cancel_booking,
        crate::handlers::bookings::confirm_booking,
        crate::handlers::bookings::reschedule_booking,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::models::OrderStatus,
        crate::models::PaymentMethod,
        crate::services::orders::CheckoutRequest,
        crate::services::orders::CheckoutLine,
        crate::services::orders::DeliveryRequest,
        crate::services::orders::UpdateOrderStatusRequest,
        crate::services::payments::CreatePaymentRequest,
        crate::services::payments::UploadReceiptRequest,
        crate::services::bookings::CreateBookingRequest,
        crate::services::bookings::RescheduleRequest,
        crate::services::catalog::CreateItemRequest,
        crate::services::catalog::UpdateItemRequest,
        crate::services::catalog::ItemKindInput,
        crate::handlers::orders::CancelOrderRequest,
        crate::handlers::payments::RejectPaymentRequest,
        crate::handlers::bookings::CancelBookingRequest,
    )),
    tags(
        (name = "Catalog", description = "Items and their subtypes"),
        (name = "Orders", description = "Checkout and fulfilment"),
        (name = "Payments", description = "Payment ledger and webhooks"),
        (name = "Bookings", description = "Service calendar")
    )
)]
pub struct ApiDoc;
