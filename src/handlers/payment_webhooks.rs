use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::services::gateway::verify_webhook_signature;
use crate::AppState;

/// Mercado Pago webhook intake.
///
/// The signature check is mandatory and failing it is a 401. Everything
/// after a valid signature is acknowledged with 200 even on internal
/// failure: the gateway retries aggressively on non-2xx, and a retry
/// storm cannot fix a bug on our side.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook/mercadopago",
    request_body(content = String, description = "Raw gateway notification payload"),
    responses(
        (status = 200, description = "Webhook acknowledged"),
        (status = 401, description = "Missing or invalid signature")
    ),
    tag = "Payments"
)]
pub async fn mercadopago_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    let secret = state.config.gateway.webhook_secret.as_deref().ok_or_else(|| {
        error!("Webhook received but no webhook secret is configured");
        ServiceError::Unauthorized("webhook verification unavailable".to_string())
    })?;

    let signature = headers
        .get("x-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServiceError::Unauthorized("missing x-signature header".to_string()))?;

    verify_webhook_signature(
        secret,
        signature,
        &body,
        state.config.gateway.webhook_tolerance_secs,
        Utc::now(),
    )?;

    // Signed payload. From here on, always acknowledge.
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!("Webhook body is not valid JSON: {}", e);
            return Ok((StatusCode::OK, "ok"));
        }
    };

    let event_type = payload.get("type").and_then(Value::as_str).unwrap_or("");
    if event_type != "payment" {
        info!(%event_type, "Ignoring non-payment webhook");
        return Ok((StatusCode::OK, "ok"));
    }

    let payment_id = match payload.pointer("/data/id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            warn!("Payment webhook without data.id");
            return Ok((StatusCode::OK, "ok"));
        }
    };

    // Never trust the payload's status; fetch it from the gateway
    let gateway_payment = match state
        .services
        .payments
        .gateway()
        .get_payment(&payment_id)
        .await
    {
        Ok(p) => p,
        Err(e) => {
            error!(%payment_id, "Failed to fetch payment from gateway: {}", e);
            return Ok((StatusCode::OK, "ok"));
        }
    };

    let order_id = match gateway_payment
        .external_reference
        .as_deref()
        .and_then(|r| Uuid::parse_str(r).ok())
    {
        Some(id) => id,
        None => {
            warn!(%payment_id, "Gateway payment has no usable external reference");
            return Ok((StatusCode::OK, "ok"));
        }
    };

    if let Err(e) = state
        .services
        .payments
        .reconcile_webhook(order_id, &gateway_payment.status)
        .await
    {
        error!(%order_id, status = %gateway_payment.status, "Webhook reconciliation failed: {}", e);
    }

    Ok((StatusCode::OK, "ok"))
}
