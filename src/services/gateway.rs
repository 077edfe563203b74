use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use tracing::{error, instrument};

use crate::config::GatewayConfig;
use crate::errors::ServiceError;

type HmacSha256 = Hmac<Sha256>;

/// One line of a checkout preference sent to the gateway.
#[derive(Debug, Clone, Serialize)]
pub struct PreferenceItem {
    pub title: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// A payment intent to be created at the gateway. `external_reference`
/// carries the order id so webhooks can be traced back.
#[derive(Debug, Clone)]
pub struct CheckoutPreference {
    pub external_reference: String,
    pub items: Vec<PreferenceItem>,
}

/// The created gateway preference: its id plus the hosted checkout URL
/// the buyer is redirected to.
#[derive(Debug, Clone, Deserialize)]
pub struct Preference {
    pub id: String,
    pub init_point: String,
}

/// A payment as reported by the gateway's own API.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayPayment {
    pub id: serde_json::Value,
    pub status: String,
    pub external_reference: Option<String>,
}

/// Payment gateway seam. Production talks to Mercado Pago; tests plug
/// in a scripted double.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_preference(
        &self,
        preference: CheckoutPreference,
    ) -> Result<Preference, ServiceError>;

    /// Authoritative status lookup. Webhook payloads are never trusted
    /// for status; this call is.
    async fn get_payment(&self, gateway_payment_id: &str) -> Result<GatewayPayment, ServiceError>;
}

#[derive(Serialize)]
struct BackUrls {
    success: String,
    failure: String,
    pending: String,
}

#[derive(Serialize)]
struct CreatePreferenceBody {
    items: Vec<PreferenceItem>,
    external_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    back_urls: Option<BackUrls>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notification_url: Option<String>,
    auto_return: String,
}

/// Mercado Pago client over reqwest with an explicit request timeout.
/// A timed-out create is treated as failed; nothing is persisted for it.
pub struct MercadoPagoClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    success_url: Option<String>,
    failure_url: Option<String>,
    notification_url: Option<String>,
}

impl MercadoPagoClient {
    pub fn new(cfg: &GatewayConfig) -> Result<Self, ServiceError> {
        let access_token = cfg.access_token.clone().ok_or_else(|| {
            ServiceError::ExternalApi("gateway access token is not configured".to_string())
        })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| ServiceError::ExternalApi(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            access_token,
            success_url: cfg.success_url.clone(),
            failure_url: cfg.failure_url.clone(),
            notification_url: cfg.notification_url.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for MercadoPagoClient {
    #[instrument(skip(self, preference), fields(external_reference = %preference.external_reference))]
    async fn create_preference(
        &self,
        preference: CheckoutPreference,
    ) -> Result<Preference, ServiceError> {
        let back_urls = match (&self.success_url, &self.failure_url) {
            (Some(success), Some(failure)) => Some(BackUrls {
                success: success.clone(),
                failure: failure.clone(),
                pending: success.clone(),
            }),
            _ => None,
        };

        let body = CreatePreferenceBody {
            items: preference.items,
            external_reference: preference.external_reference,
            back_urls,
            notification_url: self.notification_url.clone(),
            auto_return: "approved".to_string(),
        };

        let response = self
            .http
            .post(format!("{}/checkout/preferences", self.base_url))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Gateway preference creation failed: {}", e);
                ServiceError::ExternalApi(format!("preference creation failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!(%status, "Gateway rejected preference creation: {}", text);
            return Err(ServiceError::ExternalApi(format!(
                "gateway returned {} creating preference",
                status
            )));
        }

        response
            .json::<Preference>()
            .await
            .map_err(|e| ServiceError::ExternalApi(format!("malformed preference response: {}", e)))
    }

    #[instrument(skip(self))]
    async fn get_payment(&self, gateway_payment_id: &str) -> Result<GatewayPayment, ServiceError> {
        let response = self
            .http
            .get(format!("{}/v1/payments/{}", self.base_url, gateway_payment_id))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalApi(format!("payment lookup failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::ExternalApi(format!(
                "gateway returned {} fetching payment {}",
                response.status(),
                gateway_payment_id
            )));
        }

        response
            .json::<GatewayPayment>()
            .await
            .map_err(|e| ServiceError::ExternalApi(format!("malformed payment response: {}", e)))
    }
}

/// Stand-in when no gateway credentials are configured. Manual payment
/// methods keep working; gateway methods fail with `ExternalApi`.
pub struct UnconfiguredGateway;

#[async_trait]
impl PaymentGateway for UnconfiguredGateway {
    async fn create_preference(
        &self,
        _preference: CheckoutPreference,
    ) -> Result<Preference, ServiceError> {
        Err(ServiceError::ExternalApi(
            "payment gateway is not configured".to_string(),
        ))
    }

    async fn get_payment(&self, _gateway_payment_id: &str) -> Result<GatewayPayment, ServiceError> {
        Err(ServiceError::ExternalApi(
            "payment gateway is not configured".to_string(),
        ))
    }
}

/// Verifies a webhook `x-signature` header: `ts=<unix>,v1=<hex hmac>`,
/// where the HMAC-SHA256 is computed over `"{ts}.{raw body}"`. The MAC
/// comparison is constant-time; the timestamp must fall within the
/// configured tolerance of `now`.
pub fn verify_webhook_signature(
    secret: &str,
    signature_header: &str,
    body: &[u8],
    tolerance_secs: u64,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let mut ts: Option<i64> = None;
    let mut v1: Option<String> = None;
    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("ts", value)) => {
                ts = value.trim().parse().ok();
            }
            Some(("v1", value)) => {
                v1 = Some(value.trim().to_string());
            }
            _ => {}
        }
    }

    let ts = ts.ok_or_else(|| {
        ServiceError::Unauthorized("webhook signature missing timestamp".to_string())
    })?;
    let v1 = v1.ok_or_else(|| {
        ServiceError::Unauthorized("webhook signature missing digest".to_string())
    })?;

    let age = (now.timestamp() - ts).unsigned_abs();
    if age > tolerance_secs {
        return Err(ServiceError::Unauthorized(
            "webhook timestamp outside tolerance".to_string(),
        ));
    }

    let expected = hex::decode(&v1)
        .map_err(|_| ServiceError::Unauthorized("webhook signature is not hex".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ServiceError::Internal("webhook secret unusable for hmac".to_string()))?;
    mac.update(format!("{}.", ts).as_bytes());
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| ServiceError::Unauthorized("webhook signature mismatch".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "test-webhook-secret";

    fn sign(ts: i64, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{}.", ts).as_bytes());
        mac.update(body);
        let digest = hex::encode(mac.finalize().into_bytes());
        format!("ts={},v1={}", ts, digest)
    }

    #[test]
    fn valid_signature_passes() {
        let now = Utc.with_ymd_and_hms(2026, 8, 28, 12, 0, 0).unwrap();
        let body = br#"{"type":"payment","data":{"id":"123"}}"#;
        let header = sign(now.timestamp(), body);
        assert!(verify_webhook_signature(SECRET, &header, body, 300, now).is_ok());
    }

    #[test]
    fn tampered_body_fails() {
        let now = Utc.with_ymd_and_hms(2026, 8, 28, 12, 0, 0).unwrap();
        let header = sign(now.timestamp(), b"original");
        let err = verify_webhook_signature(SECRET, &header, b"tampered", 300, now).unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[test]
    fn stale_timestamp_fails() {
        let now = Utc.with_ymd_and_hms(2026, 8, 28, 12, 0, 0).unwrap();
        let old = now.timestamp() - 600;
        let header = sign(old, b"body");
        let err = verify_webhook_signature(SECRET, &header, b"body", 300, now).unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[test]
    fn malformed_header_fails() {
        let now = Utc.with_ymd_and_hms(2026, 8, 28, 12, 0, 0).unwrap();
        for header in ["", "v1=abcd", "ts=notanumber,v1=abcd", "ts=123,v1=zzzz"] {
            assert!(verify_webhook_signature(SECRET, header, b"body", 300, now).is_err());
        }
    }
}
