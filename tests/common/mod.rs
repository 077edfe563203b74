#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::{NaiveTime, Utc};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use sha2::Sha256;
use storefront_api::{
    auth::{HEADER_TENANT_ID, HEADER_USER_EMAIL, HEADER_USER_ID, HEADER_USER_ROLE},
    config::{AppConfig, GatewayConfig},
    db,
    entities::{item, product, service_item, tenant, user},
    errors::ServiceError,
    events,
    handlers::AppServices,
    services::gateway::{CheckoutPreference, GatewayPayment, PaymentGateway, Preference},
    services::shipping::FlatRateShipping,
    AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_WEBHOOK_SECRET: &str = "test-webhook-secret";

/// Scripted gateway double. `create_preference` records what checkout
/// sent and hands back a fake hosted checkout; `get_payment` answers
/// from statuses scripted by the test.
pub struct MockGateway {
    preferences: Mutex<Vec<CheckoutPreference>>,
    payments: Mutex<HashMap<String, GatewayPayment>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            preferences: Mutex::new(Vec::new()),
            payments: Mutex::new(HashMap::new()),
        }
    }

    /// Script the status the gateway will report for a payment id.
    pub fn script_payment(&self, gateway_payment_id: &str, status: &str, external_reference: Uuid) {
        self.payments.lock().unwrap().insert(
            gateway_payment_id.to_string(),
            GatewayPayment {
                id: Value::String(gateway_payment_id.to_string()),
                status: status.to_string(),
                external_reference: Some(external_reference.to_string()),
            },
        );
    }

    pub fn created_preferences(&self) -> Vec<CheckoutPreference> {
        self.preferences.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_preference(
        &self,
        preference: CheckoutPreference,
    ) -> Result<Preference, ServiceError> {
        let mut prefs = self.preferences.lock().unwrap();
        prefs.push(preference);
        let id = format!("pref-{}", prefs.len());
        Ok(Preference {
            init_point: format!("https://gateway.test/checkout/{id}"),
            id,
        })
    }

    async fn get_payment(&self, gateway_payment_id: &str) -> Result<GatewayPayment, ServiceError> {
        self.payments
            .lock()
            .unwrap()
            .get(gateway_payment_id)
            .cloned()
            .ok_or_else(|| {
                ServiceError::ExternalApi(format!(
                    "no scripted payment with id {gateway_payment_id}"
                ))
            })
    }
}

/// Helper harness spinning up the full router over a throwaway SQLite
/// database file, with the gateway replaced by a scripted double.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Arc<MockGateway>,
    db_file: PathBuf,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_file =
            std::env::temp_dir().join(format!("storefront_test_{}.db", Uuid::new_v4().simple()));
        let _ = std::fs::remove_file(&db_file);

        let cfg = AppConfig {
            database_url: format!("sqlite://{}?mode=rwc", db_file.display()),
            host: "127.0.0.1".to_string(),
            port: 18_080,
            environment: "test".to_string(),
            log_level: "debug".to_string(),
            log_json: false,
            auto_migrate: true,
            db_max_connections: 1,
            db_min_connections: 1,
            db_connect_timeout_secs: 5,
            event_channel_capacity: 256,
            delivery_fee: "5.00".to_string(),
            gateway: GatewayConfig {
                webhook_secret: Some(TEST_WEBHOOK_SECRET.to_string()),
                ..GatewayConfig::default()
            },
        };

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");

        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_sender, event_rx) = events::event_channel(cfg.event_channel_capacity);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let gateway = Arc::new(MockGateway::new());
        let services = AppServices::new(
            db_arc.clone(),
            event_sender.clone(),
            gateway.clone(),
            Arc::new(FlatRateShipping::new()),
            cfg.gateway.cancel_order_on_rejection,
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        Self {
            router: storefront_api::app(state.clone()),
            state,
            gateway,
            db_file,
            _event_task: event_task,
        }
    }

    /// Send an anonymous request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = attach_json_body(builder, body);
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Send a request carrying the identity headers of the given user.
    pub async fn request_as(
        &self,
        caller: &user::Model,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(HEADER_USER_ID, caller.id.to_string())
            .header(HEADER_TENANT_ID, caller.tenant_id.to_string())
            .header(HEADER_USER_EMAIL, caller.email.clone())
            .header(HEADER_USER_ROLE, caller.role.clone());
        let request = attach_json_body(builder, body);
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Post a raw webhook body with a precomputed signature header.
    pub async fn post_webhook(&self, body: &str, signature: Option<&str>) -> axum::response::Response {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/payments/webhook/mercadopago")
            .header("content-type", "application/json");
        if let Some(sig) = signature {
            builder = builder.header("x-signature", sig);
        }
        let request = builder
            .body(Body::from(body.to_string()))
            .expect("failed to build webhook request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn seed_tenant(&self, subdomain: &str) -> tenant::Model {
        tenant::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(format!("Tenant {subdomain}")),
            subdomain: Set(subdomain.to_string()),
            postal_code: Set(Some("10000".to_string())),
            active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("seed tenant for tests")
    }

    pub async fn seed_user(&self, tenant_id: Uuid, email: &str, role: &str) -> user::Model {
        user::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            email: Set(email.to_string()),
            name: Set(format!("User {email}")),
            role: Set(role.to_string()),
            active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("seed user for tests")
    }

    pub async fn seed_product(
        &self,
        tenant_id: Uuid,
        name: &str,
        price: Decimal,
        product_type: &str,
        stock: i32,
    ) -> item::Model {
        let row = item::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            name: Set(name.to_string()),
            description: Set(None),
            price: Set(price),
            category: Set(None),
            kind: Set("product".to_string()),
            active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("seed item for tests");

        product::ActiveModel {
            item_id: Set(row.id),
            product_type: Set(product_type.to_string()),
            stock: Set(stock),
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("seed product for tests");

        row
    }

    /// Seed a bookable service open every day, 09:00 to 17:00.
    pub async fn seed_service(
        &self,
        tenant_id: Uuid,
        name: &str,
        price: Decimal,
        duration_minutes: i32,
        max_capacity: i32,
    ) -> item::Model {
        let row = item::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            name: Set(name.to_string()),
            description: Set(None),
            price: Set(price),
            category: Set(None),
            kind: Set("service".to_string()),
            active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("seed item for tests");

        service_item::ActiveModel {
            item_id: Set(row.id),
            duration_minutes: Set(duration_minutes),
            max_capacity: Set(max_capacity),
            requires_booking: Set(true),
            available_days: Set("mon,tue,wed,thu,fri,sat,sun".to_string()),
            work_start: Set(NaiveTime::from_hms_opt(9, 0, 0).expect("valid time")),
            work_end: Set(NaiveTime::from_hms_opt(17, 0, 0).expect("valid time")),
            slot_interval_minutes: Set(None),
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("seed service for tests");

        row
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
        let _ = std::fs::remove_file(&self.db_file);
    }
}

fn attach_json_body(
    mut builder: axum::http::request::Builder,
    body: Option<Value>,
) -> Request<Body> {
    let body = if let Some(json) = body {
        builder = builder.header("content-type", "application/json");
        Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
    } else {
        Body::empty()
    };
    builder.body(body).expect("failed to build request")
}

/// Read a response body as JSON.
pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response body was not valid json")
}

/// Compute a webhook signature header over `body` for a timestamp.
pub fn sign_webhook(timestamp: i64, body: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(TEST_WEBHOOK_SECRET.as_bytes())
        .expect("hmac accepts any key length");
    mac.update(format!("{timestamp}.{body}").as_bytes());
    format!("ts={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

/// A date comfortably in the future so booking validation never
/// trips on "today already passed" style checks.
pub fn future_date() -> chrono::NaiveDate {
    Utc::now().date_naive() + chrono::Duration::days(7)
}
