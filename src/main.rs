use std::sync::Arc;

use tracing::{info, warn};

use storefront_api::config::{init_tracing, load_config};
use storefront_api::db::{establish_connection_from_app_config, run_migrations};
use storefront_api::events::{event_channel, process_events};
use storefront_api::handlers::AppServices;
use storefront_api::services::gateway::{MercadoPagoClient, PaymentGateway, UnconfiguredGateway};
use storefront_api::services::shipping::{FlatRateShipping, ShippingRates};
use storefront_api::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config.log_level, config.log_json);

    let db = Arc::new(establish_connection_from_app_config(&config).await?);
    if config.auto_migrate {
        run_migrations(&db).await?;
    }

    let (event_sender, event_rx) = event_channel(config.event_channel_capacity);
    tokio::spawn(process_events(event_rx));

    let gateway: Arc<dyn PaymentGateway> = if config.gateway.access_token.is_some() {
        Arc::new(MercadoPagoClient::new(&config.gateway)?)
    } else {
        warn!("No gateway access token configured; gateway payment methods are disabled");
        Arc::new(UnconfiguredGateway)
    };
    let delivery_fee = config.delivery_fee.parse().unwrap_or_else(|_| {
        warn!(fee = %config.delivery_fee, "Invalid delivery_fee in config, using default");
        rust_decimal_macros::dec!(5.00)
    });
    let shipping: Arc<dyn ShippingRates> = Arc::new(FlatRateShipping::with_flat_rate(delivery_fee));

    let services = AppServices::new(
        Arc::clone(&db),
        event_sender.clone(),
        gateway,
        shipping,
        config.gateway.cancel_order_on_rejection,
    );

    let addr = config.server_addr();
    let state = AppState {
        db,
        config,
        event_sender,
        services,
    };

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
