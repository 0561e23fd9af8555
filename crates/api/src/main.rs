//! API server entry point.

use rust_decimal::Decimal;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use api::config::Config;
use checkout::Reconciler;
use common::{Currency, Money, Sku};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{CommerceStore, MemoryStore, PostgresStore, ShippingSetting, TaxSetting};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Seeds a small demo catalog for cookie-to-webhook smoke runs without a
/// database.
async fn seed_demo_catalog(store: &MemoryStore) {
    let dec = |s: &str| s.parse::<Decimal>().expect("literal decimal");

    store.seed_sku(Sku::new("TSHIRT-M"), 25).await;
    store
        .seed_price(Sku::new("TSHIRT-M"), Currency::Usd, Money::new(dec("19.99")))
        .await;
    store
        .seed_price(Sku::new("TSHIRT-M"), Currency::Ngn, Money::new(dec("2500.00")))
        .await;
    store.seed_weight(Sku::new("TSHIRT-M"), dec("0.25")).await;

    store.seed_sku(Sku::new("HOODIE-L"), 10).await;
    store
        .seed_price(Sku::new("HOODIE-L"), Currency::Usd, Money::new(dec("49.99")))
        .await;
    store
        .seed_price(Sku::new("HOODIE-L"), Currency::Ngn, Money::new(dec("6200.00")))
        .await;
    store.seed_weight(Sku::new("HOODIE-L"), dec("0.70")).await;

    store
        .seed_shipping(ShippingSetting {
            country: "NG".to_string(),
            base_price: Money::new(dec("1000.00")),
            price_per_kg: Money::new(dec("0")),
        })
        .await;
    store
        .seed_shipping(ShippingSetting {
            country: "default".to_string(),
            base_price: Money::new(dec("10.00")),
            price_per_kg: Money::new(dec("1.50")),
        })
        .await;
    store
        .set_active_tax(TaxSetting {
            name: "VAT".to_string(),
            rate: dec("0.075"),
        })
        .await;
}

/// Runs the server and reconciler over the chosen store backend.
async fn serve<S: CommerceStore>(store: S, config: Config, metrics_handle: PrometheusHandle) {
    let state = api::create_state(store.clone(), &config);
    let app = api::create_app(state, metrics_handle);

    // Background reconciliation with a shutdown channel.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconciler = Reconciler::new(store, config.reconcile_period());
    let reconciler_handle = tokio::spawn(reconciler.run(shutdown_rx));

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    let _ = shutdown_tx.send(true);
    let _ = reconciler_handle.await;

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Load configuration
    let config = Config::from_env();

    // 2. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 3. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 4. Pick the store backend and serve
    match config.database_url.clone() {
        Some(url) => {
            let store = PostgresStore::connect(&url, config.store_timeout())
                .await
                .expect("failed to connect to database");
            store.run_migrations().await.expect("migrations failed");
            tracing::info!("using PostgreSQL store");
            serve(store, config, metrics_handle).await;
        }
        None => {
            let store = MemoryStore::new();
            seed_demo_catalog(&store).await;
            tracing::info!("DATABASE_URL not set; using in-memory store with demo catalog");
            serve(store, config, metrics_handle).await;
        }
    }
}
