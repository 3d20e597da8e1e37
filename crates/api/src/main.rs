//! API server entry point.

use std::sync::Arc;

use api::AppState;
use api::config::Config;
use engine::EngineConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use payments::{InMemoryPaymentProvider, PaymentProvider, StripePaymentProvider};
use store::{InMemoryStore, PostgresStore, Store};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

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

async fn serve<S: Store + Clone + 'static>(
    store: S,
    provider: Arc<dyn PaymentProvider>,
    config: &Config,
    engine_config: EngineConfig,
    metrics_handle: PrometheusHandle,
) {
    let state = Arc::new(AppState::new(store, provider, engine_config));
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let engine_config = config
        .engine_config()
        .expect("invalid payment configuration");

    // 3. Payment provider
    let provider: Arc<dyn PaymentProvider> = match config.stripe_config() {
        Some(stripe) => {
            tracing::info!(base_url = %stripe.base_url, "using Stripe payment provider");
            Arc::new(StripePaymentProvider::new(stripe))
        }
        None => {
            tracing::warn!("STRIPE_SECRET_KEY not set, using in-memory payment provider");
            Arc::new(InMemoryPaymentProvider::new())
        }
    };

    // 4. Store, then serve
    match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url, config.database_max_connections)
                .await
                .expect("failed to connect to database");
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            serve(store, provider, &config, engine_config, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store with demo catalog");
            let store = InMemoryStore::with_products(api::demo_catalog()).await;
            serve(store, provider, &config, engine_config, metrics_handle).await;
        }
    }

    tracing::info!("server shut down gracefully");
}
