//! API server entry point.

use api::config::{Config, LogFormat};
use store::{InMemoryMarketplaceStore, MarketplaceStore, PostgresMarketplaceStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
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

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve<S: MarketplaceStore + Clone + 'static>(
    store: S,
    config: &Config,
    metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = api::create_state(store, config);
    let app = api::create_app(state, metrics_handle, config);

    let addr = config.addr();
    tracing::info!(%addr, order_prefix = %config.order_prefix, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    if config.jwt_secret.is_none() {
        tracing::warn!("JWT_SECRET not set, using the insecure development key");
    }

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Pick the store backend and serve
    match &config.database_url {
        Some(url) => {
            let store =
                PostgresMarketplaceStore::connect(url, config.database_max_connections).await?;
            store.run_migrations().await?;
            tracing::info!("using PostgreSQL store");
            serve(store, &config, metrics_handle).await?;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            serve(InMemoryMarketplaceStore::new(), &config, metrics_handle).await?;
        }
    }

    tracing::info!("server shut down gracefully");
    Ok(())
}
