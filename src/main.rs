use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use hoot::config::Config;
use hoot::lifecycle;
use hoot::retry::{with_retry_if, RetryConfig};
use hoot::server::{self, AppState};
use hoot::store::{PgTranslationStore, StoreError};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hoot=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    info!("Starting Hoot");

    // Load configuration from environment
    let config = Config::from_env()?;

    // Persistence handle shared by the server and the synchronizer
    let store = with_retry_if(
        &RetryConfig::database_connect(),
        "Database connect",
        || PgTranslationStore::connect(&config.database_url, config.database_max_connections),
        StoreError::is_transient,
    )
    .await
    .context("Failed to connect to database")?;
    store.migrate().await.context("Failed to create translation tables")?;
    store
        .register_locales(&config.supported_locales)
        .await
        .context("Failed to register supported locales")?;

    // Bind before starting the synchronizer so a failed bind leaves nothing running
    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    info!("Listening on port {}", config.port);

    let synchronizer = lifecycle::start_synchronizer(Arc::new(store.clone()), config.sync_settings())
        .context("Invalid field declarations")?;

    let app = server::router(AppState {
        synchronizer: Arc::clone(&synchronizer),
    });

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Stop the synchronizer before the pool goes away, even if serving failed
    lifecycle::stop_synchronizer(&synchronizer).await;
    store.close().await;
    info!("Shutdown complete");

    served.context("Server error")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
