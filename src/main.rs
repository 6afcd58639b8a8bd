use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use brightlens_backend::api;
use brightlens_backend::auth::AuthService;
use brightlens_backend::config::Config;
use brightlens_backend::db::{MarketingRepository, Store};
use brightlens_backend::media::ImageStore;
use brightlens_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting Brightlens Backend...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        host = %config.server_host,
        port = %config.server_port,
        "Configuration loaded"
    );

    // Connect to the document store
    let store = Store::connect(&config).await?;
    match store.health_check().await {
        Ok(true) => tracing::info!("MongoDB connection established"),
        Ok(false) => tracing::warn!("MongoDB health check returned false"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to MongoDB");
            // Continue anyway, might recover later
        }
    }
    if let Err(e) = store.ensure_indexes().await {
        tracing::warn!(error = %e, "Failed to ensure indexes");
    }

    // Create services
    let auth = AuthService::new(&config);
    let marketing = MarketingRepository::new(&store);
    let images = ImageStore::new(&config);

    // Create application state
    let state = AppState::new(config.clone(), auth, store, marketing, images);

    // Build router
    let app = api::create_router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = config.server_addr().parse()?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(address = %addr, "Server listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Handle shutdown signals
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, shutting down...");
        },
    }
}
