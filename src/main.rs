mod api;
mod config;
mod storage;

use crate::api::auth::JwtKeys;
use crate::api::AppState;
use crate::config::AppConfig;
use crate::storage::Database;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("🎬 Starting Movie Review API");

    // Load configuration
    let config = AppConfig::load()?;
    info!("📋 Configuration loaded");
    info!("   - Server: {}", config.bind_addr());
    info!("   - Data dir: {:?}", config.storage.data_dir);

    // Open document store
    let db = match &config.storage.data_dir {
        Some(dir) => Database::open(dir)?,
        None => {
            info!("⚠️  No data directory configured, documents live in memory only");
            Database::in_memory()
        }
    };
    let (movies, reviews) = db.counts().await;
    info!("✅ Document store ready ({} movies, {} reviews)", movies, reviews);

    let state = AppState {
        db: Arc::new(db),
        jwt: Arc::new(JwtKeys::new(&config.auth.jwt_secret)),
    };

    let app = api::router(state);

    // Start server
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📡 Available endpoints:");
    info!("   GET    /health                   - Health check");
    info!("   POST   /movies                   - Create movie");
    info!("   GET    /movies                   - List movies with ratings");
    info!("   GET    /movies/:id               - Get movie");
    info!("   PUT    /movies/:id               - Update movie");
    info!("   DELETE /movies/:id               - Delete movie");
    info!("   POST   /movies/:movieId/reviews  - Add review");
    info!("   GET    /movies/:movieId/reviews  - List reviews");
    info!("   PUT    /reviews/:reviewId        - Update review");
    info!("   DELETE /reviews/:reviewId        - Delete review");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shut down gracefully");

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM; a signal that cannot be installed never fires
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let received = tokio::select! {
        _ = ctrl_c => "ctrl-c",
        _ = terminate => "terminate",
    };

    info!(signal = received, "🛑 Shutdown signal received, draining connections");
}
