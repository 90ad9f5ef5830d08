mod api;
mod auth;
mod config;
mod controller;
mod media;
mod storage;

use crate::api::AppState;
use crate::auth::Directory;
use crate::config::AppConfig;
use crate::media::LocalImageHost;
use crate::storage::ReviewStore;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("🚀 Starting Review API Server");

    // Load configuration
    let config = AppConfig::load()?;
    info!("📋 Configuration loaded");
    info!("   - Reviews: {}", config.storage.reviews_path.display());
    info!("   - Media: {}", config.media.root.display());
    info!("   - Server: {}:{}", config.server.host, config.server.port);

    let directory = Arc::new(Directory::new(&config.users, &config.providers));
    if directory.user_count() == 0 {
        warn!("⚠️  No users configured, every authenticated route will refuse requests");
    }
    info!(
        "👥 Directory ready ({} users, {} providers)",
        directory.user_count(),
        directory.provider_count()
    );

    info!("💾 Opening review store...");
    let review_store = Arc::new(ReviewStore::open(&config.storage.reviews_path).await?);
    info!("✅ Review store ready ({} reviews)", review_store.count().await);

    let image_host = Arc::new(LocalImageHost::new(
        &config.media.root,
        &config.media.public_base_url,
        config.media.max_file_bytes,
    ));

    let state = AppState {
        review_store,
        directory,
        image_host,
        max_upload_files: config.media.max_files,
    };

    let app = api::router(state, config.upload_body_limit())
        .nest_service("/media", ServeDir::new(&config.media.root))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📡 Available endpoints:");
    info!("   GET  /health                        - Health check");
    info!("   POST /reviews                       - Submit review (customer)");
    info!("   GET  /reviews/provider/{{provider_id}} - Reviews for a provider");
    info!("   GET  /reviews/my-reviews            - Own reviews (customer)");
    info!("   GET  /reviews/{{review_id}}           - Single review (authenticated)");
    info!("   POST /reviews/images                - Upload review images (customer)");
    info!("");
    info!("✨ Server is ready to accept requests!");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutting down gracefully");

    Ok(())
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("🛑 Shutdown signal received");
}
