mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::ServiceExt;
use axum::extract::Request;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use camp_api::assets::{AssetHost, Cloudinary, LocalAssets};
use camp_api::state::{AppState, AppStateInner};

use crate::config::Config;

const SESSION_PRUNE_INTERVAL_SECS: u64 = 3600;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "camp=debug,camp_api=debug,camp_db=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = camp_db::Database::open(&config.db_path)?;

    let assets = match config.cloudinary.clone() {
        Some(cloud) => {
            info!("Storing images on Cloudinary ({})", cloud.cloud_name);
            AssetHost::Cloudinary(Cloudinary::new(cloud))
        }
        None => AssetHost::Local(LocalAssets::new(config.media_dir.clone()).await?),
    };

    let state: AppState = Arc::new(AppStateInner {
        db,
        assets,
        secure_cookies: config.secure_cookies,
    });

    // Background session cleanup
    let cleanup = tokio::spawn(camp_api::cleanup::run_session_prune_loop(
        state.clone(),
        Duration::from_secs(SESSION_PRUNE_INTERVAL_SECS),
    ));

    let router = camp_api::router(state.clone()).layer(TraceLayer::new_for_http());
    let app = camp_api::with_method_override(router);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Campgrounds listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // In-flight handlers have finished; the router's clones are dropped.
    cleanup.abort();
    let _ = cleanup.await;
    match Arc::try_unwrap(state) {
        Ok(inner) => inner.db.close()?,
        Err(_) => warn!("State still shared at shutdown, leaving database to drop"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
