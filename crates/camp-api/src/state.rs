use std::sync::Arc;

use camp_db::Database;
use tracing::error;

use crate::assets::AssetHost;
use crate::error::AppError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub assets: AssetHost,
    /// Mark the session cookie `Secure` (HTTPS deployments).
    pub secure_cookies: bool,
}

/// Runs a store call on the blocking pool, off the async runtime.
pub async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, AppError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            AppError::Internal(anyhow::anyhow!("store task failed"))
        })?
        .map_err(AppError::Internal)
}
