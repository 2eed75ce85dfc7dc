use std::time::Duration;

use tracing::{info, warn};

use crate::error::AppError;
use crate::state::{AppState, with_db};

/// Background task that prunes expired sessions (and their flashes).
///
/// Every request without a cookie starts a session, so this keeps the
/// table bounded for as long as the server runs.
pub async fn run_session_prune_loop(state: AppState, every: Duration) {
    let mut interval = tokio::time::interval(every);

    loop {
        interval.tick().await;

        match prune_expired(&state).await {
            Ok(count) => {
                if count > 0 {
                    info!("Cleanup: pruned {} expired sessions", count);
                }
            }
            Err(e) => {
                warn!("Session cleanup error: {}", e);
            }
        }
    }
}

async fn prune_expired(state: &AppState) -> Result<usize, AppError> {
    with_db(state, |db| db.prune_expired_sessions()).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use camp_db::Database;
    use camp_types::models::FlashKind;

    use super::*;
    use crate::assets::{AssetHost, LocalAssets};
    use crate::state::AppStateInner;

    async fn state(media: &std::path::Path) -> AppState {
        Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            assets: AssetHost::Local(LocalAssets::new(media.to_path_buf()).await.unwrap()),
            secure_cookies: false,
        })
    }

    fn expire(state: &AppState, id: &str) {
        state
            .db
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE sessions SET expires_at = datetime('now', '-1 seconds') WHERE id = ?1",
                    [id],
                )?;
                Ok(())
            })
            .unwrap();
    }

    fn session_rows(state: &AppState) -> i64 {
        state
            .db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?))
            .unwrap()
    }

    #[tokio::test]
    async fn prune_drops_expired_sessions_and_their_flashes() {
        let media = tempfile::tempdir().unwrap();
        let state = state(media.path()).await;
        let live = state.db.create_session(None).unwrap();
        let stale = state.db.create_session(None).unwrap();
        state.db.push_flash(&stale, FlashKind::Success, "Saved").unwrap();
        expire(&state, &stale);

        assert_eq!(prune_expired(&state).await.unwrap(), 1);
        assert_eq!(session_rows(&state), 1);
        assert!(state.db.get_session(&live).unwrap().is_some());
        assert!(state.db.take_flashes(&stale).unwrap().is_empty());
    }

    #[tokio::test]
    async fn loop_prunes_while_the_server_runs() {
        let media = tempfile::tempdir().unwrap();
        let state = state(media.path()).await;
        let stale = state.db.create_session(None).unwrap();
        expire(&state, &stale);

        let task = tokio::spawn(run_session_prune_loop(state.clone(), Duration::from_millis(10)));
        for _ in 0..200 {
            if session_rows(&state) == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        task.abort();

        assert_eq!(session_rows(&state), 0);
    }
}
