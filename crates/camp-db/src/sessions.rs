use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use camp_types::models::{CurrentUser, Flash, FlashKind};
use rand::Rng;
use rusqlite::{Connection, OptionalExtension};
use tracing::warn;

use crate::Database;
use crate::models::SessionRow;

/// Sessions live for 7 days from creation.
pub const SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

impl Database {
    /// Starts a new session, optionally already bound to a user.
    pub fn create_session(&self, user_id: Option<&str>) -> Result<String> {
        self.with_conn(|conn| insert_session(conn, user_id))
    }

    /// Loads a live session. Expired or unknown ids yield `None`.
    pub fn get_session(&self, id: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT s.id, s.user_id, u.username
                     FROM sessions s
                     LEFT JOIN users u ON u.id = s.user_id
                     WHERE s.id = ?1 AND s.expires_at > datetime('now')",
                    [id],
                    |row| {
                        let user_id: Option<String> = row.get(1)?;
                        let username: Option<String> = row.get(2)?;
                        Ok(SessionRow {
                            id: row.get(0)?,
                            user: user_id
                                .zip(username)
                                .map(|(id, username)| CurrentUser { id, username }),
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Replaces a session with a fresh id bound to `user_id`. Pending flash
    /// messages carry over; everything else about the old session is dropped.
    pub fn rotate_session(&self, old_id: &str, user_id: Option<&str>) -> Result<String> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let new_id = insert_session(&tx, user_id)?;
            tx.execute(
                "UPDATE flashes SET session_id = ?1 WHERE session_id = ?2",
                (&new_id, old_id),
            )?;
            tx.execute("DELETE FROM sessions WHERE id = ?1", [old_id])?;
            tx.commit()?;
            Ok(new_id)
        })
    }

    /// Remembers where to send the user after they log in.
    pub fn set_return_to(&self, id: &str, path: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE sessions SET return_to = ?2 WHERE id = ?1", (id, path))?;
            Ok(())
        })
    }

    pub fn take_return_to(&self, id: &str) -> Result<Option<String>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let path: Option<String> = tx
                .query_row("SELECT return_to FROM sessions WHERE id = ?1", [id], |row| {
                    row.get::<_, Option<String>>(0)
                })
                .optional()?
                .flatten();
            tx.execute("UPDATE sessions SET return_to = NULL WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(path)
        })
    }

    pub fn push_flash(&self, session_id: &str, kind: FlashKind, message: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO flashes (session_id, kind, message) VALUES (?1, ?2, ?3)",
                (session_id, kind.as_str(), message),
            )?;
            Ok(())
        })
    }

    /// Returns and forgets every pending flash message, oldest first.
    pub fn take_flashes(&self, session_id: &str) -> Result<Vec<Flash>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let rows = {
                let mut stmt =
                    tx.prepare("SELECT kind, message FROM flashes WHERE session_id = ?1 ORDER BY id")?;
                stmt.query_map([session_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?
            };
            tx.execute("DELETE FROM flashes WHERE session_id = ?1", [session_id])?;
            tx.commit()?;

            let flashes = rows
                .into_iter()
                .filter_map(|(kind, message)| match FlashKind::parse(&kind) {
                    Some(kind) => Some(Flash { kind, message }),
                    None => {
                        warn!("Dropping flash with unknown kind '{}'", kind);
                        None
                    }
                })
                .collect();
            Ok(flashes)
        })
    }

    pub fn prune_expired_sessions(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let pruned = conn.execute("DELETE FROM sessions WHERE expires_at <= datetime('now')", [])?;
            Ok(pruned)
        })
    }
}

fn insert_session(conn: &Connection, user_id: Option<&str>) -> Result<String> {
    let id = new_session_id();
    conn.execute(
        "INSERT INTO sessions (id, user_id, expires_at)
         VALUES (?1, ?2, datetime('now', '+' || ?3 || ' seconds'))",
        (&id, user_id, SESSION_TTL_SECS),
    )?;
    Ok(id)
}

/// 256 random bits, URL-safe base64.
fn new_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_user() -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "alice", "alice@example.com", "hash").unwrap();
        (db, "u1".to_string())
    }

    #[test]
    fn anonymous_session_has_no_user() {
        let (db, _) = db_with_user();
        let id = db.create_session(None).unwrap();
        let session = db.get_session(&id).unwrap().unwrap();
        assert_eq!(session.id, id);
        assert!(session.user.is_none());
        assert!(db.get_session("made-up").unwrap().is_none());
    }

    #[test]
    fn flashes_are_shown_once() {
        let (db, _) = db_with_user();
        let id = db.create_session(None).unwrap();
        db.push_flash(&id, FlashKind::Success, "Saved").unwrap();
        db.push_flash(&id, FlashKind::Error, "But something else failed").unwrap();

        let flashes = db.take_flashes(&id).unwrap();
        assert_eq!(flashes.len(), 2);
        assert_eq!(flashes[0].kind, FlashKind::Success);
        assert_eq!(flashes[1].message, "But something else failed");
        assert!(db.take_flashes(&id).unwrap().is_empty());
    }

    #[test]
    fn rotation_binds_user_and_keeps_flashes() {
        let (db, user) = db_with_user();
        let old = db.create_session(None).unwrap();
        db.push_flash(&old, FlashKind::Success, "Welcome back").unwrap();

        let new = db.rotate_session(&old, Some(&user)).unwrap();
        assert_ne!(old, new);
        assert!(db.get_session(&old).unwrap().is_none());

        let session = db.get_session(&new).unwrap().unwrap();
        assert_eq!(session.user.unwrap().username, "alice");
        assert_eq!(db.take_flashes(&new).unwrap()[0].message, "Welcome back");
    }

    #[test]
    fn return_to_is_consumed() {
        let (db, _) = db_with_user();
        let id = db.create_session(None).unwrap();
        assert_eq!(db.take_return_to(&id).unwrap(), None);
        db.set_return_to(&id, "/campground/new").unwrap();
        assert_eq!(db.take_return_to(&id).unwrap().as_deref(), Some("/campground/new"));
        assert_eq!(db.take_return_to(&id).unwrap(), None);
    }

    #[test]
    fn expired_sessions_are_invisible_and_pruned() {
        let (db, _) = db_with_user();
        let id = db.create_session(None).unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE sessions SET expires_at = datetime('now', '-1 seconds') WHERE id = ?1",
                [&id],
            )?;
            Ok(())
        })
        .unwrap();

        assert!(db.get_session(&id).unwrap().is_none());
        assert_eq!(db.prune_expired_sessions().unwrap(), 1);
    }
}
