use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        // No ON DELETE CASCADE on reviews.campground_id: delete_campground
        // removes reviews itself, and the foreign key rejects a campground
        // delete that would orphan one.
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE campgrounds (
                id          TEXT PRIMARY KEY,
                author_id   TEXT NOT NULL REFERENCES users(id),
                title       TEXT NOT NULL,
                location    TEXT NOT NULL,
                description TEXT NOT NULL,
                price       REAL NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_campgrounds_created
                ON campgrounds(created_at);

            CREATE TABLE campground_images (
                campground_id   TEXT NOT NULL REFERENCES campgrounds(id),
                position        INTEGER NOT NULL,
                url             TEXT NOT NULL,
                filename        TEXT NOT NULL,
                PRIMARY KEY (campground_id, filename)
            );

            CREATE TABLE reviews (
                id              TEXT PRIMARY KEY,
                campground_id   TEXT NOT NULL REFERENCES campgrounds(id),
                author_id       TEXT NOT NULL REFERENCES users(id),
                rating          INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                comment         TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_reviews_campground
                ON reviews(campground_id, created_at);

            CREATE TABLE sessions (
                id          TEXT PRIMARY KEY,
                user_id     TEXT REFERENCES users(id),
                return_to   TEXT,
                expires_at  TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE flashes (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id  TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                kind        TEXT NOT NULL,
                message     TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
