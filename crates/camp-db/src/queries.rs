use std::collections::HashMap;

use anyhow::Result;
use camp_types::forms::{CampgroundInput, ReviewInput};
use camp_types::models::{Campground, CampgroundDetail, Image, Review};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params, params_from_iter};
use tracing::{debug, warn};

use crate::Database;
use crate::models::UserRow;

const CAMPGROUND_SELECT: &str = "SELECT c.id, c.title, c.location, c.description, c.price, c.author_id, u.username, c.created_at
     FROM campgrounds c
     JOIN users u ON u.id = c.author_id";

const REVIEW_SELECT: &str = "SELECT r.id, r.campground_id, r.author_id, u.username, r.rating, r.comment, r.created_at
     FROM reviews r
     JOIN users u ON u.id = r.author_id";

impl Database {
    // -- Users --

    /// Returns false when the username or email is already taken.
    pub fn create_user(&self, id: &str, username: &str, email: &str, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, username, email, password) VALUES (?1, ?2, ?3, ?4)",
                (id, username, email, password_hash),
            );
            match inserted {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, username, password FROM users WHERE username = ?1",
                    [username],
                    |row| {
                        Ok(UserRow {
                            id: row.get(0)?,
                            username: row.get(1)?,
                            password: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Names the unique field ("username" or "email") an existing user
    /// already holds, if any.
    pub fn find_user_conflict(&self, username: &str, email: &str) -> Result<Option<&'static str>> {
        self.with_conn(|conn| {
            let taken: Option<bool> = conn
                .query_row(
                    "SELECT username = ?1 FROM users WHERE username = ?1 OR email = ?2 LIMIT 1",
                    (username, email),
                    |row| row.get(0),
                )
                .optional()?;
            Ok(taken.map(|by_name| if by_name { "username" } else { "email" }))
        })
    }

    // -- Campgrounds --

    pub fn insert_campground(
        &self,
        id: &str,
        author_id: &str,
        input: &CampgroundInput,
        images: &[Image],
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO campgrounds (id, author_id, title, location, description, price)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, author_id, input.title, input.location, input.description, input.price],
            )?;
            append_images(&tx, id, images)?;
            tx.commit()?;
            Ok(())
        })
    }

    /// All campgrounds, newest first, with their images.
    pub fn list_campgrounds(&self) -> Result<Vec<Campground>> {
        self.with_conn(|conn| {
            let sql = format!("{CAMPGROUND_SELECT} ORDER BY c.created_at DESC, c.rowid DESC");
            let mut stmt = conn.prepare(&sql)?;
            let mut campgrounds = stmt
                .query_map([], campground_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            attach_images(conn, &mut campgrounds)?;
            Ok(campgrounds)
        })
    }

    pub fn get_campground(&self, id: &str) -> Result<Option<Campground>> {
        self.with_conn(|conn| query_campground(conn, id))
    }

    /// The campground with every review and review author resolved.
    pub fn get_campground_detail(&self, id: &str) -> Result<Option<CampgroundDetail>> {
        self.with_conn(|conn| {
            let Some(campground) = query_campground(conn, id)? else {
                return Ok(None);
            };

            let sql = format!("{REVIEW_SELECT} WHERE r.campground_id = ?1 ORDER BY r.created_at, r.rowid");
            let mut stmt = conn.prepare(&sql)?;
            let reviews = stmt
                .query_map([id], review_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(Some(CampgroundDetail { campground, reviews }))
        })
    }

    /// Overwrites the campground's fields and appends `new_images`.
    /// Returns false if the campground does not exist.
    pub fn update_campground(&self, id: &str, input: &CampgroundInput, new_images: &[Image]) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE campgrounds SET title = ?2, location = ?3, description = ?4, price = ?5 WHERE id = ?1",
                params![id, input.title, input.location, input.description, input.price],
            )?;
            if changed == 0 {
                return Ok(false);
            }
            append_images(&tx, id, new_images)?;
            tx.commit()?;
            Ok(true)
        })
    }

    /// Removes the named images from the campground's list and returns the
    /// ones that were actually there.
    pub fn remove_images(&self, campground_id: &str, filenames: &[String]) -> Result<Vec<Image>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut removed = Vec::new();
            {
                let mut select = tx.prepare(
                    "SELECT url FROM campground_images WHERE campground_id = ?1 AND filename = ?2",
                )?;
                let mut delete = tx.prepare(
                    "DELETE FROM campground_images WHERE campground_id = ?1 AND filename = ?2",
                )?;
                for filename in filenames {
                    let url: Option<String> = select
                        .query_row((campground_id, filename), |row| row.get(0))
                        .optional()?;
                    if let Some(url) = url {
                        delete.execute((campground_id, filename))?;
                        removed.push(Image {
                            url,
                            filename: filename.clone(),
                        });
                    }
                }
            }
            tx.commit()?;
            Ok(removed)
        })
    }

    /// Deletes the campground together with all of its reviews and images,
    /// in one transaction. Returns the removed images so the caller can
    /// release them at the asset host, or `None` if nothing matched.
    pub fn delete_campground(&self, id: &str) -> Result<Option<Vec<Image>>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if !campground_exists(&tx, id)? {
                return Ok(None);
            }
            let images = query_images(&tx, id)?;

            let reviews = tx.execute("DELETE FROM reviews WHERE campground_id = ?1", [id])?;
            tx.execute("DELETE FROM campground_images WHERE campground_id = ?1", [id])?;
            tx.execute("DELETE FROM campgrounds WHERE id = ?1", [id])?;
            tx.commit()?;

            debug!("Deleted campground {} with {} reviews and {} images", id, reviews, images.len());
            Ok(Some(images))
        })
    }

    /// Removes every campground (and so every review and image).
    pub fn clear_campgrounds(&self) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM reviews", [])?;
            tx.execute("DELETE FROM campground_images", [])?;
            let count = tx.execute("DELETE FROM campgrounds", [])?;
            tx.commit()?;
            Ok(count)
        })
    }

    // -- Reviews --

    /// Returns false if the campground does not exist.
    pub fn insert_review(
        &self,
        id: &str,
        campground_id: &str,
        author_id: &str,
        input: &ReviewInput,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            if !campground_exists(conn, campground_id)? {
                return Ok(false);
            }
            conn.execute(
                "INSERT INTO reviews (id, campground_id, author_id, rating, comment) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, campground_id, author_id, input.rating, input.comment],
            )?;
            Ok(true)
        })
    }

    pub fn get_review(&self, id: &str) -> Result<Option<Review>> {
        self.with_conn(|conn| {
            let sql = format!("{REVIEW_SELECT} WHERE r.id = ?1");
            let review = conn.query_row(&sql, [id], review_from_row).optional()?;
            Ok(review)
        })
    }

    /// Deletes a review of the given campground. Returns false if no such
    /// review exists.
    pub fn delete_review(&self, campground_id: &str, review_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM reviews WHERE id = ?1 AND campground_id = ?2",
                (review_id, campground_id),
            )?;
            Ok(deleted > 0)
        })
    }

    pub fn count_reviews(&self, campground_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM reviews WHERE campground_id = ?1",
                [campground_id],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }
}

fn query_campground(conn: &Connection, id: &str) -> Result<Option<Campground>> {
    let sql = format!("{CAMPGROUND_SELECT} WHERE c.id = ?1");
    let Some(mut campground) = conn.query_row(&sql, [id], campground_from_row).optional()? else {
        return Ok(None);
    };
    campground.images = query_images(conn, id)?;
    Ok(Some(campground))
}

fn campground_exists(conn: &Connection, id: &str) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM campgrounds WHERE id = ?1", [id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

fn query_images(conn: &Connection, campground_id: &str) -> Result<Vec<Image>> {
    let mut stmt = conn.prepare(
        "SELECT url, filename FROM campground_images WHERE campground_id = ?1 ORDER BY position",
    )?;
    let images = stmt
        .query_map([campground_id], |row| {
            Ok(Image {
                url: row.get(0)?,
                filename: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(images)
}

/// Batch-fetch images for a set of campgrounds (one query instead of N).
fn attach_images(conn: &Connection, campgrounds: &mut [Campground]) -> Result<()> {
    if campgrounds.is_empty() {
        return Ok(());
    }

    let placeholders: Vec<String> = (1..=campgrounds.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT campground_id, url, filename FROM campground_images
         WHERE campground_id IN ({})
         ORDER BY campground_id, position",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(campgrounds.iter().map(|c| c.id.as_str())), |row| {
            Ok((
                row.get::<_, String>(0)?,
                Image {
                    url: row.get(1)?,
                    filename: row.get(2)?,
                },
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut by_campground: HashMap<String, Vec<Image>> = HashMap::new();
    for (campground_id, image) in rows {
        by_campground.entry(campground_id).or_default().push(image);
    }
    for campground in campgrounds.iter_mut() {
        campground.images = by_campground.remove(&campground.id).unwrap_or_default();
    }
    Ok(())
}

fn append_images(conn: &Connection, campground_id: &str, images: &[Image]) -> Result<()> {
    if images.is_empty() {
        return Ok(());
    }

    let mut next: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position), -1) + 1 FROM campground_images WHERE campground_id = ?1",
        [campground_id],
        |row| row.get(0),
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO campground_images (campground_id, position, url, filename) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for image in images {
        stmt.execute(params![campground_id, next, image.url, image.filename])?;
        next += 1;
    }
    Ok(())
}

fn campground_from_row(row: &Row<'_>) -> rusqlite::Result<Campground> {
    Ok(Campground {
        id: row.get(0)?,
        title: row.get(1)?,
        location: row.get(2)?,
        description: row.get(3)?,
        price: row.get(4)?,
        author_id: row.get(5)?,
        author_username: row.get(6)?,
        images: Vec::new(),
        created_at: parse_timestamp(&row.get::<_, String>(7)?),
    })
}

fn review_from_row(row: &Row<'_>) -> rusqlite::Result<Review> {
    Ok(Review {
        id: row.get(0)?,
        campground_id: row.get(1)?,
        author_id: row.get(2)?,
        author_username: row.get(3)?,
        rating: row.get(4)?,
        comment: row.get(5)?,
        created_at: parse_timestamp(&row.get::<_, String>(6)?),
    })
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|ndt| ndt.and_utc())
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}
