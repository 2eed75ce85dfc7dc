//! Row types that never leave the store layer as-is.
//! Domain-facing shapes live in camp-types.

use camp_types::models::CurrentUser;

pub struct UserRow {
    pub id: String,
    pub username: String,
    /// Argon2 PHC string.
    pub password: String,
}

/// A live (unexpired) session with its user resolved.
#[derive(Debug, Clone)]
pub struct SessionRow {
    pub id: String,
    pub user: Option<CurrentUser>,
}
