use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The signed-in user attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    /// Asset-host identifier, unique within one campground.
    pub filename: String,
}

impl Image {
    /// 200px-wide rendition served by the asset host.
    pub fn thumbnail(&self) -> String {
        self.url.replacen("/upload", "/upload/w_200", 1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campground {
    pub id: String,
    pub title: String,
    pub location: String,
    pub description: String,
    pub price: f64,
    pub author_id: String,
    pub author_username: String,
    pub images: Vec<Image>,
    pub created_at: DateTime<Utc>,
}

impl Campground {
    pub fn is_authored_by(&self, user_id: &str) -> bool {
        self.author_id == user_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub campground_id: String,
    pub author_id: String,
    pub author_username: String,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// A campground with its reviews resolved, as shown on the detail page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampgroundDetail {
    pub campground: Campground,
    pub reviews: Vec<Review>,
}

// -- Flash --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(FlashKind::Success),
            "error" => Some(FlashKind::Error),
            _ => None,
        }
    }
}

/// One-shot notice shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}
