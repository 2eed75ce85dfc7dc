//! Request bodies and their validation.
//!
//! Every form arrives loosely typed (all fields optional strings) and is
//! turned into a typed input struct by its `validated` method. All field
//! problems are reported together in one [`ValidationFailure`].

use serde::Deserialize;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

/// Aggregated field errors, rendered as one comma-separated message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .0.join(", "))]
pub struct ValidationFailure(pub Vec<String>);

// -- Campgrounds --

#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct CampgroundForm {
    #[validate(
        required(message = "title is required"),
        length(min = 1, message = "title is not allowed to be empty")
    )]
    pub title: Option<String>,
    #[validate(
        required(message = "location is required"),
        length(min = 1, message = "location is not allowed to be empty")
    )]
    pub location: Option<String>,
    #[validate(
        required(message = "price is required"),
        length(min = 1, message = "price is not allowed to be empty")
    )]
    pub price: Option<String>,
    #[validate(
        required(message = "description is required"),
        length(min = 1, message = "description is not allowed to be empty")
    )]
    pub description: Option<String>,
}

/// A campground payload that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct CampgroundInput {
    pub title: String,
    pub location: String,
    pub price: f64,
    pub description: String,
}

impl CampgroundForm {
    pub fn validated(self) -> Result<CampgroundInput, ValidationFailure> {
        let mut problems = field_problems(&self);

        let price = match self.price.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => match raw.parse::<f64>() {
                Ok(p) if p.is_finite() && p >= 0.0 => Some(p),
                _ => {
                    problems.push(("price".into(), "price must be a non-negative number".into()));
                    None
                }
            },
            _ => None,
        };

        finish(problems)?;

        Ok(CampgroundInput {
            title: self.title.unwrap_or_default(),
            location: self.location.unwrap_or_default(),
            price: price.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
        })
    }
}

// -- Reviews --

#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct ReviewForm {
    #[validate(required(message = "rating is required"))]
    pub rating: Option<String>,
    #[validate(
        required(message = "comment is required"),
        length(min = 1, message = "comment is not allowed to be empty")
    )]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewInput {
    pub rating: u8,
    pub comment: String,
}

impl ReviewForm {
    pub fn validated(self) -> Result<ReviewInput, ValidationFailure> {
        let mut problems = field_problems(&self);

        let rating = match self.rating.as_deref().map(str::trim) {
            Some(raw) => match raw.parse::<u8>() {
                Ok(r) if (1..=5).contains(&r) => Some(r),
                _ => {
                    problems.push(("rating".into(), "rating must be a whole number from 1 to 5".into()));
                    None
                }
            },
            None => None,
        };

        finish(problems)?;

        Ok(ReviewInput {
            rating: rating.unwrap_or_default(),
            comment: self.comment.unwrap_or_default(),
        })
    }
}

// -- Auth --

#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct RegisterForm {
    #[serde(default)]
    #[validate(length(min = 3, max = 32, message = "username must be 3 to 32 characters"))]
    pub username: String,
    #[serde(default)]
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
}

impl RegisterForm {
    pub fn validated(self) -> Result<Self, ValidationFailure> {
        finish(field_problems(&self))?;
        Ok(self)
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

// -- helpers --

type Problems = Vec<(String, String)>;

fn field_problems(form: &impl Validate) -> Problems {
    match form.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => flatten(&errors),
    }
}

fn flatten(errors: &ValidationErrors) -> Problems {
    let mut problems = Problems::new();
    for (field, errs) in errors.field_errors() {
        let field = field.to_string();
        for err in errs {
            let message = err
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("{field} is invalid"));
            problems.push((field.clone(), message));
        }
    }
    problems
}

fn finish(mut problems: Problems) -> Result<(), ValidationFailure> {
    if problems.is_empty() {
        return Ok(());
    }
    problems.sort_by(|a, b| a.0.cmp(&b.0));
    Err(ValidationFailure(
        problems.into_iter().map(|(_, message)| message).collect(),
    ))
}
