use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use camp_types::forms::ValidationFailure;
use thiserror::Error;
use tracing::error;

use crate::views;

/// Everything a handler can fail with.
///
/// Guard failures (not signed in, not the owner, resource gone) are
/// `Redirect`s: the flash message is recorded where the failure is
/// detected, so only the redirect is left to produce here.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Not found")]
    NotFound,

    #[error("redirect to {0}")]
    Redirect(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ValidationFailure> for AppError {
    fn from(failure: ValidationFailure) -> Self {
        AppError::Validation(failure.to_string())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::Validation(format!("Malformed form data: {}", err.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Redirect(to) => return Redirect::to(&to).into_response(),
            AppError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::Internal(e) => {
                error!("Request failed: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong".to_string(),
                )
            }
        };

        (status, Html(views::error_page(status, &message).into_string())).into_response()
    }
}
