//! Checks that run before a handler body and may short-circuit it.

use axum::{
    extract::FromRequestParts,
    http::{Method, request::Parts},
};
use camp_types::models::{Campground, CurrentUser, Review};
use tracing::info;

use crate::error::AppError;
use crate::session::{SessionContext, flash_redirect};
use crate::state::{AppState, with_db};

/// Auth context for handlers that require a signed-in user. Extracting it
/// redirects anonymous visitors to the login page, remembering where they
/// were headed.
#[derive(Debug, Clone)]
pub struct AuthUser(pub CurrentUser);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = SessionContext::from_request_parts(parts, state).await?;
        if let Some(user) = session.user {
            return Ok(AuthUser(user));
        }

        // Only GETs can be replayed by a redirect after login.
        if parts.method == Method::GET {
            let target = parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str().to_owned())
                .unwrap_or_else(|| parts.uri.path().to_owned());
            let id = session.id.clone();
            with_db(state, move |db| db.set_return_to(&id, &target)).await?;
        }

        Err(flash_redirect(state, &session, "You must be signed in first", "/login").await)
    }
}

/// Loads a campground the user is allowed to change.
pub async fn require_campground_author(
    state: &AppState,
    session: &SessionContext,
    user: &CurrentUser,
    campground_id: &str,
) -> Result<Campground, AppError> {
    let id = campground_id.to_owned();
    let Some(campground) = with_db(state, move |db| db.get_campground(&id)).await? else {
        return Err(flash_redirect(state, session, "Cannot find that campground", "/campground").await);
    };

    if !campground.is_authored_by(&user.id) {
        info!("{} is not the author of campground {}", user.username, campground_id);
        return Err(flash_redirect(
            state,
            session,
            "You do not have permission to do that",
            format!("/campground/{campground_id}"),
        )
        .await);
    }

    Ok(campground)
}

/// Loads a review of the given campground that the user wrote.
pub async fn require_review_author(
    state: &AppState,
    session: &SessionContext,
    user: &CurrentUser,
    campground_id: &str,
    review_id: &str,
) -> Result<Review, AppError> {
    let back = format!("/campground/{campground_id}");
    let id = review_id.to_owned();
    let review = with_db(state, move |db| db.get_review(&id))
        .await?
        .filter(|r| r.campground_id == campground_id);
    let Some(review) = review else {
        return Err(flash_redirect(state, session, "Cannot find that review", back).await);
    };

    if review.author_id != user.id {
        info!("{} is not the author of review {}", user.username, review_id);
        return Err(flash_redirect(state, session, "You do not have permission to do that", back).await);
    }

    Ok(review)
}
