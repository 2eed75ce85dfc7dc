use axum::{
    Form,
    extract::{Path, State},
    response::Redirect,
};
use camp_types::forms::ReviewForm;
use camp_types::models::FlashKind;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::guards::{AuthUser, require_review_author};
use crate::session::{SessionContext, flash, flash_redirect};
use crate::state::{AppState, with_db};

pub async fn create(
    State(state): State<AppState>,
    session: SessionContext,
    AuthUser(user): AuthUser,
    Path(campground_id): Path<String>,
    Form(form): Form<ReviewForm>,
) -> Result<Redirect, AppError> {
    let input = form.validated()?;

    let review_id = Uuid::new_v4().to_string();
    let inserted = {
        let (rid, cid, author) = (review_id.clone(), campground_id.clone(), user.id.clone());
        with_db(&state, move |db| db.insert_review(&rid, &cid, &author, &input)).await?
    };
    if !inserted {
        return Err(flash_redirect(&state, &session, "Cannot find that campground", "/campground").await);
    }

    info!("{} reviewed campground {}", user.username, campground_id);
    flash(&state, &session.id, FlashKind::Success, "Created new review").await?;
    Ok(Redirect::to(&format!("/campground/{campground_id}")))
}

pub async fn destroy(
    State(state): State<AppState>,
    session: SessionContext,
    AuthUser(user): AuthUser,
    Path((campground_id, review_id)): Path<(String, String)>,
) -> Result<Redirect, AppError> {
    require_review_author(&state, &session, &user, &campground_id, &review_id).await?;

    let (cid, rid) = (campground_id.clone(), review_id.clone());
    if with_db(&state, move |db| db.delete_review(&cid, &rid)).await? {
        info!("{} deleted review {}", user.username, review_id);
        flash(&state, &session.id, FlashKind::Success, "Successfully deleted review").await?;
    }
    Ok(Redirect::to(&format!("/campground/{campground_id}")))
}
