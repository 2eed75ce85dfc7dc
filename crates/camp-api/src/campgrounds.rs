use axum::{
    extract::{Multipart, Path, State},
    response::{Html, Redirect},
};
use camp_types::models::FlashKind;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::guards::{AuthUser, require_campground_author};
use crate::session::{self, SessionContext, flash, flash_redirect};
use crate::state::{AppState, with_db};
use crate::uploads::{CampgroundSubmission, release, upload_all};
use crate::views;

pub async fn index(State(state): State<AppState>, session: SessionContext) -> Result<Html<String>, AppError> {
    let campgrounds = with_db(&state, |db| db.list_campgrounds()).await?;
    let page = session::page(&state, &session).await?;
    Ok(Html(views::campground_index(&page, &campgrounds).into_string()))
}

pub async fn new_form(
    State(state): State<AppState>,
    session: SessionContext,
    _user: AuthUser,
) -> Result<Html<String>, AppError> {
    let page = session::page(&state, &session).await?;
    Ok(Html(views::campground_new(&page).into_string()))
}

pub async fn create(
    State(state): State<AppState>,
    session: SessionContext,
    AuthUser(user): AuthUser,
    multipart: Multipart,
) -> Result<Redirect, AppError> {
    let submission = CampgroundSubmission::read(multipart).await?;
    let input = submission.form.validated()?;
    let images = upload_all(&state, submission.images).await?;

    let id = Uuid::new_v4().to_string();
    let stored = {
        let (id, author, images) = (id.clone(), user.id.clone(), images.clone());
        with_db(&state, move |db| db.insert_campground(&id, &author, &input, &images)).await
    };
    if let Err(e) = stored {
        release(&state, &images).await;
        return Err(e);
    }

    info!("{} created campground {} with {} images", user.username, id, images.len());
    flash(&state, &session.id, FlashKind::Success, "Successfully made a new campground").await?;
    Ok(Redirect::to(&format!("/campground/{id}")))
}

pub async fn show(
    State(state): State<AppState>,
    session: SessionContext,
    Path(id): Path<String>,
) -> Result<Html<String>, AppError> {
    let Some(detail) = with_db(&state, move |db| db.get_campground_detail(&id)).await? else {
        return Err(flash_redirect(&state, &session, "Cannot find that campground", "/campground").await);
    };
    let page = session::page(&state, &session).await?;
    Ok(Html(views::campground_show(&page, &detail).into_string()))
}

pub async fn edit_form(
    State(state): State<AppState>,
    session: SessionContext,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Html<String>, AppError> {
    let campground = require_campground_author(&state, &session, &user, &id).await?;
    let page = session::page(&state, &session).await?;
    Ok(Html(views::campground_edit(&page, &campground).into_string()))
}

pub async fn update(
    State(state): State<AppState>,
    session: SessionContext,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Redirect, AppError> {
    let campground = require_campground_author(&state, &session, &user, &id).await?;
    let submission = CampgroundSubmission::read(multipart).await?;
    let input = submission.form.validated()?;
    let images = upload_all(&state, submission.images).await?;

    let updated = {
        let (id, images) = (id.clone(), images.clone());
        with_db(&state, move |db| db.update_campground(&id, &input, &images)).await
    };
    match updated {
        Ok(true) => {}
        Ok(false) => {
            release(&state, &images).await;
            return Err(flash_redirect(&state, &session, "Cannot find that campground", "/campground").await);
        }
        Err(e) => {
            release(&state, &images).await;
            return Err(e);
        }
    }

    // Names that are not this campground's images are ignored.
    let doomed: Vec<_> = campground
        .images
        .into_iter()
        .filter(|image| submission.delete_images.contains(&image.filename))
        .collect();
    if !doomed.is_empty() {
        // An image leaves the list only once the asset host has let it go.
        let mut destroyed = Vec::with_capacity(doomed.len());
        let mut failure = None;
        for image in doomed {
            match state.assets.destroy(&image.filename).await {
                Ok(()) => destroyed.push(image.filename),
                Err(e) => {
                    failure = Some(e.context(format!("failed to destroy image {}", image.filename)));
                    break;
                }
            }
        }

        let cid = id.clone();
        let removed = with_db(&state, move |db| db.remove_images(&cid, &destroyed)).await?;
        info!("Removed {} images from campground {}", removed.len(), id);
        if let Some(e) = failure {
            return Err(AppError::Internal(e));
        }
    }

    flash(&state, &session.id, FlashKind::Success, "Successfully updated campground").await?;
    Ok(Redirect::to(&format!("/campground/{id}")))
}

pub async fn destroy(
    State(state): State<AppState>,
    session: SessionContext,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    require_campground_author(&state, &session, &user, &id).await?;

    let target = id.clone();
    let Some(images) = with_db(&state, move |db| db.delete_campground(&target)).await? else {
        return Err(flash_redirect(&state, &session, "Cannot find that campground", "/campground").await);
    };
    release(&state, &images).await;

    info!("{} deleted campground {}", user.username, id);
    flash(&state, &session.id, FlashKind::Success, "Successfully deleted campground").await?;
    Ok(Redirect::to("/campground"))
}
