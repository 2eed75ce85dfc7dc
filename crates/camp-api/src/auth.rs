use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Form,
    extract::State,
    response::{Html, IntoResponse, Redirect},
};
use camp_types::forms::{LoginForm, RegisterForm};
use camp_types::models::FlashKind;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::session::{self, SessionContext, flash, flash_redirect};
use crate::state::{AppState, with_db};
use crate::views;

pub async fn register_form(
    State(state): State<AppState>,
    session: SessionContext,
) -> Result<Html<String>, AppError> {
    let page = session::page(&state, &session).await?;
    Ok(Html(views::register(&page).into_string()))
}

pub async fn register(
    State(state): State<AppState>,
    session: SessionContext,
    Form(form): Form<RegisterForm>,
) -> Result<impl IntoResponse, AppError> {
    let form = match form.validated() {
        Ok(form) => form,
        Err(failure) => return Err(flash_redirect(&state, &session, failure.to_string(), "/register").await),
    };

    if let Some(field) = user_conflict(&state, &form).await? {
        return Err(already_registered(&state, &session, field).await);
    }

    let password_hash = hash_password(&form.password)?;
    let user_id = Uuid::new_v4().to_string();
    let created = {
        let (id, form) = (user_id.clone(), form.clone());
        with_db(&state, move |db| db.create_user(&id, &form.username, &form.email, &password_hash)).await?
    };
    if !created {
        // Lost a race with a concurrent registration.
        let field = user_conflict(&state, &form).await?.unwrap_or("username");
        return Err(already_registered(&state, &session, field).await);
    }
    info!("Registered user {}", form.username);

    let (new_id, cookie) = session::rotate(&state, &session, Some(user_id)).await?;
    flash(&state, &new_id, FlashKind::Success, "Welcome to Campgrounds!").await?;
    Ok((cookie, Redirect::to("/campground")))
}

pub async fn login_form(
    State(state): State<AppState>,
    session: SessionContext,
) -> Result<Html<String>, AppError> {
    let page = session::page(&state, &session).await?;
    Ok(Html(views::login(&page).into_string()))
}

pub async fn login(
    State(state): State<AppState>,
    session: SessionContext,
    Form(form): Form<LoginForm>,
) -> Result<impl IntoResponse, AppError> {
    let username = form.username.clone();
    let user = with_db(&state, move |db| db.get_user_by_username(&username)).await?;
    let Some(user) = user.filter(|u| verify_password(&form.password, &u.password)) else {
        info!("Failed login for {}", form.username);
        return Err(flash_redirect(&state, &session, "Password or username is incorrect", "/login").await);
    };

    let id = session.id.clone();
    let return_to = with_db(&state, move |db| db.take_return_to(&id))
        .await?
        .filter(|path| is_local_path(path))
        .unwrap_or_else(|| "/campground".to_owned());

    let (new_id, cookie) = session::rotate(&state, &session, Some(user.id.clone())).await?;
    flash(&state, &new_id, FlashKind::Success, "Welcome back!").await?;
    info!("{} logged in", user.username);
    Ok((cookie, Redirect::to(&return_to)))
}

pub async fn logout(State(state): State<AppState>, session: SessionContext) -> Result<impl IntoResponse, AppError> {
    let (new_id, cookie) = session::rotate(&state, &session, None).await?;
    flash(&state, &new_id, FlashKind::Success, "Goodbye!").await?;
    if let Some(user) = &session.user {
        info!("{} logged out", user.username);
    }
    Ok((cookie, Redirect::to("/campground")))
}

async fn user_conflict(state: &AppState, form: &RegisterForm) -> Result<Option<&'static str>, AppError> {
    let (username, email) = (form.username.clone(), form.email.clone());
    with_db(state, move |db| db.find_user_conflict(&username, &email)).await
}

async fn already_registered(state: &AppState, session: &SessionContext, field: &str) -> AppError {
    let message = format!("A user with the given {field} is already registered");
    flash_redirect(state, session, message, "/register").await
}

/// Argon2id PHC string for a password.
fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))
}

fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

/// Redirect targets must stay on this site.
fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//")
}
