use anyhow::anyhow;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, header::SET_COOKIE, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use camp_db::sessions::SESSION_TTL_SECS;
use camp_types::models::{CurrentUser, FlashKind};
use tracing::debug;

use crate::error::AppError;
use crate::state::{AppState, with_db};
use crate::views::Page;

pub const SESSION_COOKIE: &str = "camp_session";

/// The cookie session behind the current request.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub id: String,
    pub user: Option<CurrentUser>,
}

/// Loads the session named by the cookie, or starts an anonymous one and
/// hands its cookie to the client.
pub async fn load_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let jar = CookieJar::from_headers(req.headers());
    let existing = match jar.get(SESSION_COOKIE).map(|c| c.value().to_owned()) {
        Some(id) => with_db(&state, move |db| db.get_session(&id)).await?,
        None => None,
    };

    let (session, fresh) = match existing {
        Some(row) => (
            SessionContext {
                id: row.id,
                user: row.user,
            },
            false,
        ),
        None => {
            let id = with_db(&state, |db| db.create_session(None)).await?;
            debug!("Started anonymous session");
            (SessionContext { id, user: None }, true)
        }
    };

    let cookie = fresh.then(|| session_cookie(&session.id, state.secure_cookies));
    req.extensions_mut().insert(session);
    let mut response = next.run(req).await;

    // A handler that rotated the session already set the newer cookie.
    if let Some(cookie) = cookie {
        if !response.headers().contains_key(SET_COOKIE) {
            let value = HeaderValue::from_str(&cookie)
                .map_err(|e| AppError::Internal(anyhow!("bad session cookie: {}", e)))?;
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
    Ok(response)
}

impl FromRequestParts<AppState> for SessionContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionContext>()
            .cloned()
            .ok_or_else(|| AppError::Internal(anyhow!("session middleware is not installed")))
    }
}

/// `Set-Cookie` value for a session id.
pub fn session_cookie(id: &str, secure: bool) -> String {
    let cookie = Cookie::build((SESSION_COOKIE, id.to_owned()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build();
    format!("{cookie}; Max-Age={SESSION_TTL_SECS}")
}

/// Swaps the session for a fresh id bound to `user_id` (None logs out).
/// Returns the `Set-Cookie` header to send with the response.
pub async fn rotate(
    state: &AppState,
    session: &SessionContext,
    user_id: Option<String>,
) -> Result<(String, [(axum::http::HeaderName, String); 1]), AppError> {
    let old = session.id.clone();
    let new_id = with_db(state, move |db| db.rotate_session(&old, user_id.as_deref())).await?;
    let header = [(SET_COOKIE, session_cookie(&new_id, state.secure_cookies))];
    Ok((new_id, header))
}

pub async fn flash(
    state: &AppState,
    session_id: &str,
    kind: FlashKind,
    message: impl Into<String>,
) -> Result<(), AppError> {
    let id = session_id.to_owned();
    let message = message.into();
    with_db(state, move |db| db.push_flash(&id, kind, &message)).await
}

/// Records an error flash and produces the redirect that shows it.
pub async fn flash_redirect(
    state: &AppState,
    session: &SessionContext,
    message: impl Into<String>,
    to: impl Into<String>,
) -> AppError {
    match flash(state, &session.id, FlashKind::Error, message).await {
        Ok(()) => AppError::Redirect(to.into()),
        Err(e) => e,
    }
}

/// Everything a rendered page needs from the session. Consumes pending
/// flash messages.
pub async fn page(state: &AppState, session: &SessionContext) -> Result<Page, AppError> {
    let id = session.id.clone();
    let flashes = with_db(state, move |db| db.take_flashes(&id)).await?;
    Ok(Page {
        user: session.user.clone(),
        flashes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_is_http_only_and_week_long() {
        let cookie = session_cookie("abc", false);
        assert!(cookie.starts_with("camp_session=abc"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.ends_with("Max-Age=604800"));
        assert!(!cookie.contains("Secure"));
        assert!(session_cookie("abc", true).contains("Secure"));
    }
}
