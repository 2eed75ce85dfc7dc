pub mod assets;
pub mod auth;
pub mod campgrounds;
pub mod cleanup;
pub mod error;
pub mod guards;
pub mod method_override;
pub mod reviews;
pub mod session;
pub mod state;
pub mod uploads;
pub mod views;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request, State},
    middleware,
    response::Html,
    routing::{delete, get, post},
};
use tower::Layer;
use tower::util::{MapRequest, MapRequestLayer};
use tower_http::services::ServeDir;

use crate::error::AppError;
use crate::session::SessionContext;
use crate::state::AppState;

/// Local uploads are served from here.
pub const MEDIA_PATH: &str = "/media";

/// Whole-request cap; individual images are capped in `uploads`.
const MAX_BODY_SIZE: usize = 50 * 1024 * 1024;

/// The router wrapped so HTML forms can reach PUT/DELETE routes.
pub type App = MapRequest<Router, fn(Request) -> Request>;

pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/", get(home))
        .route("/campground", get(campgrounds::index).post(campgrounds::create))
        .route("/campground/new", get(campgrounds::new_form))
        .route(
            "/campground/{id}",
            get(campgrounds::show)
                .put(campgrounds::update)
                .delete(campgrounds::destroy),
        )
        .route("/campground/{id}/edit", get(campgrounds::edit_form))
        .route("/campground/{id}/review", post(reviews::create))
        .route("/campground/{id}/review/{review_id}", delete(reviews::destroy))
        .route("/register", get(auth::register_form).post(auth::register))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/logout", get(auth::logout))
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), session::load_session))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE));

    if let Some(dir) = state.assets.local_dir() {
        app = app.nest_service(MEDIA_PATH, ServeDir::new(dir));
    }

    app.with_state(state)
}

/// Rewrites `POST ...?_method=PUT|PATCH|DELETE` before routing.
pub fn with_method_override(router: Router) -> App {
    MapRequestLayer::new(method_override::apply as fn(Request) -> Request).layer(router)
}

async fn home(State(state): State<AppState>, session: SessionContext) -> Result<Html<String>, AppError> {
    let page = session::page(&state, &session).await?;
    Ok(Html(views::home(&page).into_string()))
}

async fn not_found() -> AppError {
    AppError::NotFound
}
