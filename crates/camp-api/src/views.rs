//! HTML pages.

use axum::http::StatusCode;
use camp_types::models::{Campground, CampgroundDetail, CurrentUser, Flash, FlashKind};
use maud::{DOCTYPE, Markup, html};

/// Per-request data every page shows: who is signed in and the pending
/// flash messages.
#[derive(Debug, Default)]
pub struct Page {
    pub user: Option<CurrentUser>,
    pub flashes: Vec<Flash>,
}

impl Page {
    fn is_author(&self, campground: &Campground) -> bool {
        self.user.as_ref().is_some_and(|u| campground.is_authored_by(&u.id))
    }
}

// ============================================================================
// Layout
// ============================================================================

fn layout(title: &str, page: &Page, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) " · Campgrounds" }
            }
            body {
                (navbar(page.user.as_ref()))
                main {
                    @for flash in &page.flashes {
                        div class={ "flash flash-" (flash.kind.as_str()) } role="alert" {
                            @if flash.kind == FlashKind::Error { strong { "Error: " } }
                            (flash.message)
                        }
                    }
                    (content)
                }
            }
        }
    }
}

fn navbar(user: Option<&CurrentUser>) -> Markup {
    html! {
        nav {
            a href="/" { "Home" }
            " "
            a href="/campground" { "Campgrounds" }
            " "
            a href="/campground/new" { "New campground" }
            span.nav-account {
                @if let Some(user) = user {
                    "Signed in as " (user.username) " "
                    a href="/logout" { "Logout" }
                } @else {
                    a href="/login" { "Login" }
                    " "
                    a href="/register" { "Register" }
                }
            }
        }
    }
}

fn campground_fields(campground: Option<&Campground>) -> Markup {
    let value = |f: fn(&Campground) -> String| campground.map(f).unwrap_or_default();
    html! {
        label for="title" { "Title" }
        input #title type="text" name="title" required value=(value(|c| c.title.clone()));
        label for="location" { "Location" }
        input #location type="text" name="location" required value=(value(|c| c.location.clone()));
        label for="price" { "Price per night" }
        input #price type="number" name="price" min="0" step="0.01" required value=(value(|c| c.price.to_string()));
        label for="description" { "Description" }
        textarea #description name="description" required { (value(|c| c.description.clone())) }
        label for="image" { "Add images" }
        input #image type="file" name="image" accept="image/*" multiple;
    }
}

// ============================================================================
// Pages
// ============================================================================

pub fn home(page: &Page) -> Markup {
    layout(
        "Welcome",
        page,
        html! {
            h1 { "Campgrounds" }
            p { "Find a place to pitch your tent, and tell others how it went." }
            a href="/campground" { "View campgrounds" }
        },
    )
}

pub fn campground_index(page: &Page, campgrounds: &[Campground]) -> Markup {
    layout(
        "All campgrounds",
        page,
        html! {
            h1 { "All campgrounds" }
            @if campgrounds.is_empty() {
                p { "No campgrounds yet." }
            }
            @for campground in campgrounds {
                article.campground-card {
                    @if let Some(image) = campground.images.first() {
                        img src=(image.thumbnail()) alt=(campground.title) loading="lazy";
                    }
                    h2 { (campground.title) }
                    p { (campground.description) }
                    p { small { (campground.location) } }
                    a href={ "/campground/" (campground.id) } { "View " (campground.title) }
                }
            }
        },
    )
}

pub fn campground_new(page: &Page) -> Markup {
    layout(
        "New campground",
        page,
        html! {
            h1 { "New campground" }
            form action="/campground" method="post" enctype="multipart/form-data" {
                (campground_fields(None))
                button type="submit" { "Add campground" }
            }
            a href="/campground" { "All campgrounds" }
        },
    )
}

pub fn campground_show(page: &Page, detail: &CampgroundDetail) -> Markup {
    let campground = &detail.campground;
    let base = format!("/campground/{}", campground.id);
    layout(
        &campground.title,
        page,
        html! {
            article.campground {
                @for image in &campground.images {
                    img src=(image.url) alt=(campground.title);
                }
                h1 { (campground.title) }
                p { (campground.description) }
                ul {
                    li { (campground.location) }
                    li { "Submitted by " (campground.author_username) }
                    li { (format!("${:.2}/night", campground.price)) }
                }
                @if page.is_author(campground) {
                    a href={ (base) "/edit" } { "Edit" }
                    form action={ (base) "?_method=DELETE" } method="post" {
                        button type="submit" { "Delete" }
                    }
                }
            }

            section.reviews {
                @if page.user.is_some() {
                    h2 { "Leave a review" }
                    form action={ (base) "/review" } method="post" {
                        label for="rating" { "Rating" }
                        input #rating type="range" name="rating" min="1" max="5" value="3";
                        label for="comment" { "Review" }
                        textarea #comment name="comment" required {}
                        button type="submit" { "Submit" }
                    }
                }
                @for review in &detail.reviews {
                    div.review {
                        h3 { (review.author_username) }
                        p { "Rated " (review.rating) " / 5" }
                        p { (review.comment) }
                        @if page.user.as_ref().is_some_and(|u| u.id == review.author_id) {
                            form action={ (base) "/review/" (review.id) "?_method=DELETE" } method="post" {
                                button type="submit" { "Delete" }
                            }
                        }
                    }
                }
            }
        },
    )
}

pub fn campground_edit(page: &Page, campground: &Campground) -> Markup {
    layout(
        "Edit campground",
        page,
        html! {
            h1 { "Edit " (campground.title) }
            form action={ "/campground/" (campground.id) "?_method=PUT" } method="post" enctype="multipart/form-data" {
                (campground_fields(Some(campground)))
                @if !campground.images.is_empty() {
                    fieldset {
                        legend { "Remove images" }
                        @for (i, image) in campground.images.iter().enumerate() {
                            label for={ "image-" (i) } {
                                img src=(image.thumbnail()) alt="";
                                input id={ "image-" (i) } type="checkbox" name="deleteImages[]" value=(image.filename);
                            }
                        }
                    }
                }
                button type="submit" { "Update campground" }
            }
            a href={ "/campground/" (campground.id) } { "Back to campground" }
        },
    )
}

pub fn register(page: &Page) -> Markup {
    layout(
        "Register",
        page,
        html! {
            h1 { "Register" }
            form action="/register" method="post" {
                label for="username" { "Username" }
                input #username type="text" name="username" required;
                label for="email" { "Email" }
                input #email type="email" name="email" required;
                label for="password" { "Password" }
                input #password type="password" name="password" required;
                button type="submit" { "Register" }
            }
        },
    )
}

pub fn login(page: &Page) -> Markup {
    layout(
        "Login",
        page,
        html! {
            h1 { "Login" }
            form action="/login" method="post" {
                label for="username" { "Username" }
                input #username type="text" name="username" required;
                label for="password" { "Password" }
                input #password type="password" name="password" required;
                button type="submit" { "Login" }
            }
        },
    )
}

pub fn error_page(status: StatusCode, message: &str) -> Markup {
    layout(
        status.canonical_reason().unwrap_or("Error"),
        &Page::default(),
        html! {
            h1 { (status.as_u16()) }
            p.error-message { (message) }
            a href="/campground" { "Back to campgrounds" }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_page_escapes_the_message() {
        let html = error_page(StatusCode::BAD_REQUEST, "<script>").into_string();
        assert!(html.contains("400"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn flashes_render_with_their_kind() {
        let page = Page {
            user: None,
            flashes: vec![Flash {
                kind: FlashKind::Success,
                message: "Saved".into(),
            }],
        };
        let html = home(&page).into_string();
        assert!(html.contains("flash-success"));
        assert!(html.contains("Saved"));
        assert!(html.contains("href=\"/login\""));
    }
}
