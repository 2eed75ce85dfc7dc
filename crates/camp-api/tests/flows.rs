//! End-to-end flows through the full router: sessions, guards, uploads and
//! the store, with local media in a temp directory.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use camp_api::App;
use camp_api::assets::{AssetHost, LocalAssets};
use camp_api::state::{AppState, AppStateInner};
use camp_db::Database;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "----camp-test-boundary";

struct Harness {
    app: App,
    state: AppState,
    media: TempDir,
}

impl Harness {
    async fn new() -> Self {
        let media = tempfile::tempdir().unwrap();
        let assets = AssetHost::Local(LocalAssets::new(media.path().to_path_buf()).await.unwrap());
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            assets,
            secure_cookies: false,
        });
        let app = camp_api::with_method_override(camp_api::router(state.clone()));
        Self { app, state, media }
    }

    fn client(&self) -> Client {
        Client {
            app: self.app.clone(),
            cookie: None,
        }
    }
}

/// A browser stand-in that keeps the session cookie between requests.
struct Client {
    app: App,
    cookie: Option<String>,
}

impl Client {
    async fn send(&mut self, builder: axum::http::request::Builder, body: Body) -> Response<Body> {
        let builder = match &self.cookie {
            Some(cookie) => builder.header(header::COOKIE, cookie),
            None => builder,
        };
        let response = self.app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();

        if let Some(set) = response.headers().get(header::SET_COOKIE) {
            let pair = set.to_str().unwrap().split(';').next().unwrap().to_owned();
            self.cookie = Some(pair);
        }
        response
    }

    async fn get(&mut self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri), Body::empty()).await
    }

    async fn post_form(&mut self, uri: &str, body: &str) -> Response<Body> {
        let builder = Request::post(uri).header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        self.send(builder, Body::from(body.to_owned())).await
    }

    async fn post_multipart(&mut self, uri: &str, fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Response<Body> {
        let builder = Request::post(uri).header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
        self.send(builder, Body::from(multipart_body(fields, files))).await
    }

    async fn register(&mut self, username: &str) -> Response<Body> {
        let body = format!("username={username}&email={username}%40example.com&password=password123");
        self.post_form("/register", &body).await
    }

    async fn login(&mut self, username: &str, password: &str) -> Response<Body> {
        self.post_form("/login", &format!("username={username}&password={password}"))
            .await
    }

    async fn create_campground(&mut self, title: &str) -> String {
        let response = self
            .post_multipart(
                "/campground",
                &[
                    ("title", title),
                    ("location", "Lake Tahoe, California"),
                    ("price", "10"),
                    ("description", "Quiet spot by the water"),
                ],
                &[("lake.png", "image/png", &b"\x89PNG not really"[..])],
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        location(&response)
            .strip_prefix("/campground/")
            .unwrap()
            .to_owned()
    }
}

fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    for (file_name, content_type, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect without Location")
        .to_str()
        .unwrap()
        .to_owned()
}

async fn text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn campground_with_missing_field_is_rejected_and_not_stored() {
    let harness = Harness::new().await;
    let mut alice = harness.client();
    alice.register("alice").await;

    let response = alice
        .post_multipart(
            "/campground",
            &[("title", "Lakeview"), ("location", "Tahoe"), ("price", "10")],
            &[("lake.png", "image/png", &b"png"[..])],
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(text(response).await.contains("description is required"));
    assert!(harness.state.db.list_campgrounds().unwrap().is_empty());
    // validation runs before anything is uploaded
    assert_eq!(std::fs::read_dir(harness.media.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn non_image_upload_is_rejected() {
    let harness = Harness::new().await;
    let mut alice = harness.client();
    alice.register("alice").await;

    let response = alice
        .post_multipart(
            "/campground",
            &[("title", "Lakeview"), ("location", "Tahoe"), ("price", "10"), ("description", "Nice")],
            &[("notes.txt", "text/plain", &b"hello"[..])],
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(harness.state.db.list_campgrounds().unwrap().is_empty());
}

#[tokio::test]
async fn only_the_owner_can_delete_a_campground() {
    let harness = Harness::new().await;
    let mut alice = harness.client();
    let mut bob = harness.client();

    assert_eq!(location(&alice.register("alice").await), "/campground");
    let id = alice.create_campground("Lakeview").await;

    let campground = harness.state.db.get_campground(&id).unwrap().unwrap();
    assert_eq!(campground.title, "Lakeview");
    assert_eq!(campground.price, 10.0);
    assert_eq!(campground.images.len(), 1);
    let stored = harness.media.path().join(&campground.images[0].filename);
    assert!(stored.exists());

    let page = text(alice.get(&format!("/campground/{id}")).await).await;
    assert!(page.contains("Successfully made a new campground"));
    assert!(page.contains("Lakeview"));

    bob.register("bob").await;
    let review = bob
        .post_form(&format!("/campground/{id}/review"), "rating=4&comment=Great+lake")
        .await;
    assert_eq!(location(&review), format!("/campground/{id}"));
    assert_eq!(harness.state.db.count_reviews(&id).unwrap(), 1);

    let denied = bob.post_form(&format!("/campground/{id}?_method=DELETE"), "").await;
    assert_eq!(denied.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&denied), format!("/campground/{id}"));
    assert!(harness.state.db.get_campground(&id).unwrap().is_some());
    let page = text(bob.get(&format!("/campground/{id}")).await).await;
    assert!(page.contains("You do not have permission to do that"));

    let mut alice_again = harness.client();
    assert_eq!(location(&alice_again.login("alice", "password123").await), "/campground");
    let deleted = alice_again
        .post_form(&format!("/campground/{id}?_method=DELETE"), "")
        .await;
    assert_eq!(location(&deleted), "/campground");

    assert!(harness.state.db.get_campground(&id).unwrap().is_none());
    assert_eq!(harness.state.db.count_reviews(&id).unwrap(), 0);
    assert!(!stored.exists());

    let gone = alice_again.get(&format!("/campground/{id}")).await;
    assert_eq!(location(&gone), "/campground");
    let index = text(alice_again.get("/campground").await).await;
    assert!(index.contains("Cannot find that campground"));
}

#[tokio::test]
async fn only_the_author_can_delete_a_review() {
    let harness = Harness::new().await;
    let mut alice = harness.client();
    let mut bob = harness.client();
    alice.register("alice").await;
    bob.register("bob").await;

    let id = alice.create_campground("Pine Flats").await;
    bob.post_form(&format!("/campground/{id}/review"), "rating=2&comment=Too+many+ants")
        .await;
    let detail = harness.state.db.get_campground_detail(&id).unwrap().unwrap();
    assert_eq!(detail.reviews.len(), 1);
    let review_id = detail.reviews[0].id.clone();
    assert_eq!(detail.reviews[0].author_username, "bob");

    let denied = alice
        .post_form(&format!("/campground/{id}/review/{review_id}?_method=DELETE"), "")
        .await;
    assert_eq!(location(&denied), format!("/campground/{id}"));
    assert_eq!(harness.state.db.count_reviews(&id).unwrap(), 1);

    bob.post_form(&format!("/campground/{id}/review/{review_id}?_method=DELETE"), "")
        .await;
    assert_eq!(harness.state.db.count_reviews(&id).unwrap(), 0);
    let page = text(bob.get(&format!("/campground/{id}")).await).await;
    assert!(!page.contains("Too many ants"));
}

#[tokio::test]
async fn invalid_review_is_a_bad_request() {
    let harness = Harness::new().await;
    let mut alice = harness.client();
    alice.register("alice").await;
    let id = alice.create_campground("Lakeview").await;

    let response = alice
        .post_form(&format!("/campground/{id}/review"), "rating=9&comment=")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = text(response).await;
    assert!(body.contains("comment is not allowed to be empty"));
    assert!(body.contains("rating must be a whole number from 1 to 5"));
    assert_eq!(harness.state.db.count_reviews(&id).unwrap(), 0);
}

#[tokio::test]
async fn owner_can_update_and_drop_images() {
    let harness = Harness::new().await;
    let mut alice = harness.client();
    alice.register("alice").await;
    let id = alice.create_campground("Lakeview").await;
    let old = harness.state.db.get_campground(&id).unwrap().unwrap().images[0].clone();

    let response = alice
        .post_multipart(
            &format!("/campground/{id}?_method=PUT"),
            &[
                ("title", "Lakeview Deluxe"),
                ("location", "Tahoe"),
                ("price", "25.5"),
                ("description", "Now with showers"),
                ("deleteImages[]", old.filename.as_str()),
                ("deleteImages[]", "someone-elses.png"),
            ],
            &[("new.jpg", "image/jpeg", &b"jpeg bytes"[..])],
        )
        .await;
    assert_eq!(location(&response), format!("/campground/{id}"));

    let updated = harness.state.db.get_campground(&id).unwrap().unwrap();
    assert_eq!(updated.title, "Lakeview Deluxe");
    assert_eq!(updated.price, 25.5);
    assert_eq!(updated.images.len(), 1);
    assert!(updated.images[0].filename.ends_with(".jpg"));
    assert!(!harness.media.path().join(&old.filename).exists());

    let media = alice.get(&updated.images[0].url).await;
    assert_eq!(media.status(), StatusCode::OK);
}

#[tokio::test]
async fn duplicate_username_is_refused() {
    let harness = Harness::new().await;
    let mut first = harness.client();
    let mut second = harness.client();

    assert_eq!(location(&first.register("alice").await), "/campground");

    let response = second
        .post_form("/register", "username=alice&email=other%40example.com&password=password123")
        .await;
    assert_eq!(location(&response), "/register");
    let page = text(second.get("/register").await).await;
    assert!(page.contains("A user with the given username is already registered"));

    // still anonymous
    let guarded = second.get("/campground/new").await;
    assert_eq!(location(&guarded), "/login");
    // the original password still works, and login resumes the guarded page
    assert_eq!(location(&second.login("alice", "password123").await), "/campground/new");
}

#[tokio::test]
async fn duplicate_email_is_refused() {
    let harness = Harness::new().await;
    let mut first = harness.client();
    let mut second = harness.client();
    first.register("alice").await;

    let response = second
        .post_form("/register", "username=alicia&email=alice%40example.com&password=password123")
        .await;
    assert_eq!(location(&response), "/register");
    let page = text(second.get("/register").await).await;
    assert!(page.contains("A user with the given email is already registered"));
    assert!(harness.state.db.get_user_by_username("alicia").unwrap().is_none());
}

#[tokio::test]
async fn login_returns_to_the_page_that_required_it() {
    let harness = Harness::new().await;
    let mut alice = harness.client();
    alice.register("alice").await;
    assert_eq!(location(&alice.get("/logout").await), "/campground");
    assert!(text(alice.get("/campground").await).await.contains("Goodbye!"));

    let guarded = alice.get("/campground/new").await;
    assert_eq!(location(&guarded), "/login");
    let login_page = text(alice.get("/login").await).await;
    assert!(login_page.contains("You must be signed in first"));

    let failed = alice.login("alice", "wrong-password").await;
    assert_eq!(location(&failed), "/login");
    assert!(text(alice.get("/login").await).await.contains("Password or username is incorrect"));

    let ok = alice.login("alice", "password123").await;
    assert_eq!(location(&ok), "/campground/new");
    assert_eq!(alice.get("/campground/new").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let harness = Harness::new().await;
    let mut visitor = harness.client();

    let response = visitor.get("/definitely/not/here").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(text(response).await.contains("Not found"));

    let home = visitor.get("/").await;
    assert_eq!(home.status(), StatusCode::OK);
}

#[tokio::test]
async fn wrong_method_on_a_known_path_is_not_found() {
    let harness = Harness::new().await;
    let mut alice = harness.client();
    alice.register("alice").await;
    let id = alice.create_campground("Lakeview").await;

    let patch = alice.post_form(&format!("/campground/{id}?_method=PATCH"), "").await;
    assert_eq!(patch.status(), StatusCode::NOT_FOUND);
    assert!(text(patch).await.contains("Not found"));

    let post = alice.post_form("/campground/new", "").await;
    assert_eq!(post.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_owner_cannot_edit_a_campground() {
    let harness = Harness::new().await;
    let mut alice = harness.client();
    let mut bob = harness.client();
    alice.register("alice").await;
    bob.register("bob").await;
    let id = alice.create_campground("Lakeview").await;
    let before = harness.state.db.get_campground(&id).unwrap().unwrap();

    let form = bob.get(&format!("/campground/{id}/edit")).await;
    assert_eq!(form.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&form), format!("/campground/{id}"));

    let response = bob
        .post_multipart(
            &format!("/campground/{id}?_method=PUT"),
            &[
                ("title", "Bob's Lake"),
                ("location", "Elsewhere"),
                ("price", "99"),
                ("description", "Mine now"),
                ("deleteImages[]", before.images[0].filename.as_str()),
            ],
            &[("extra.png", "image/png", &b"png"[..])],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/campground/{id}"));

    let after = harness.state.db.get_campground(&id).unwrap().unwrap();
    assert_eq!(after.title, "Lakeview");
    assert_eq!(after.price, before.price);
    assert_eq!(after.images, before.images);
    assert!(harness.media.path().join(&before.images[0].filename).exists());

    let page = text(bob.get(&format!("/campground/{id}")).await).await;
    assert!(page.contains("You do not have permission to do that"));
}

#[tokio::test]
async fn image_stays_listed_when_the_asset_host_cannot_destroy_it() {
    let harness = Harness::new().await;
    let mut alice = harness.client();
    alice.register("alice").await;
    let id = alice.create_campground("Lakeview").await;
    let image = harness.state.db.get_campground(&id).unwrap().unwrap().images[0].clone();

    // a directory in the file's place cannot be removed as a file
    let path = harness.media.path().join(&image.filename);
    std::fs::remove_file(&path).unwrap();
    std::fs::create_dir(&path).unwrap();

    let response = alice
        .post_multipart(
            &format!("/campground/{id}?_method=PUT"),
            &[
                ("title", "Lakeview"),
                ("location", "Tahoe"),
                ("price", "10"),
                ("description", "Quiet spot by the water"),
                ("deleteImages[]", image.filename.as_str()),
            ],
            &[],
        )
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let after = harness.state.db.get_campground(&id).unwrap().unwrap();
    assert_eq!(after.images, vec![image]);
    assert!(path.exists());
}
