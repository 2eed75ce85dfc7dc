use axum::{extract::Request, http::Method};
use tracing::debug;

/// HTML forms only speak GET and POST; a POST carrying `_method=PUT`,
/// `PATCH` or `DELETE` in its query string is routed as that verb.
pub fn apply(mut req: Request) -> Request {
    if req.method() != Method::POST {
        return req;
    }

    let wanted = req
        .uri()
        .query()
        .and_then(|q| q.split('&').find_map(|pair| pair.strip_prefix("_method=")))
        .map(|m| m.to_ascii_uppercase());

    let method = match wanted.as_deref() {
        Some("PUT") => Method::PUT,
        Some("PATCH") => Method::PATCH,
        Some("DELETE") => Method::DELETE,
        _ => return req,
    };

    debug!("Overriding POST {} as {}", req.uri().path(), method);
    *req.method_mut() = method;
    req
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn post(uri: &str) -> Request {
        Request::builder().method(Method::POST).uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn post_with_override_becomes_that_verb() {
        assert_eq!(apply(post("/campground/1?_method=DELETE")).method(), Method::DELETE);
        assert_eq!(apply(post("/campground/1?x=1&_method=put")).method(), Method::PUT);
    }

    #[test]
    fn other_requests_are_untouched() {
        assert_eq!(apply(post("/campground/1?_method=GET")).method(), Method::POST);
        assert_eq!(apply(post("/campground")).method(), Method::POST);

        let get = Request::builder()
            .uri("/campground/1?_method=DELETE")
            .body(Body::empty())
            .unwrap();
        assert_eq!(apply(get).method(), Method::GET);
    }
}
