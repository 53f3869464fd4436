//! Mock photo-storage servers for tests.
//!
//! Every `expect_*` helper registers an expectation that must be hit exactly
//! once; the server panics on drop otherwise, and answers unexpected requests
//! with a 500.

use httptest::{matchers::*, responders::*, Expectation};
use serde_json::json;
use std::time::Duration;

pub use httptest;
pub use httptest::Server;

/// Start an empty mock server.
pub fn photo_server() -> Server {
    Server::run()
}

/// Base URL to hand to an `ApiClient`.
pub fn base_url(server: &Server) -> String {
    server.url_str("/").trim_end_matches('/').to_string()
}

/// Create a mock server for the login endpoint.
/// The server will respond to POST `/auth/login` with a fixed token.
pub fn login_server(token: &str) -> Server {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("POST", "/auth/login")).respond_with(
            json_encoded(json!({
                "token": token,
                "message": "Login successful"
            })),
        ),
    );
    server
}

/// Expect `GET /photos` answered with `body` in the id-list encoding.
pub fn expect_listing(server: &Server, body: &str) {
    server.expect(
        Expectation::matching(request::method_path("GET", "/photos"))
            .respond_with(status_code(200).body(body.to_string())),
    );
}

/// Expect one `GET /photos/{id}` per id, each answered with `photo-{id}`.
pub fn expect_photos(server: &Server, ids: &[u64]) {
    for id in ids {
        server.expect(
            Expectation::matching(request::method_path("GET", format!("/photos/{}", id)))
                .respond_with(
                    status_code(200)
                        .insert_header("content-type", "image/jpeg")
                        .body(format!("photo-{}", id)),
                ),
        );
    }
}

/// Expect `GET /photos/{id}` answered with `status`.
pub fn expect_photo_status(server: &Server, id: u64, status: u16) {
    server.expect(
        Expectation::matching(request::method_path("GET", format!("/photos/{}", id)))
            .respond_with(status_code(status)),
    );
}

/// Expect `GET /albums` answered with the given albums as JSON.
pub fn expect_albums(server: &Server, albums: &[(u64, &str, u64)]) {
    let body: Vec<_> = albums
        .iter()
        .map(|(id, name, owner)| json!({ "id": id, "name": name, "ownerId": owner }))
        .collect();
    server.expect(
        Expectation::matching(request::method_path("GET", "/albums"))
            .respond_with(json_encoded(json!(body))),
    );
}

/// Expect `GET /albums/{name}/photos` answered with `body`.
pub fn expect_album_listing(server: &Server, album_name: &str, body: &str) {
    server.expect(
        Expectation::matching(request::method_path(
            "GET",
            format!("/albums/{}/photos", album_name),
        ))
        .respond_with(status_code(200).body(body.to_string())),
    );
}

/// Like [`expect_album_listing`] but the answer only starts after `delay`.
pub fn expect_slow_album_listing(server: &Server, album_name: &str, body: &str, delay: Duration) {
    server.expect(
        Expectation::matching(request::method_path(
            "GET",
            format!("/albums/{}/photos", album_name),
        ))
        .respond_with(delay_and_then(
            delay,
            status_code(200).body(body.to_string()),
        )),
    );
}

fn expect_link_with(server: &Server, album_id: u64, ids: &[u64], responder: impl Responder + 'static) {
    let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", format!("/albums/{}/photos/link", album_id)),
            request::headers(contains(("content-type", "application/x-www-form-urlencoded"))),
            request::body(format!("photoIds={}", ids.join(","))),
        ])
        .respond_with(responder),
    );
}

/// Expect `POST /albums/{id}/photos/link` with `photoIds=<ids>` as a form body,
/// answered with `status` and `body`.
pub fn expect_link(server: &Server, album_id: u64, ids: &[u64], status: u16, body: &str) {
    expect_link_with(server, album_id, ids, status_code(status).body(body.to_string()));
}

/// Like [`expect_link`] but the `200` answer only starts after `delay`.
pub fn expect_slow_link(server: &Server, album_id: u64, ids: &[u64], delay: Duration) {
    expect_link_with(
        server,
        album_id,
        ids,
        delay_and_then(delay, status_code(200).body("ok")),
    );
}
