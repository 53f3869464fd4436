use assert_cmd::Command;
use httpmock::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

fn arda(home: &TempDir, server: &MockServer) -> Command {
    let mut cmd = Command::cargo_bin("arda").unwrap();
    cmd.env("HOME", home.path());
    cmd.env_remove("ARDA_TOKEN");
    cmd.args(["--base-url", &server.base_url(), "--log-level", "warn"]);
    cmd
}

fn mock_vacation(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET).path("/albums");
        then.status(200)
            .json_body(serde_json_body(r#"[{"id":7,"name":"Vacation","ownerId":1}]"#));
    });
    server.mock(|when, then| {
        when.method(GET).path("/photos");
        then.status(200).body("List(1, 2, 3)");
    });
    for id in 1..=3 {
        server.mock(|when, then| {
            when.method(GET).path(format!("/photos/{}", id));
            then.status(200)
                .header("content-type", "image/jpeg")
                .body(format!("photo-{}", id));
        });
    }
}

fn serde_json_body(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap()
}

#[test]
fn help() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("arda")?;
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Arda photo client"));
    Ok(())
}

#[test]
fn photos_prints_decoded_ids() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start();
    let listing = server.mock(|when, then| {
        when.method(GET)
            .path("/photos")
            .header("authorization", "Bearer secret");
        then.status(200).body("List(3, 7,9)");
    });

    arda(&home, &server)
        .args(["--token", "secret", "photos"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3\n7\n9\n"));
    listing.assert();
}

#[test]
fn malformed_listing_fails() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/albums/Vacation/photos");
        then.status(200).body("List(3, a, 9)");
    });

    arda(&home, &server)
        .args(["--token", "t", "photos", "--album", "Vacation"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed id list"));
}

#[test]
fn missing_session_is_reported() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start();

    arda(&home, &server)
        .arg("albums")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not logged in"));
}

#[test]
fn login_stores_session_and_logout_clears_it() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path("/auth/login")
            .json_body(serde_json_body(r#"{"username":"frodo","password":"ring"}"#));
        then.status(200)
            .json_body(serde_json_body(r#"{"token":"abc","message":"Login successful"}"#));
    });
    let albums = server.mock(|when, then| {
        when.method(GET)
            .path("/albums")
            .header("authorization", "Bearer abc");
        then.status(200).body("[]");
    });

    arda(&home, &server)
        .args(["login", "--username", "frodo", "--password", "ring"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged in as frodo"));
    assert!(home.path().join(".arda").join("session.json").exists());

    arda(&home, &server)
        .arg("albums")
        .assert()
        .success()
        .stdout(predicate::str::contains("No albums"));
    albums.assert();

    arda(&home, &server)
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged out"));
    assert!(!home.path().join(".arda").join("session.json").exists());
}

#[test]
fn fetch_prints_paths_and_cleans_up() {
    let home = TempDir::new().unwrap();
    let spool = TempDir::new().unwrap();
    let server = MockServer::start();
    mock_vacation(&server);

    arda(&home, &server)
        .args(["--token", "t", "--spool-dir"])
        .arg(spool.path())
        .arg("fetch")
        .assert()
        .success()
        .stdout(predicate::str::contains("All Photos: 3 photo(s)"))
        .stdout(predicate::str::contains("2 -> "));
    assert_eq!(std::fs::read_dir(spool.path()).unwrap().count(), 0);
}

#[test]
fn link_reports_new_association() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start();
    mock_vacation(&server);
    let link = server.mock(|when, then| {
        when.method(POST)
            .path("/albums/7/photos/link")
            .body("photoIds=2,3");
        then.status(200).body("Linked 2 photos");
    });
    server.mock(|when, then| {
        when.method(GET).path("/albums/Vacation/photos");
        then.status(200).body("List(2, 3)");
    });

    arda(&home, &server)
        .args(["--token", "t", "link", "--album", "Vacation", "3", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Linked 2 photos"))
        .stdout(predicate::str::contains("Vacation now holds: 2, 3"));
    link.assert();
}

#[test]
fn link_with_failed_refresh_still_succeeds() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start();
    mock_vacation(&server);
    server.mock(|when, then| {
        when.method(POST).path("/albums/7/photos/link");
        then.status(200).body("ok");
    });
    server.mock(|when, then| {
        when.method(GET).path("/albums/Vacation/photos");
        then.status(500).body("boom");
    });

    arda(&home, &server)
        .args(["--token", "t", "link", "--album", "Vacation", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("were linked to album Vacation"));
}

#[test]
fn link_rejected_by_server_fails() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start();
    mock_vacation(&server);
    server.mock(|when, then| {
        when.method(POST).path("/albums/7/photos/link");
        then.status(403).body("not your album");
    });

    arda(&home, &server)
        .args(["--token", "t", "link", "--album", "Vacation", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to link photos to album Vacation"));
}

#[test]
fn link_to_unknown_album_fails() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start();
    mock_vacation(&server);

    arda(&home, &server)
        .args(["--token", "t", "link", "--album", "Work", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No album named Work"));
}
