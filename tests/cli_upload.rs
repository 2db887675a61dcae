//! `boat` driven through `cli::run_client_with` against a live daemon.

mod integration;

use std::path::Path;

use checksums::sha256_hex;
use cli::ClientEnvironment;
use integration::helpers::*;

fn write_config(home: &Path, server: &TestServer, user: &str) {
    std::fs::write(
        home.join(cli::CLIENT_CONFIG_FILE),
        format!(
            "username = {user}\nkey = k\nhost = 127.0.0.1\nport = {}\n",
            server.addr().port()
        ),
    )
    .unwrap();
}

fn boat(args: &[&str], environment: ClientEnvironment<&[u8]>) -> (i32, String) {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut argv = vec!["boat"];
    argv.extend_from_slice(args);
    let status = cli::run_client_with(argv, environment, &mut stdout, &mut stderr);
    assert!(stdout.is_empty());
    (status, String::from_utf8(stderr).unwrap())
}

#[test]
fn file_upload_is_stored_under_its_base_name() {
    let server = TestServer::background();
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), &server, "alice");
    let source = home.path().join("report.txt");
    std::fs::write(&source, b"Q3 revenue: up\n").unwrap();

    let (status, stderr) = boat(
        &[source.to_str().unwrap()],
        ClientEnvironment::new(&[][..]).with_home(home.path()),
    );
    assert_eq!(status, 0, "{stderr}");
    assert!(stderr.is_empty());

    let current = server.current("alice", "report.txt").unwrap();
    assert_eq!(current.digest(), &sha256_hex(b"Q3 revenue: up\n"));
}

#[test]
fn second_identical_upload_is_deduplicated() {
    let server = TestServer::background();
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), &server, "bob");
    let source = home.path().join("report.txt");
    std::fs::write(&source, b"unchanged").unwrap();

    for _ in 0..2 {
        let (status, stderr) = boat(
            &[source.to_str().unwrap()],
            ClientEnvironment::new(&[][..]).with_home(home.path()),
        );
        assert_eq!(status, 0, "{stderr}");
    }
    let versions = server.storage().repository("bob", false).versions("report.txt").unwrap();
    assert_eq!(versions.len(), 1);
}

#[test]
fn stdin_upload_uses_the_destination_name() {
    let server = TestServer::background();
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), &server, "alice");

    let (status, stderr) = boat(
        &["-", "build log.txt"],
        ClientEnvironment::new(&b"compiling boat\n"[..]).with_home(home.path()),
    );
    assert_eq!(status, 0, "{stderr}");

    let current = server.current("alice", "build+log.txt").unwrap();
    assert_eq!(std::fs::read(current.version_path()).unwrap(), b"compiling boat\n");
}

#[test]
fn environment_key_replaces_the_configured_one() {
    let server = TestServer::background();
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), &server, "alice");
    let source = home.path().join("secret.txt");
    std::fs::write(&source, b"x").unwrap();

    let (status, stderr) = boat(
        &[source.to_str().unwrap()],
        ClientEnvironment::new(&[][..])
            .with_home(home.path())
            .with_key("wrong"),
    );
    assert_eq!(status, 1);
    assert_eq!(stderr, "boat: PASS rejected: 401 invalid username or password\n");
    assert!(server.current("alice", "secret.txt").is_none());
}

#[test]
fn occupied_slot_is_reported() {
    let server = TestServer::background();
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), &server, "bob");
    let source = home.path().join("fixed.txt");

    std::fs::write(&source, b"first").unwrap();
    let (status, _) = boat(
        &[source.to_str().unwrap()],
        ClientEnvironment::new(&[][..]).with_home(home.path()),
    );
    assert_eq!(status, 0);

    std::fs::write(&source, b"second").unwrap();
    let (status, stderr) = boat(
        &[source.to_str().unwrap()],
        ClientEnvironment::new(&[][..]).with_home(home.path()),
    );
    assert_eq!(status, 1);
    assert!(stderr.contains("500 file already exists"), "{stderr}");
}
