use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

// Nothing listens on the discard port, so network commands fail fast.
const DEAD_SERVER: &str = "http://127.0.0.1:9";

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("ablog-cli").unwrap();
    cmd.env_remove("ABLOG_SERVER");
    cmd
}

#[test]
fn help_lists_commands() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("register"))
        .stdout(predicate::str::contains("bookmark"))
        .stdout(predicate::str::contains("preview"));
}

#[test]
fn status_without_token() {
    let dir = tempfile::tempdir().unwrap();
    cli()
        .arg("--token-file")
        .arg(dir.path().join("token"))
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No token found"));
}

#[test]
fn status_and_logout_with_saved_token() {
    let dir = tempfile::tempdir().unwrap();
    let token_file = dir.path().join("token");
    fs::write(&token_file, "eyJhbGciOiJIUzI1NiJ9.payload.signature").unwrap();

    cli()
        .arg("--token-file")
        .arg(&token_file)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("eyJhbGciOiJIUzI1NiJ9"));

    cli()
        .arg("--token-file")
        .arg(&token_file)
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged out"));

    assert!(!token_file.exists());
}

#[test]
fn invalid_schedule_is_rejected_before_any_request() {
    let dir = tempfile::tempdir().unwrap();
    cli()
        .args(["--server", DEAD_SERVER, "--token-file"])
        .arg(dir.path().join("token"))
        .args(["create", "--title", "Later", "--content", "Body", "--schedule", "tomorrow"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("RFC 3339"));
}

#[test]
fn unreachable_server_exits_with_error() {
    let dir = tempfile::tempdir().unwrap();
    cli()
        .args(["--server", DEAD_SERVER, "--token-file"])
        .arg(dir.path().join("token"))
        .args(["get", "--slug", "hello-world"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to load post 'hello-world'"));
}
