//! End-to-end CLI tests for the mirrordl binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn mirrordl() -> Command {
    Command::cargo_bin("mirrordl").unwrap()
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    mirrordl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Mirror a remote folder listing"))
        .stdout(predicate::str::contains("--allow-unknown-source"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    mirrordl()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mirrordl"));
}

/// Test that a missing URL is an argument error.
#[test]
fn test_binary_missing_url_returns_error() {
    mirrordl()
        .assert()
        .code(2)
        .stderr(predicate::str::contains("<URL>"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    mirrordl()
        .args(["https://5ur3kg.gq/?dir=public", "--invalid-flag"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("error"));
}

/// Test that an URL without scheme is rejected before any request.
#[test]
fn test_binary_url_without_scheme_is_rejected() {
    mirrordl()
        .arg("5ur3kg.gq/?dir=public")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("https://"));
}

/// Test that hosts outside the allowlist are rejected.
#[test]
fn test_binary_disallowed_host_is_rejected() {
    mirrordl()
        .arg("https://adf.rocks/?dir=public")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("adf.rocks"))
        .stderr(predicate::str::contains("--allow-unknown-source"));
}

/// Test that a forced html source requires a dir parameter.
#[test]
fn test_binary_html_source_without_dir_is_rejected() {
    mirrordl()
        .args(["https://5ur3kg.gq/public", "--source", "html"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("?dir="));
}

/// Test that an invalid regex is reported as an argument error.
#[test]
fn test_binary_invalid_regex_is_rejected() {
    mirrordl()
        .args(["https://5ur3kg.gq/?dir=public", "--regex", "(unclosed"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("(unclosed"));
}

/// Test that an invalid condition is reported as an argument error.
#[test]
fn test_binary_invalid_condition_is_rejected() {
    mirrordl()
        .args([
            "https://5ur3kg.gq/?dir=public",
            "--regex",
            r"(\d+)",
            "--condition",
            "__import__('os')",
        ])
        .assert()
        .code(2);
}

/// Test a complete walk against a mock index server.
#[tokio::test(flavor = "multi_thread")]
async fn test_binary_mirrors_index_tree() {
    let server = MockServer::start().await;
    let page = "<html><header><a href=\"?dir=\">Home</a><a href=\"?dir=music\">music</a></header>\
                <ul><li><a href=\"music/a.mp3\">a.mp3</a></li></ul></html>";
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("dir", "music"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/music/a.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"a".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let out = TempDir::new().expect("failed to create temp dir");
    let url = format!("{}/?dir=music", server.uri());
    let output = out.path().to_path_buf();
    tokio::task::spawn_blocking(move || {
        mirrordl()
            .args([url.as_str(), "--allow-unknown-source", "-o"])
            .arg(&output)
            .assert()
            .success()
            .stdout(predicate::str::contains("Mirror complete"));
    })
    .await
    .expect("cli task");

    assert_eq!(
        std::fs::read(out.path().join("music/a.mp3")).expect("file written"),
        b"a"
    );
}

/// Test that a fatal listing error exits with code 1.
#[tokio::test(flavor = "multi_thread")]
async fn test_binary_missing_api_folder_aborts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let out = TempDir::new().expect("failed to create temp dir");
    let url = format!("{}/Nothing", server.uri());
    let output = out.path().to_path_buf();
    tokio::task::spawn_blocking(move || {
        mirrordl()
            .args([url.as_str(), "--allow-host", "127.0.0.1", "-o"])
            .arg(&output)
            .assert()
            .code(1)
            .stdout(predicate::str::contains("Aborted."));
    })
    .await
    .expect("cli task");
}
