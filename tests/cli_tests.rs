mod common;

use common::assert_contains_all;
use serde_json::json;
use std::io::Write;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// Integration tests that run the built spacemirror binary

fn spacemirror() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_spacemirror"));
    command.env_remove("RUST_LOG").env_remove("SPACE_TOKEN");
    command
}

/// Run the binary feeding one line per prompt on stdin
fn run_with_answers(args: &[&str], answers: &[&str]) -> Output {
    let mut child = spacemirror()
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start spacemirror");

    {
        let mut stdin = child.stdin.take().expect("stdin not piped");
        for answer in answers {
            writeln!(stdin, "{}", answer).expect("Failed to write answer");
        }
    }

    child.wait_with_output().expect("Failed to wait for spacemirror")
}

#[test]
fn test_cli_help() {
    let output = spacemirror()
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_contains_all(
        &stdout,
        &[
            "--url",
            "--project",
            "--token",
            "--clone-dir",
            "--email",
            "--dry-run",
            "--verbose",
        ],
    );
}

#[test]
fn test_cli_version() {
    let output = spacemirror()
        .arg("--version")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("spacemirror"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unauthorized_listing_exits_cleanly() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/http/projects/key:PRJ"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let clone_dir = TempDir::new().unwrap();
    let clone_dir_arg = clone_dir.path().to_str().unwrap().to_string();
    let uri = server.uri();

    let output = tokio::task::spawn_blocking(move || {
        run_with_answers(
            &[],
            &[&uri, "PRJ", "bad-token", &clone_dir_arg, "bot@acme.io"],
        )
    })
    .await
    .unwrap();

    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_contains_all(
        &stdout,
        &[
            "Enter your JetBrains Space organization URL",
            "Total repositories: 0",
        ],
    );
    assert!(stderr.contains("Unauthorized"), "stderr: {}", stderr);
    assert_eq!(std::fs::read_dir(clone_dir.path()).unwrap().count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dry_run_plans_clones_without_touching_disk() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/http/projects/key:PRJ"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "repos": [ { "name": "web" } ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/http/projects/key:PRJ/repositories/web/url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "httpUrl": "https://git.example.com/prj/web.git"
        })))
        .mount(&server)
        .await;

    let clone_dir = TempDir::new().unwrap();
    let clone_dir_arg = clone_dir.path().to_str().unwrap().to_string();
    let uri = server.uri();

    let output = tokio::task::spawn_blocking(move || {
        run_with_answers(
            &[
                "--dry-run",
                "--url",
                &uri,
                "--project",
                "PRJ",
                "--token",
                "tok-123",
                "--clone-dir",
                &clone_dir_arg,
                "--email",
                "bot@acme.io",
            ],
            &[],
        )
    })
    .await
    .unwrap();

    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_contains_all(
        &stdout,
        &[
            "Clone: https://git.example.com/prj/web.git",
            "Repositories to clone: 1",
        ],
    );
    assert!(!clone_dir.path().join("web").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dry_run_names_repositories_to_pull() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/http/projects/key:PRJ"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "repos": [ { "name": "web" } ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/http/projects/key:PRJ/repositories/web/url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "httpUrl": "https://git.example.com/prj/web.git"
        })))
        .mount(&server)
        .await;

    let clone_dir = TempDir::new().unwrap();
    std::fs::create_dir(clone_dir.path().join("web")).unwrap();
    let clone_dir_arg = clone_dir.path().to_str().unwrap().to_string();
    let uri = server.uri();

    let output = tokio::task::spawn_blocking(move || {
        run_with_answers(
            &[
                "--dry-run",
                "--url",
                &uri,
                "--project",
                "PRJ",
                "--token",
                "tok-123",
                "--clone-dir",
                &clone_dir_arg,
                "--email",
                "bot@acme.io",
            ],
            &[],
        )
    })
    .await
    .unwrap();

    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_contains_all(&stdout, &["Pull: web (", "Repositories to pull: 1"]);
}
