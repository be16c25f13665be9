//! Smoke tests for the `affiliate-console` binary.

use std::process::Command;

use serde_json::json;
use tempfile::TempDir;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path, query_param},
};

fn console(workdir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("affiliate-console"));
    cmd.current_dir(workdir.path())
        .env_remove("AFFILIATE_ACCESS_TOKEN")
        .env_remove("AFFILIATE_REFRESH_TOKEN")
        .env_remove("AFFILIATE_PROFILE")
        .env_remove("AFFILIATE_LOG_FORMAT")
        .env_remove("RUST_LOG")
        .env("AFFILIATE_LOG_LEVEL", "error");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let workdir = TempDir::new().unwrap();
    let output = console(&workdir).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for sub in ["login", "list", "stats", "payment", "announcement", "user", "notification"] {
        assert!(stdout.contains(sub), "missing `{sub}` in help:\n{stdout}");
    }
}

#[test]
fn unknown_collection_is_rejected() {
    let workdir = TempDir::new().unwrap();
    let output = console(&workdir).args(["list", "widgets"]).output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown collection"));
}

#[test]
fn config_output_redacts_tokens() {
    let workdir = TempDir::new().unwrap();
    let output = console(&workdir)
        .env("AFFILIATE_ACCESS_TOKEN", "very-secret")
        .arg("config")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[REDACTED]"));
    assert!(!stdout.contains("very-secret"));
}

#[test]
fn config_reads_base_dir_and_keeps_stdout_clean() {
    let workdir = TempDir::new().unwrap();
    let env_dir = TempDir::new().unwrap();
    std::fs::write(
        env_dir.path().join(".env"),
        "AFFILIATE_PROFILE=staging\nAFFILIATE_LOG_FORMAT=pretty\n",
    )
    .unwrap();
    std::fs::write(env_dir.path().join(".env.staging"), "AFFILIATE_PAGE_SIZE=25\n").unwrap();

    let output = console(&workdir)
        .env("AFFILIATE_LOG_LEVEL", "trace")
        .arg("--base-dir")
        .arg(env_dir.path())
        .arg("config")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let printed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(printed["PROFILE"], "staging");
    assert_eq!(printed["PAGE_SIZE"], 25);
    assert_eq!(printed["LOG_FORMAT"], "pretty");
}

#[tokio::test]
async fn lists_a_page_as_a_table() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/team/members"))
        .and(query_param("limit", "5"))
        .and(header("authorization", "Bearer cli-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {
                    "id": "m1",
                    "name": "Grace",
                    "email": "grace@example.com",
                    "level": 1,
                    "totalEarnings": 1234.5
                }
            ],
            "hasMore": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let workdir = TempDir::new().unwrap();
    let mut cmd = console(&workdir);
    cmd.env("AFFILIATE_API_BASE_URL", format!("{}/api/v1", server.uri()))
        .env("AFFILIATE_ACCESS_TOKEN", "cli-token")
        .args(["list", "team", "--limit", "5"]);

    let output = tokio::task::spawn_blocking(move || cmd.output())
        .await
        .unwrap()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Grace"));
    assert!(stdout.contains("1,234.50 USD"));
}
