//! Server startup integration tests.
//!
//! Spawns the compiled binary against a minimal config and exercises the
//! read-only API surface. No engine, solver, or proxy pool is contacted.

use std::io::Write;
use std::net::TcpListener;
use std::time::Duration;

use reqwest::Client;
use tempfile::NamedTempFile;
use tokio::time::sleep;

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Create a minimal valid config
fn minimal_config(port: u16) -> String {
    format!(
        r#"
[server]
host = "127.0.0.1"
port = {}

[engine]
url = "http://127.0.0.1:1"

[[egress.pool]]
host = "203.0.113.7"
port = 5470
username = "warbler"
password = "secret-proxy-pass"
"#,
        port
    )
}

/// Spawn the server and return a handle
async fn spawn_server(config_path: &std::path::Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_harrier"))
        .env("HARRIER_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server")
}

/// Wait for server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/api/v1/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(100)).await;
    }
    false
}

#[tokio::test]
async fn test_server_starts_and_reports_health() {
    let port = get_available_port();
    let mut config_file = NamedTempFile::new().unwrap();
    write!(config_file, "{}", minimal_config(port)).unwrap();

    let _server = spawn_server(config_file.path()).await;
    assert!(wait_for_server(port, 50).await, "Server did not come up");

    let body: serde_json::Value = Client::new()
        .get(format!("http://127.0.0.1:{}/api/v1/health", port))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_config_endpoint_redacts_credentials() {
    let port = get_available_port();
    let mut config_file = NamedTempFile::new().unwrap();
    write!(config_file, "{}", minimal_config(port)).unwrap();

    let _server = spawn_server(config_file.path()).await;
    assert!(wait_for_server(port, 50).await, "Server did not come up");

    let response = Client::new()
        .get(format!("http://127.0.0.1:{}/api/v1/config", port))
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success());
    let text = response.text().await.unwrap();
    assert!(!text.contains("secret-proxy-pass"));
    assert!(!text.contains("warbler"));
    assert!(text.contains("\"pool_size\":1"));
}

#[tokio::test]
async fn test_status_endpoint_reports_race_shape() {
    let port = get_available_port();
    let mut config_file = NamedTempFile::new().unwrap();
    write!(config_file, "{}", minimal_config(port)).unwrap();

    let _server = spawn_server(config_file.path()).await;
    assert!(wait_for_server(port, 50).await, "Server did not come up");

    let body: serde_json::Value = Client::new()
        .get(format!("http://127.0.0.1:{}/api/v1/status", port))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["workers_per_round"], 3);
    assert_eq!(body["max_rounds"], 5);
    assert_eq!(body["session_capacity"], 4);
    assert_eq!(body["sessions_available"], 4);
    assert_eq!(body["egress_pool_size"], 1);
}

#[tokio::test]
async fn test_agent_run_rejects_empty_prompt() {
    let port = get_available_port();
    let mut config_file = NamedTempFile::new().unwrap();
    write!(config_file, "{}", minimal_config(port)).unwrap();

    let _server = spawn_server(config_file.path()).await;
    assert!(wait_for_server(port, 50).await, "Server did not come up");

    let response = Client::new()
        .post(format!("http://127.0.0.1:{}/api/v1/agent/run", port))
        .json(&serde_json::json!({"prompt": "   "}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn test_metrics_endpoint_serves_text() {
    let port = get_available_port();
    let mut config_file = NamedTempFile::new().unwrap();
    write!(config_file, "{}", minimal_config(port)).unwrap();

    let _server = spawn_server(config_file.path()).await;
    assert!(wait_for_server(port, 50).await, "Server did not come up");

    let text = Client::new()
        .get(format!("http://127.0.0.1:{}/metrics", port))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(text.contains("harrier_"));
}
