//! Integration tests for the proctoring relay HTTP server

#[cfg(feature = "server")]
mod server_tests {
    use proctor_sentinel::server::{run, ServerConfig};
    use proctor_sentinel::Config;
    use std::net::SocketAddr;
    use std::time::Duration;

    fn test_config(max_warnings: u32) -> Config {
        Config {
            max_warnings,
            termination_delay_ms: 100,
            data_path: std::env::temp_dir()
                .join("proctor-sentinel-server-test")
                .join(uuid::Uuid::new_v4().to_string()),
            ..Config::default()
        }
    }

    async fn start(
        access_id: &str,
        max_warnings: u32,
    ) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
        let config = test_config(max_warnings);
        config.ensure_directories().expect("Failed to create data dir");
        let (addr, shutdown_tx) = run(ServerConfig::new(0, access_id, config))
            .await
            .expect("Failed to start server");

        // Give server time to start
        tokio::time::sleep(Duration::from_millis(100)).await;
        (addr, shutdown_tx)
    }

    fn tab_hidden() -> serde_json::Value {
        serde_json::json!({
            "input": {
                "kind": "environment",
                "data": { "type": "visibility_changed", "hidden": true }
            }
        })
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (addr, shutdown_tx) = start("cand-health", 3).await;

        let client = reqwest::Client::new();
        let response = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["status"], "ok");
        assert!(body["version"].as_str().is_some());

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_input_updates_status() {
        let (addr, shutdown_tx) = start("cand-input", 3).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("http://{}/input", addr))
            .json(&tab_hidden())
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["disposition"]["action"], "allowed");
        assert_eq!(body["strikes"], 1);
        assert_eq!(body["terminated"], false);

        let status: serde_json::Value = client
            .get(format!("http://{}/status", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(status["access_id"], "cand-input");
        assert_eq!(status["lockdown"]["violation_count"], 1);
        assert_eq!(status["lockdown"]["show_violation_overlay"], true);
        assert_eq!(status["events"][0]["type"], "TAB_SWITCH");

        let response = client
            .post(format!("http://{}/dismiss", addr))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);

        let status: serde_json::Value = client
            .get(format!("http://{}/status", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(status["lockdown"]["show_violation_overlay"], false);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_blocked_shortcut() {
        let (addr, shutdown_tx) = start("cand-keys", 3).await;

        let body: serde_json::Value = reqwest::Client::new()
            .post(format!("http://{}/input", addr))
            .json(&serde_json::json!({
                "input": {
                    "kind": "environment",
                    "data": { "type": "context_menu" }
                }
            }))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");

        assert_eq!(body["disposition"]["action"], "blocked");
        assert_eq!(body["strikes"], 0);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_commands_are_drained() {
        let (addr, shutdown_tx) = start("cand-commands", 3).await;
        let client = reqwest::Client::new();

        let commands: serde_json::Value = client
            .get(format!("http://{}/commands", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(commands[0]["command"], "request_fullscreen");

        let commands: serde_json::Value = client
            .get(format!("http://{}/commands", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(commands.as_array().map(Vec::len), Some(0));

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_termination_ends_session() {
        let (addr, shutdown_tx) = start("cand-terminate", 1).await;
        let client = reqwest::Client::new();

        let body: serde_json::Value = client
            .post(format!("http://{}/input", addr))
            .json(&tab_hidden())
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(body["terminated"], true);

        // The poll ticker delivers the end-of-session command after the delay.
        tokio::time::sleep(Duration::from_millis(400)).await;
        let commands: Vec<serde_json::Value> = client
            .get(format!("http://{}/commands", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        let names: Vec<&str> = commands
            .iter()
            .filter_map(|c| c["command"].as_str())
            .collect();
        assert!(names.contains(&"exit_fullscreen"));
        assert_eq!(names.iter().filter(|n| **n == "end_session").count(), 1);

        let response = client
            .post(format!("http://{}/input", addr))
            .json(&tab_hidden())
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), reqwest::StatusCode::GONE);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "SESSION_TERMINATED");

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_client_clock_does_not_shorten_grace() {
        let (addr, shutdown_tx) = start("cand-clock", 3).await;
        let client = reqwest::Client::new();

        // A browser clock five seconds behind the server.
        let stale = chrono::Utc::now() - chrono::Duration::seconds(5);
        let response = client
            .post(format!("http://{}/input", addr))
            .json(&serde_json::json!({
                "at": stale,
                "input": {
                    "kind": "environment",
                    "data": { "type": "fullscreen_changed", "is_fullscreen": false }
                }
            }))
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.status().is_success());

        // Several ticks later the grace period is still running.
        tokio::time::sleep(Duration::from_millis(300)).await;
        let status: serde_json::Value = client
            .get(format!("http://{}/status", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(status["lockdown"]["violation_count"], 0);
        assert_eq!(status["events"].as_array().map(Vec::len), Some(0));

        // Past the grace period on the server clock the exit counts.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let status: serde_json::Value = client
            .get(format!("http://{}/status", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(status["lockdown"]["violation_count"], 1);
        assert_eq!(status["events"][0]["type"], "FULLSCREEN_EXIT");

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let (addr, shutdown_tx) = start("cand-cors", 3).await;

        // Send OPTIONS request to check CORS
        let client = reqwest::Client::new();
        let response = client
            .request(reqwest::Method::OPTIONS, format!("http://{}/input", addr))
            .header("Origin", "http://localhost")
            .header("Access-Control-Request-Method", "POST")
            .send()
            .await
            .expect("Failed to send request");

        // CORS preflight should succeed
        assert!(
            response.status().is_success() || response.status() == reqwest::StatusCode::NO_CONTENT,
            "CORS preflight failed: {}",
            response.status()
        );
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("http://localhost")
        );

        let _ = shutdown_tx.send(());
    }
}
