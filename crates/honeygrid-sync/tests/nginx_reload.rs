// crates/honeygrid-sync/tests/nginx_reload.rs
// ============================================================================
// Module: Nginx Controller Integration Tests
// Description: Probe, self-test, and reload sequencing with bounded timeouts.
// Purpose: Exercise the reload sequence against a real local HTTP server.
// Dependencies: honeygrid_config, honeygrid_sync, tiny_http, tokio
// ============================================================================

//! ## Overview
//! Integration coverage for the nginx controller: the reload sequence only
//! succeeds when the probe answers and both commands exit zero, each
//! failure mode maps to its own error variant, and slow commands are cut
//! off by the bounded timeout.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only panic-based assertions are permitted."
)]

use std::thread;

use tiny_http::Response;
use tiny_http::Server;

use honeygrid_config::HoneygridConfig;
use honeygrid_config::ProxyConfig;
use honeygrid_sync::NginxController;
use honeygrid_sync::SyncError;

/// Starts a local liveness endpoint and returns its URL.
fn spawn_probe_server(status: u16) -> String {
    let server = Server::http("127.0.0.1:0").unwrap();
    let port = server.server_addr().to_ip().unwrap().port();
    thread::spawn(move || {
        for request in server.incoming_requests() {
            let _ = request.respond(Response::from_string("ok").with_status_code(status));
        }
    });
    format!("http://127.0.0.1:{port}/health")
}

fn proxy(probe_url: String, config_test: &str, reload: &str, timeout_secs: u64) -> ProxyConfig {
    let mut proxy = HoneygridConfig::default().proxy;
    proxy.probe_url = probe_url;
    proxy.config_test_command = config_test.to_owned();
    proxy.reload_command = reload.to_owned();
    proxy.command_timeout_secs = timeout_secs;
    proxy
}

#[tokio::test]
async fn reload_succeeds_when_probe_and_commands_pass() {
    let config = proxy(spawn_probe_server(200), "true", "true", 5);
    let controller = NginxController::new(&config).unwrap();
    controller.reload().await.unwrap();
}

#[tokio::test]
async fn unreachable_probe_aborts_before_any_command() {
    // Port 9 is discard; nothing listens there in the test environment.
    let config = proxy("http://127.0.0.1:9/health".to_owned(), "true", "true", 2);
    let controller = NginxController::new(&config).unwrap();
    let err = controller.reload().await.unwrap_err();
    assert!(matches!(err, SyncError::ProbeFailed(_) | SyncError::Timeout(_)));
}

#[tokio::test]
async fn non_success_probe_status_is_a_probe_failure() {
    let config = proxy(spawn_probe_server(503), "true", "true", 5);
    let controller = NginxController::new(&config).unwrap();
    let err = controller.reload().await.unwrap_err();
    assert!(matches!(err, SyncError::ProbeFailed(_)));
}

#[tokio::test]
async fn failing_config_test_aborts_the_reload() {
    let config = proxy(spawn_probe_server(200), "false", "true", 5);
    let controller = NginxController::new(&config).unwrap();
    let err = controller.reload().await.unwrap_err();
    assert!(matches!(err, SyncError::ConfigTestFailed(_)));
}

#[tokio::test]
async fn failing_reload_command_is_reported() {
    let config = proxy(spawn_probe_server(200), "true", "false", 5);
    let controller = NginxController::new(&config).unwrap();
    let err = controller.reload().await.unwrap_err();
    assert!(matches!(err, SyncError::ReloadFailed(_)));
}

#[tokio::test]
async fn slow_commands_hit_the_bounded_timeout() {
    let config = proxy(spawn_probe_server(200), "sleep 30", "true", 1);
    let controller = NginxController::new(&config).unwrap();
    let err = controller.reload().await.unwrap_err();
    assert!(matches!(err, SyncError::Timeout(_)));
}
