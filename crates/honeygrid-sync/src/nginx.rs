// crates/honeygrid-sync/src/nginx.rs
// ============================================================================
// Module: Honeygrid Nginx Controller
// Description: Health-checked, serialized nginx reload sequence.
// Purpose: Never reload a proxy that is down or carrying a broken config.
// Dependencies: crate::error, honeygrid_config, reqwest, tokio
// ============================================================================

//! ## Overview
//! A reload is a three-step sequence: probe the proxy's liveness URL, run
//! the configuration self-test command, then the reload command. Each step
//! is bounded by the configured command timeout and any failure aborts the
//! sequence; the previously loaded configuration simply stays active. The
//! whole sequence holds one async mutex so concurrent callers never
//! interleave reloads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::process::Output;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time::timeout;

use honeygrid_config::ProxyConfig;

use crate::error::SyncError;

// ============================================================================
// SECTION: Controller
// ============================================================================

/// Serialized reload driver for the external nginx proxy.
///
/// # Invariants
/// - At most one reload sequence runs at a time per instance.
/// - Every probe and command is bounded by the configured timeout.
pub struct NginxController {
    /// Liveness URL probed before any reload.
    probe_url: String,
    /// Parsed configuration self-test command (program plus arguments).
    config_test: Vec<String>,
    /// Parsed reload command (program plus arguments).
    reload_command: Vec<String>,
    /// Timeout applied to the probe and each command.
    command_timeout: Duration,
    /// HTTP client for the liveness probe.
    client: reqwest::Client,
    /// Serializes reload sequences; holds no data.
    reload_lock: Mutex<()>,
}

impl NginxController {
    /// Builds a controller from the proxy configuration section.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] when a command string is empty or the HTTP
    /// client cannot be constructed.
    pub fn new(proxy: &ProxyConfig) -> Result<Self, SyncError> {
        let command_timeout = Duration::from_secs(proxy.command_timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(command_timeout)
            .build()
            .map_err(|err| SyncError::Io(err.to_string()))?;
        Ok(Self {
            probe_url: proxy.probe_url.clone(),
            config_test: parse_command(&proxy.config_test_command)?,
            reload_command: parse_command(&proxy.reload_command)?,
            command_timeout,
            client,
            reload_lock: Mutex::new(()),
        })
    }

    /// Runs the full probe, self-test, reload sequence.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ProbeFailed`], [`SyncError::ConfigTestFailed`],
    /// [`SyncError::ReloadFailed`], or [`SyncError::Timeout`] naming the
    /// step that aborted the sequence.
    pub async fn reload(&self) -> Result<(), SyncError> {
        let _guard = self.reload_lock.lock().await;
        self.probe().await?;
        let output = self.run_command(&self.config_test).await?;
        if !output.status.success() {
            return Err(SyncError::ConfigTestFailed(describe_failure(&output)));
        }
        let output = self.run_command(&self.reload_command).await?;
        if !output.status.success() {
            return Err(SyncError::ReloadFailed(describe_failure(&output)));
        }
        Ok(())
    }

    /// Probes the proxy liveness URL.
    async fn probe(&self) -> Result<(), SyncError> {
        let response = self
            .client
            .get(&self.probe_url)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    SyncError::Timeout(format!("probe {}", self.probe_url))
                } else {
                    SyncError::ProbeFailed(err.to_string())
                }
            })?;
        if !response.status().is_success() {
            return Err(SyncError::ProbeFailed(format!(
                "probe returned status {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Runs one parsed command under the bounded timeout.
    async fn run_command(&self, command: &[String]) -> Result<Output, SyncError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| SyncError::Io("empty command".to_string()))?;
        let future = Command::new(program).args(args).kill_on_drop(true).output();
        match timeout(self.command_timeout, future).await {
            Ok(result) => result.map_err(|err| SyncError::Io(err.to_string())),
            Err(_) => Err(SyncError::Timeout(format!("command {program}"))),
        }
    }
}

/// Splits a configured command string into program and arguments.
fn parse_command(raw: &str) -> Result<Vec<String>, SyncError> {
    let parts: Vec<String> = raw.split_whitespace().map(str::to_owned).collect();
    if parts.is_empty() {
        return Err(SyncError::Io("configured command is empty".to_string()));
    }
    Ok(parts)
}

/// Summarizes a failed command for the error message.
fn describe_failure(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("exit status {}", output.status)
    } else {
        format!("exit status {}: {stderr}", output.status)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use super::*;

    #[test]
    fn parse_command_splits_program_and_args() {
        assert_eq!(parse_command("nginx -s reload").unwrap(), vec!["nginx", "-s", "reload"]);
        assert!(parse_command("   ").is_err());
    }
}
