//! Telemetry configuration from environment variables.

use serde::{Deserialize, Serialize};
use std::env;

/// Configuration for log output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Log filter directive (`info`, `wg_connection_security=debug`, ...)
    pub log_level: String,

    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,

    /// Include source file and line in log lines
    pub with_source_location: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "wallet-guard".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            with_source_location: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `WG_SERVICE_NAME`: Service name (default: wallet-guard)
    /// - `WG_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `WG_JSON_LOGS`: Enable JSON logs (default: false, true in containers)
    /// - `WG_LOG_SOURCE`: Include file and line (default: false)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("WG_SERVICE_NAME")
                .unwrap_or_else(|_| "wallet-guard".to_string()),

            log_level: env::var("WG_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("WG_JSON_LOGS")
                .map(|v| parse_bool(&v))
                .unwrap_or(is_container),

            with_source_location: env::var("WG_LOG_SOURCE")
                .map(|v| parse_bool(&v))
                .unwrap_or(false),
        }
    }

    /// Configuration for a named tool, keeping the other settings from the environment.
    pub fn for_tool(tool_name: &str) -> Self {
        let mut config = Self::from_env();
        config.service_name = format!("wallet-guard-{tool_name}");
        config
    }

    /// Override the filter, e.g. from a `--verbose` flag.
    pub fn with_log_level(mut self, log_level: impl Into<String>) -> Self {
        self.log_level = log_level.into();
        self
    }
}

fn parse_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}
