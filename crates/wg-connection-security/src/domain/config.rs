//! Connection security configuration with validation.
//!
//! All durations are milliseconds so they line up with stored timestamps.

use crate::domain::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;

/// Main configuration for the `SecurityManager`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SecurityConfig {
    /// Origins allowed to drive wallet connections (exact or `*` globs)
    pub allowed_origins: Vec<String>,
    /// Connection attempt throttling
    pub rate_limit: RateLimitConfig,
    /// Session lifetime and persistence
    pub session: SessionConfig,
    /// Event and audit buffer sizes
    pub monitor: MonitorConfig,
    /// SIWS message fields
    pub auth_message: AuthMessageConfig,
}

impl SecurityConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rate_limit.validate()?;

        if self.session.default_duration_ms == 0 {
            return Err(ConfigError::InvalidSession(
                "defaultDurationMs cannot be 0".into(),
            ));
        }

        if self.monitor.max_events == 0 || self.monitor.max_audit_entries == 0 {
            return Err(ConfigError::InvalidMonitor(
                "log buffers cannot be empty".into(),
            ));
        }
        if self.monitor.persisted_audit_entries > self.monitor.max_audit_entries {
            return Err(ConfigError::InvalidMonitor(
                "persistedAuditEntries cannot exceed maxAuditEntries".into(),
            ));
        }

        if self.auth_message.domain.trim().is_empty() {
            return Err(ConfigError::InvalidAuthMessage("domain cannot be empty".into()));
        }
        if self.auth_message.ttl_ms == 0 {
            return Err(ConfigError::InvalidAuthMessage("ttlMs cannot be 0".into()));
        }

        Ok(())
    }

    /// Parse from a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `WG_MAX_ATTEMPTS`: per-wallet attempt ceiling
    /// - `WG_TIME_WINDOW_MS`: per-wallet window
    /// - `WG_GLOBAL_MAX_ATTEMPTS`: global ceiling (`0` disables it)
    /// - `WG_ALLOWED_ORIGINS`: comma-separated origins or globs
    /// - `WG_AUTH_DOMAIN`: SIWS domain
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(max) = env_parse::<u32>("WG_MAX_ATTEMPTS") {
            config.rate_limit.max_attempts = max;
        }
        if let Some(window) = env_parse::<u64>("WG_TIME_WINDOW_MS") {
            config.rate_limit.time_window_ms = window;
        }
        if let Some(global) = env_parse::<u32>("WG_GLOBAL_MAX_ATTEMPTS") {
            config.rate_limit.global_max_attempts = (global > 0).then_some(global);
        }
        if let Ok(origins) = env::var("WG_ALLOWED_ORIGINS") {
            config.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(domain) = env::var("WG_AUTH_DOMAIN") {
            config.auth_message.uri = format!("https://{domain}");
            config.auth_message.domain = domain;
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Rate limiting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RateLimitConfig {
    /// Attempts allowed per identifier within one window
    pub max_attempts: u32,
    /// Per-identifier window, measured from the first attempt
    pub time_window_ms: u64,
    /// Enable exponential backoff after exhaustion
    pub enable_backoff: bool,
    /// First backoff delay
    pub initial_delay_ms: u64,
    /// Upper bound for any backoff delay
    pub max_delay_ms: u64,
    /// Growth factor applied per exhaustion round
    pub backoff_multiplier: f64,
    /// Success resets multiplier and consecutive failures
    pub reset_on_success: bool,
    /// Ceiling across all identifiers (None disables)
    pub global_max_attempts: Option<u32>,
    /// Global window
    pub global_time_window_ms: u64,
    /// Write snapshots to durable storage
    pub persist: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            time_window_ms: 60_000,
            enable_backoff: true,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            reset_on_success: true,
            global_max_attempts: Some(10),
            global_time_window_ms: 60_000,
            persist: true,
        }
    }
}

impl RateLimitConfig {
    /// Validate rate limit settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidRateLimit(
                "maxAttempts cannot be 0".into(),
            ));
        }
        if self.time_window_ms == 0 || self.global_time_window_ms == 0 {
            return Err(ConfigError::InvalidRateLimit(
                "time windows cannot be 0".into(),
            ));
        }
        if self.global_max_attempts == Some(0) {
            return Err(ConfigError::InvalidRateLimit(
                "globalMaxAttempts cannot be 0 (use null to disable)".into(),
            ));
        }
        if self.enable_backoff {
            if self.initial_delay_ms == 0 {
                return Err(ConfigError::InvalidRateLimit(
                    "initialDelayMs cannot be 0".into(),
                ));
            }
            if self.initial_delay_ms > self.max_delay_ms {
                return Err(ConfigError::InvalidRateLimit(
                    "initialDelayMs cannot exceed maxDelayMs".into(),
                ));
            }
            if !(self.backoff_multiplier >= 1.0) {
                return Err(ConfigError::InvalidRateLimit(
                    "backoffMultiplier must be at least 1".into(),
                ));
            }
        }
        Ok(())
    }

    /// Largest multiplier before the delay hits `max_delay_ms`.
    pub fn max_multiplier(&self) -> f64 {
        if self.initial_delay_ms == 0 {
            return 1.0;
        }
        (self.max_delay_ms as f64 / self.initial_delay_ms as f64).max(1.0)
    }
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    /// Lifetime of new and refreshed sessions
    pub default_duration_ms: u64,
    /// Write sessions and flags to durable storage
    pub persist: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_duration_ms: 24 * 60 * 60 * 1000,
            persist: true,
        }
    }
}

/// Log buffer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonitorConfig {
    /// Security event ring buffer size
    pub max_events: usize,
    /// Audit ring buffer size
    pub max_audit_entries: usize,
    /// Audit entries mirrored to durable storage
    pub persisted_audit_entries: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_events: 1000,
            max_audit_entries: 500,
            persisted_audit_entries: 100,
        }
    }
}

/// Sign-in message configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthMessageConfig {
    /// Relying party domain
    pub domain: String,
    /// Relying party URI
    pub uri: String,
    /// Human-readable statement shown by the wallet
    pub statement: String,
    /// Message format version
    pub version: String,
    /// Cluster identifier
    pub chain_id: String,
    /// Validity of a generated message
    pub ttl_ms: u64,
}

impl Default for AuthMessageConfig {
    fn default() -> Self {
        Self {
            domain: "localhost".to_string(),
            uri: "https://localhost".to_string(),
            statement: "Sign in to verify ownership of this wallet.".to_string(),
            version: "1".to_string(),
            chain_id: "mainnet".to_string(),
            ttl_ms: 10 * 60 * 1000,
        }
    }
}
