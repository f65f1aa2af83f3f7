//! # Wallet-Guard Telemetry
//!
//! Logging setup shared by the Wallet-Guard binaries and test harnesses.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use wg_telemetry::{init_logging, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&TelemetryConfig::from_env())?;
//!     // Components now log through tracing
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `WG_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `WG_JSON_LOGS` | `false` | JSON lines output |
//! | `WG_SERVICE_NAME` | `wallet-guard` | Service name in log lines |
//! | `WG_LOG_SOURCE` | `false` | Include file and line |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{build_filter, init_logging};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("Global subscriber already installed: {0}")]
    AlreadyInitialized(String),
}

/// Convenience macro for creating a span with component context.
///
/// # Example
///
/// ```rust,ignore
/// use wg_telemetry::component_span;
///
/// fn validate(wallet: &str) {
///     let _span = component_span!("validate_provider", component = "verifier", wallet).entered();
///     // ... validation logic
/// }
/// ```
#[macro_export]
macro_rules! component_span {
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}
