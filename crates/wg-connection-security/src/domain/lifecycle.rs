//! # Connection Lifecycle
//!
//! Per-wallet connection phase, driven jointly by the rate limiter, the
//! session store and the orchestrator.
//!
//! ```text
//! [Idle] ──begin──→ [Attempting] ──succeeded──→ [Connected]
//!                     │    │                        │
//!                     │    └──failed──→ [Failed]    └── disconnected ──→ [Idle]
//!                     │
//!                     └──throttled──→ [RateLimited]
//!
//! [RateLimited] ──cooldown elapsed / override granted──→ [Attempting]
//! [Failed] ──begin──→ [Attempting]
//! any ──disconnected──→ [Idle]
//! ```

use crate::domain::errors::LifecycleError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionPhase {
    #[default]
    Idle,
    Attempting,
    Connected,
    RateLimited,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// Orchestrator starts a connection attempt
    Begin,
    /// Provider connected
    Succeeded,
    /// Provider refused or errored
    Failed,
    /// Rate limiter refused the attempt
    Throttled,
    /// Cooldown ran out
    CooldownElapsed,
    /// One-shot override granted
    OverrideGranted,
    /// Disconnected by the user or the provider
    Disconnected,
}

impl ConnectionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionPhase::Idle => "idle",
            ConnectionPhase::Attempting => "attempting",
            ConnectionPhase::Connected => "connected",
            ConnectionPhase::RateLimited => "rate-limited",
            ConnectionPhase::Failed => "failed",
        }
    }

    /// Next phase for `event`, or an error for an illegal transition.
    pub fn apply(self, event: LifecycleEvent) -> Result<ConnectionPhase, LifecycleError> {
        use ConnectionPhase::*;
        use LifecycleEvent as E;

        match (self, event) {
            (_, E::Disconnected) => Ok(Idle),
            (Idle | Failed, E::Begin) => Ok(Attempting),
            (Idle | Failed | Attempting, E::Throttled) => Ok(RateLimited),
            (Attempting, E::Succeeded) => Ok(Connected),
            (Attempting, E::Failed) => Ok(Failed),
            (RateLimited, E::CooldownElapsed | E::OverrideGranted) => Ok(Attempting),
            (RateLimited, E::Throttled) => Ok(RateLimited),
            (from, event) => Err(LifecycleError::InvalidTransition {
                from: from.as_str().to_string(),
                event: format!("{event:?}"),
            }),
        }
    }
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
