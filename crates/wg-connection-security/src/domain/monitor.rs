//! # Security Monitor
//!
//! Bounded, append-only log of security events. The oldest event is dropped
//! once the buffer is full. Every event is mirrored to `tracing` at a level
//! derived from its severity.

use crate::domain::entities::{Severity, Timestamp};
use crate::ports::outbound::TimeSource;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecurityEventType {
    InvalidOrigin,
    RateLimitExceeded,
    SessionHijackAttempt,
    SignatureVerificationFailed,
    SuspiciousProvider,
    WalletInconsistency,
    StorageCorruption,
    ReplayAttempt,
    SessionCreated,
    SessionRevoked,
    ForcedRetry,
}

impl SecurityEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEventType::InvalidOrigin => "invalid-origin",
            SecurityEventType::RateLimitExceeded => "rate-limit-exceeded",
            SecurityEventType::SessionHijackAttempt => "session-hijack-attempt",
            SecurityEventType::SignatureVerificationFailed => "signature-verification-failed",
            SecurityEventType::SuspiciousProvider => "suspicious-provider",
            SecurityEventType::WalletInconsistency => "wallet-inconsistency",
            SecurityEventType::StorageCorruption => "storage-corruption",
            SecurityEventType::ReplayAttempt => "replay-attempt",
            SecurityEventType::SessionCreated => "session-created",
            SecurityEventType::SessionRevoked => "session-revoked",
            SecurityEventType::ForcedRetry => "forced-retry",
        }
    }
}

impl fmt::Display for SecurityEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    #[serde(rename = "type")]
    pub event_type: SecurityEventType,
    pub timestamp: Timestamp,
    pub details: serde_json::Value,
    pub severity: Severity,
}

/// Ring buffer of security events.
pub struct SecurityMonitor {
    events: VecDeque<SecurityEvent>,
    max_events: usize,
    clock: Arc<dyn TimeSource>,
}

impl SecurityMonitor {
    pub fn new(max_events: usize, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events.min(1024)),
            max_events: max_events.max(1),
            clock,
        }
    }

    pub fn log_event(
        &mut self,
        event_type: SecurityEventType,
        severity: Severity,
        details: serde_json::Value,
    ) {
        let kind = event_type.as_str();
        match severity {
            Severity::Low => debug!(event = kind, %details, "Security event"),
            Severity::Medium => info!(event = kind, %details, "Security event"),
            Severity::High => warn!(event = kind, %details, "Security event"),
            Severity::Critical => error!(event = kind, %details, "Security event"),
        }

        if self.events.len() == self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(SecurityEvent {
            event_type,
            timestamp: self.clock.now(),
            details,
            severity,
        });
    }

    pub fn events(&self) -> impl Iterator<Item = &SecurityEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The `count` most recent events, newest last.
    pub fn recent(&self, count: usize) -> Vec<SecurityEvent> {
        let skip = self.events.len().saturating_sub(count);
        self.events.iter().skip(skip).cloned().collect()
    }

    pub fn events_of_type(&self, event_type: SecurityEventType) -> Vec<SecurityEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn count_by_severity(&self) -> BTreeMap<Severity, usize> {
        let mut counts = BTreeMap::new();
        for event in &self.events {
            *counts.entry(event.severity).or_insert(0) += 1;
        }
        counts
    }

    pub fn count_by_type(&self) -> BTreeMap<SecurityEventType, usize> {
        let mut counts = BTreeMap::new();
        for event in &self.events {
            *counts.entry(event.event_type).or_insert(0) += 1;
        }
        counts
    }

    /// JSON array of all buffered events, oldest first.
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.events)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl fmt::Debug for SecurityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityMonitor")
            .field("events", &self.events.len())
            .field("max_events", &self.max_events)
            .finish()
    }
}
