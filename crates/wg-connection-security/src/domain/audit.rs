//! Audit log: what was attempted, for which wallet, and whether it worked.
//!
//! The newest entries are mirrored to durable storage so a postmortem can
//! read them after a reload.

use crate::domain::config::MonitorConfig;
use crate::domain::entities::Timestamp;
use crate::ports::outbound::{KeyValueStore, TimeSource};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

pub const AUDIT_LOG_KEY: &str = "wallet_guard:audit_log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditCategory {
    Connection,
    Validation,
    Security,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub timestamp: Timestamp,
    pub category: AuditCategory,
    pub wallet_name: Option<String>,
    pub success: bool,
    pub details: String,
}

pub struct AuditLog {
    entries: VecDeque<AuditEntry>,
    max_entries: usize,
    persisted_entries: usize,
    store: Option<Arc<dyn KeyValueStore>>,
    clock: Arc<dyn TimeSource>,
}

impl AuditLog {
    pub fn new(config: &MonitorConfig, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries: config.max_audit_entries.max(1),
            persisted_entries: config.persisted_audit_entries.min(config.max_audit_entries),
            store: None,
            clock,
        }
    }

    /// Restores the mirrored entries from `store`.
    pub fn with_storage(
        config: &MonitorConfig,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        let mut log = Self::new(config, clock);
        match store.get(AUDIT_LOG_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<AuditEntry>>(&raw) {
                Ok(entries) => {
                    debug!(entries = entries.len(), "Restored audit log");
                    log.entries.extend(entries);
                    while log.entries.len() > log.max_entries {
                        log.entries.pop_front();
                    }
                }
                Err(e) => warn!(error = %e, "Discarding unreadable audit log"),
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Audit log storage unavailable"),
        }
        log.store = Some(store);
        log
    }

    pub fn record(
        &mut self,
        category: AuditCategory,
        wallet_name: Option<&str>,
        success: bool,
        details: impl Into<String>,
    ) {
        if self.entries.len() == self.max_entries {
            self.entries.pop_front();
        }
        self.entries.push_back(AuditEntry {
            timestamp: self.clock.now(),
            category,
            wallet_name: wallet_name.map(String::from),
            success,
            details: details.into(),
        });
        self.mirror();
    }

    pub fn entries(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries_for_wallet(&self, wallet_name: &str) -> Vec<AuditEntry> {
        self.entries
            .iter()
            .filter(|e| e.wallet_name.as_deref() == Some(wallet_name))
            .cloned()
            .collect()
    }

    pub fn failures(&self) -> Vec<AuditEntry> {
        self.entries.iter().filter(|e| !e.success).cloned().collect()
    }

    /// JSON array of all entries, oldest first.
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.entries)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        if let Some(store) = &self.store {
            if let Err(e) = store.remove(AUDIT_LOG_KEY) {
                warn!(error = %e, "Failed to clear persisted audit log");
            }
        }
    }

    fn mirror(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let skip = self.entries.len().saturating_sub(self.persisted_entries);
        let tail: Vec<&AuditEntry> = self.entries.iter().skip(skip).collect();
        let result = serde_json::to_string(&tail)
            .map_err(|e| crate::domain::errors::StorageError::Io(e.to_string()))
            .and_then(|json| store.set(AUDIT_LOG_KEY, &json));
        if let Err(e) = result {
            warn!(error = %e, "Failed to mirror audit log");
        }
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("entries", &self.entries.len())
            .field("max_entries", &self.max_entries)
            .field("persisted_entries", &self.persisted_entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;
    use crate::testing::MockTimeSource;

    fn clock() -> Arc<MockTimeSource> {
        Arc::new(MockTimeSource::new(5_000))
    }

    #[test]
    fn test_ring_buffer_bounds() {
        let mut log = AuditLog::new(&MonitorConfig::default(), clock());
        for i in 0..600 {
            log.record(AuditCategory::Connection, Some("Phantom"), false, format!("attempt {i}"));
        }
        assert_eq!(log.len(), 500);
        assert_eq!(log.entries().next().unwrap().details, "attempt 100");
    }

    #[test]
    fn test_mirror_keeps_newest() {
        let store = Arc::new(MemoryStore::new());
        let mut log = AuditLog::with_storage(&MonitorConfig::default(), store.clone(), clock());
        for i in 0..150 {
            log.record(AuditCategory::Validation, None, true, format!("check {i}"));
        }

        let raw = store.get(AUDIT_LOG_KEY).unwrap().unwrap();
        let mirrored: Vec<AuditEntry> = serde_json::from_str(&raw).unwrap();
        assert_eq!(mirrored.len(), 100);
        assert_eq!(mirrored[0].details, "check 50");
        assert_eq!(mirrored[99].details, "check 149");
    }

    #[test]
    fn test_restore_after_reload() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut log = AuditLog::with_storage(&MonitorConfig::default(), store.clone(), clock());
        log.record(AuditCategory::Security, Some("Phantom"), false, "hijack");
        log.record(AuditCategory::Connection, Some("Solflare"), true, "connected");

        let reloaded = AuditLog::with_storage(&MonitorConfig::default(), store, clock());
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.entries_for_wallet("Phantom").len(), 1);
        assert_eq!(reloaded.failures()[0].details, "hijack");
    }

    #[test]
    fn test_unreadable_mirror_ignored() {
        let store = Arc::new(MemoryStore::new());
        store.set(AUDIT_LOG_KEY, "[{").unwrap();
        let log = AuditLog::with_storage(&MonitorConfig::default(), store, clock());
        assert!(log.is_empty());
    }

    #[test]
    fn test_export_json() {
        let mut log = AuditLog::new(&MonitorConfig::default(), clock());
        log.record(AuditCategory::Connection, Some("Phantom"), true, "connected");
        let exported: serde_json::Value = serde_json::from_str(&log.export_json().unwrap()).unwrap();
        assert_eq!(exported[0]["category"], "connection");
        assert_eq!(exported[0]["walletName"], "Phantom");
    }
}
