//! # Session Store
//!
//! Time-boxed sessions binding a public key to a wallet name, plus the
//! persisted flags an auto-connect routine needs to tell "never connected"
//! apart from "trusted" and "user disconnected".
//!
//! ## Invariants
//!
//! - At most one live session per wallet name
//! - `expires_at > created_at`
//! - "explicitly disconnected" and "connected" are never both set

use crate::domain::config::SessionConfig;
use crate::domain::entities::Timestamp;
use crate::domain::errors::SessionError;
use crate::ports::outbound::{KeyValueStore, TimeSource};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const SESSIONS_KEY: &str = "wallet_guard:sessions";
pub const EXPLICITLY_DISCONNECTED_KEY: &str = "wallet_guard:explicitly_disconnected";
pub const CONNECTION_STATE_KEY: &str = "wallet_guard:connection_state";
pub const AUTO_CONNECT_KEY: &str = "wallet_guard:auto_connect";
pub const LAST_WALLET_KEY: &str = "wallet_guard:last_wallet";

/// Where the session was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub origin: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub public_key: String,
    pub wallet_name: String,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub last_activity: Timestamp,
    #[serde(default)]
    pub metadata: Option<SessionMetadata>,
}

impl Session {
    pub fn is_live(&self, now: Timestamp) -> bool {
        self.expires_at > now
    }
}

/// Persisted "current connection" flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    pub connected: bool,
    pub wallet_name: Option<String>,
}

/// What an auto-connect routine should do on page load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "kebab-case")]
pub enum AutoConnectDecision {
    NeverConnected,
    Trusted {
        #[serde(rename = "walletName")]
        wallet_name: String,
    },
    UserDisconnected,
}

/// Session records and connection flags.
pub struct SessionStore {
    config: SessionConfig,
    sessions: HashMap<String, Session>,
    store: Option<Arc<dyn KeyValueStore>>,
    clock: Arc<dyn TimeSource>,
    explicitly_disconnected: bool,
    connection_state: ConnectionState,
    auto_connect: bool,
    last_wallet: Option<String>,
}

impl SessionStore {
    /// In-memory store.
    pub fn new(config: SessionConfig, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
            store: None,
            clock,
            explicitly_disconnected: false,
            connection_state: ConnectionState::default(),
            auto_connect: false,
            last_wallet: None,
        }
    }

    /// Store backed by durable storage. Live sessions and flags are restored.
    pub fn with_storage(
        config: SessionConfig,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        let mut sessions = Self::new(config, clock);
        sessions.store = Some(store);
        sessions.restore();
        sessions
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // =========================================================================
    // SESSIONS
    // =========================================================================

    /// Create a session, evicting any prior one for the same wallet.
    ///
    /// `duration_ms` defaults to the configured duration.
    pub fn create_session(
        &mut self,
        public_key: &str,
        wallet_name: &str,
        duration_ms: Option<u64>,
        metadata: Option<SessionMetadata>,
    ) -> Result<Session, SessionError> {
        let duration = duration_ms.unwrap_or(self.config.default_duration_ms);
        if duration == 0 {
            return Err(SessionError::InvalidDuration);
        }

        let evicted: Vec<String> = self
            .sessions
            .values()
            .filter(|s| s.wallet_name == wallet_name)
            .map(|s| s.id.clone())
            .collect();
        for id in &evicted {
            self.sessions.remove(id);
        }

        let now = self.clock.now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            public_key: public_key.to_string(),
            wallet_name: wallet_name.to_string(),
            created_at: now,
            expires_at: now.saturating_add(duration),
            last_activity: now,
            metadata,
        };
        self.sessions.insert(session.id.clone(), session.clone());

        info!(
            wallet = wallet_name,
            session_id = %session.id,
            evicted = evicted.len(),
            "Session created"
        );
        self.persist_sessions();
        Ok(session)
    }

    pub fn get_session(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// Live session for a wallet, if any.
    pub fn session_for_wallet(&self, wallet_name: &str) -> Option<&Session> {
        let now = self.clock.now();
        self.sessions
            .values()
            .find(|s| s.wallet_name == wallet_name && s.is_live(now))
    }

    /// Sessions with `expires_at > now`, oldest first.
    pub fn get_active_sessions(&self) -> Vec<Session> {
        let now = self.clock.now();
        let mut active: Vec<Session> = self
            .sessions
            .values()
            .filter(|s| s.is_live(now))
            .cloned()
            .collect();
        active.sort_by_key(|s| s.created_at);
        active
    }

    /// True for a live session; touches `last_activity`.
    pub fn validate_session(&mut self, id: &str) -> bool {
        let now = self.clock.now();
        match self.sessions.get_mut(id) {
            Some(session) if session.is_live(now) => {
                session.last_activity = now;
                self.persist_sessions();
                true
            }
            _ => false,
        }
    }

    /// Extend a live session by the configured duration from now.
    pub fn refresh_session(&mut self, id: &str) -> Result<Session, SessionError> {
        let now = self.clock.now();
        let duration = self.config.default_duration_ms;
        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        if !session.is_live(now) {
            return Err(SessionError::Expired(id.to_string()));
        }
        session.expires_at = now.saturating_add(duration);
        session.last_activity = now;
        let refreshed = session.clone();

        debug!(session_id = id, expires_at = refreshed.expires_at, "Session refreshed");
        self.persist_sessions();
        Ok(refreshed)
    }

    pub fn revoke_session(&mut self, id: &str) -> Option<Session> {
        let removed = self.sessions.remove(id);
        if removed.is_some() {
            info!(session_id = id, "Session revoked");
            self.persist_sessions();
        }
        removed
    }

    /// Revoke every session of a wallet.
    pub fn revoke_wallet(&mut self, wallet_name: &str) -> Vec<Session> {
        let ids: Vec<String> = self
            .sessions
            .values()
            .filter(|s| s.wallet_name == wallet_name)
            .map(|s| s.id.clone())
            .collect();
        let removed: Vec<Session> = ids.iter().filter_map(|id| self.sessions.remove(id)).collect();
        if !removed.is_empty() {
            self.persist_sessions();
        }
        removed
    }

    /// Drop expired sessions. Returns how many were removed.
    pub fn clear_expired_sessions(&mut self) -> usize {
        let now = self.clock.now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.is_live(now));
        let removed = before - self.sessions.len();
        if removed > 0 {
            debug!(removed, "Cleared expired sessions");
            self.persist_sessions();
        }
        removed
    }

    /// Remove all sessions and flags.
    pub fn clear_all(&mut self) {
        self.sessions.clear();
        self.explicitly_disconnected = false;
        self.connection_state = ConnectionState::default();
        self.auto_connect = false;
        self.last_wallet = None;
        if let Some(store) = self.writable_store() {
            for key in [
                SESSIONS_KEY,
                EXPLICITLY_DISCONNECTED_KEY,
                CONNECTION_STATE_KEY,
                AUTO_CONNECT_KEY,
                LAST_WALLET_KEY,
            ] {
                if let Err(e) = store.remove(key) {
                    warn!(key, error = %e, "Failed to clear session storage");
                }
            }
        }
        info!("Cleared all sessions and connection flags");
    }

    // =========================================================================
    // CONNECTION FLAGS
    // =========================================================================

    /// Storage is consulted first so other tabs' writes are visible.
    pub fn is_explicitly_disconnected(&self) -> bool {
        self.read_flag(EXPLICITLY_DISCONNECTED_KEY)
            .unwrap_or(self.explicitly_disconnected)
    }

    /// Setting the flag clears "connected".
    pub fn set_explicitly_disconnected(&mut self, value: bool) {
        self.explicitly_disconnected = value;
        if value {
            self.connection_state = ConnectionState::default();
            self.write_flag(CONNECTION_STATE_KEY, &self.connection_state);
        }
        self.write_flag(EXPLICITLY_DISCONNECTED_KEY, &value);
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.read_flag(CONNECTION_STATE_KEY)
            .unwrap_or_else(|| self.connection_state.clone())
    }

    /// Setting "connected" clears "explicitly disconnected".
    pub fn set_connection_state(&mut self, connected: bool, wallet_name: Option<&str>) {
        self.connection_state = ConnectionState {
            connected,
            wallet_name: wallet_name.map(String::from),
        };
        if connected {
            self.explicitly_disconnected = false;
            self.write_flag(EXPLICITLY_DISCONNECTED_KEY, &false);
        }
        self.write_flag(CONNECTION_STATE_KEY, &self.connection_state);
    }

    pub fn auto_connect_enabled(&self) -> bool {
        self.read_flag(AUTO_CONNECT_KEY).unwrap_or(self.auto_connect)
    }

    pub fn set_auto_connect(&mut self, enabled: bool) {
        self.auto_connect = enabled;
        self.write_flag(AUTO_CONNECT_KEY, &enabled);
    }

    pub fn last_wallet(&self) -> Option<String> {
        self.read_flag(LAST_WALLET_KEY)
            .or_else(|| self.last_wallet.clone())
    }

    /// Successful connection: connected, trusted for auto-connect.
    pub fn mark_connected(&mut self, wallet_name: &str) {
        self.set_connection_state(true, Some(wallet_name));
        self.set_auto_connect(true);
        self.last_wallet = Some(wallet_name.to_string());
        self.write_flag(LAST_WALLET_KEY, &wallet_name);
    }

    /// Disconnect always clears the wallet's sessions; a user-initiated one
    /// also persists the explicit flag and disables auto-connect.
    pub fn mark_disconnected(&mut self, wallet_name: &str, user_initiated: bool) -> Vec<Session> {
        let revoked = self.revoke_wallet(wallet_name);
        if user_initiated {
            self.set_explicitly_disconnected(true);
            self.set_auto_connect(false);
        } else {
            self.set_connection_state(false, None);
        }
        info!(
            wallet = wallet_name,
            user_initiated,
            revoked = revoked.len(),
            "Wallet disconnected"
        );
        revoked
    }

    pub fn auto_connect_decision(&self) -> AutoConnectDecision {
        if self.is_explicitly_disconnected() {
            return AutoConnectDecision::UserDisconnected;
        }
        match (self.auto_connect_enabled(), self.last_wallet()) {
            (true, Some(wallet_name)) => AutoConnectDecision::Trusted { wallet_name },
            _ => AutoConnectDecision::NeverConnected,
        }
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    fn writable_store(&self) -> Option<&Arc<dyn KeyValueStore>> {
        self.store.as_ref().filter(|_| self.config.persist)
    }

    fn read_flag<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let store = self.writable_store()?;
        match store.get(key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).ok(),
            Ok(None) => None,
            Err(e) => {
                debug!(key, error = %e, "Falling back to in-memory flag");
                None
            }
        }
    }

    fn write_flag<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let Some(store) = self.writable_store() else {
            return;
        };
        let result = serde_json::to_string(value)
            .map_err(|e| crate::domain::errors::StorageError::Io(e.to_string()))
            .and_then(|json| store.set(key, &json));
        if let Err(e) = result {
            warn!(key, error = %e, "Failed to persist connection flag");
        }
    }

    fn persist_sessions(&self) {
        let mut sessions: Vec<&Session> = self.sessions.values().collect();
        sessions.sort_by_key(|s| s.created_at);
        self.write_flag(SESSIONS_KEY, &sessions);
    }

    fn restore(&mut self) {
        let Some(store) = self.writable_store().cloned() else {
            return;
        };
        let now = self.clock.now();

        match store.get(SESSIONS_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<serde_json::Value>>(&raw) {
                Ok(records) => {
                    let total = records.len();
                    let mut live = 0usize;
                    let mut newest: HashMap<String, Session> = HashMap::new();
                    for record in records {
                        let Ok(session) = serde_json::from_value::<Session>(record) else {
                            continue;
                        };
                        if !session.is_live(now) || session.expires_at <= session.created_at {
                            continue;
                        }
                        live += 1;
                        match newest.get(&session.wallet_name) {
                            Some(kept) if kept.created_at > session.created_at => {}
                            _ => {
                                newest.insert(session.wallet_name.clone(), session);
                            }
                        }
                    }
                    self.sessions = newest.into_values().map(|s| (s.id.clone(), s)).collect();
                    let duplicates = live - self.sessions.len();
                    if duplicates > 0 {
                        warn!(duplicates, "Collapsed duplicate sessions per wallet");
                        self.persist_sessions();
                    }
                    debug!(
                        restored = self.sessions.len(),
                        dropped = total - self.sessions.len(),
                        "Restored sessions"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "Discarding unreadable session storage");
                    if let Err(e) = store.remove(SESSIONS_KEY) {
                        warn!(error = %e, "Failed to remove unreadable session storage");
                    }
                }
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Session storage unavailable"),
        }

        if let Some(value) = self.read_flag(EXPLICITLY_DISCONNECTED_KEY) {
            self.explicitly_disconnected = value;
        }
        if let Some(state) = self.read_flag(CONNECTION_STATE_KEY) {
            self.connection_state = state;
        }
        if let Some(value) = self.read_flag(AUTO_CONNECT_KEY) {
            self.auto_connect = value;
        }
        self.last_wallet = self.read_flag(LAST_WALLET_KEY);
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.sessions.len())
            .field("explicitly_disconnected", &self.explicitly_disconnected)
            .field("connection_state", &self.connection_state)
            .field("persistent", &self.store.is_some())
            .finish()
    }
}
