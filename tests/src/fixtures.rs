//! Shared setup for the integration and exploit suites.

use std::sync::Arc;
use wg_connection_security::testing::MockTimeSource;
use wg_connection_security::{
    KeyValueStore, MemoryStore, SecurityConfig, SecurityManager, StaticEnvironment, Timestamp,
};

/// Fixed start time so timestamps in assertions are stable.
pub const START: Timestamp = 1_700_000_000_000;

pub const APP_ORIGIN: &str = "https://app.example.com";

pub const APP_DOMAIN: &str = "app.example.com";

/// Configuration used by every suite: the documented defaults plus an
/// allow-list and sign-in domain for the test origin.
pub fn config() -> SecurityConfig {
    let mut config = SecurityConfig {
        allowed_origins: vec!["https://*.example.com".to_string()],
        ..SecurityConfig::default()
    };
    config.auth_message.domain = APP_DOMAIN.to_string();
    config.auth_message.uri = APP_ORIGIN.to_string();
    config
}

pub fn clock() -> Arc<MockTimeSource> {
    Arc::new(MockTimeSource::new(START))
}

/// One browser tab: a manager over `store` on the test origin.
pub fn tab(store: Arc<dyn KeyValueStore>, clock: Arc<MockTimeSource>) -> SecurityManager {
    SecurityManager::new(
        config(),
        store,
        Arc::new(StaticEnvironment::new(APP_ORIGIN).with_user_agent("Mozilla/5.0 (X11; Linux)")),
        clock,
    )
    .unwrap()
}

/// A single tab with its own store.
pub fn single_tab() -> (SecurityManager, Arc<MemoryStore>, Arc<MockTimeSource>) {
    let store = Arc::new(MemoryStore::new());
    let clock = clock();
    let manager = tab(store.clone(), clock.clone());
    (manager, store, clock)
}
