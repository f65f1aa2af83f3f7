//! # Multi-Tab Flows
//!
//! Several managers sharing one key-value store, the way tabs of one origin
//! share browser storage. Rate-limit snapshots are whole-object writes, so the
//! last tab to persist wins; connection flags are read through on every call.

#[cfg(test)]
mod tests {
    use crate::fixtures::{clock, tab};
    use std::sync::Arc;
    use wg_connection_security::{
        AutoConnectDecision, ConnectionOutcome, ConnectionSecurityApi, FileStore, MemoryStore,
        RestoreOutcome,
    };

    const WALLET: &str = "Phantom";

    fn connect(manager: &mut wg_connection_security::SecurityManager, public_key: &str) {
        manager.begin_connection(WALLET).unwrap();
        manager
            .complete_connection(
                WALLET,
                ConnectionOutcome::Connected {
                    public_key: public_key.to_string(),
                },
            )
            .unwrap();
    }

    #[test]
    fn test_new_tab_inherits_restriction() {
        let store = Arc::new(MemoryStore::new());
        let clock = clock();
        let mut first = tab(store.clone(), clock.clone());

        for _ in 0..3 {
            first.record_connection_attempt(WALLET, false);
        }
        assert!(!first.can_attempt_connection(WALLET));

        let mut second = tab(store, clock);
        assert!(matches!(
            second.rate_limiter().last_restore(),
            RestoreOutcome::Restored { trackers: 1 }
        ));
        assert!(!second.can_attempt_connection(WALLET));
        assert_eq!(second.attempt_stats(WALLET).failure_count, 3);
    }

    #[test]
    fn test_last_persisting_tab_wins() {
        let store = Arc::new(MemoryStore::new());
        let clock = clock();
        let mut first = tab(store.clone(), clock.clone());
        let mut second = tab(store.clone(), clock.clone());

        for _ in 0..3 {
            first.record_connection_attempt(WALLET, false);
        }
        // The second tab never saw those failures and overwrites the snapshot
        second.record_connection_attempt(WALLET, true);

        let third = tab(store, clock);
        let stats = third.attempt_stats(WALLET);
        assert_eq!(stats.failure_count, 0);
        assert_eq!(stats.success_count, 1);
        assert!(!stats.is_rate_limited);
    }

    #[test]
    fn test_sessions_visible_to_later_tabs() {
        let store = Arc::new(MemoryStore::new());
        let clock = clock();
        let mut first = tab(store.clone(), clock.clone());
        connect(&mut first, "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin");
        let session_id = first.sessions().session_for_wallet(WALLET).unwrap().id.clone();

        let mut second = tab(store, clock);
        assert!(second.validate_session(&session_id));
        assert_eq!(second.security_report().active_sessions, 1);
    }

    #[test]
    fn test_explicit_disconnect_seen_by_open_tabs() {
        let store = Arc::new(MemoryStore::new());
        let clock = clock();
        let mut first = tab(store.clone(), clock.clone());
        let second = tab(store.clone(), clock.clone());

        connect(&mut first, "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin");
        assert_eq!(
            second.auto_connect_decision(),
            AutoConnectDecision::Trusted {
                wallet_name: WALLET.into()
            }
        );

        first.disconnect(WALLET, true);
        assert_eq!(
            second.auto_connect_decision(),
            AutoConnectDecision::UserDisconnected
        );
    }

    #[test]
    fn test_file_store_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let clock = clock();
        {
            let store = Arc::new(FileStore::open(dir.path()).unwrap());
            let mut manager = tab(store, clock.clone());
            for _ in 0..3 {
                manager.record_connection_attempt(WALLET, false);
            }
        }

        let store = Arc::new(FileStore::open(dir.path()).unwrap());
        let mut manager = tab(store, clock);
        assert!(!manager.can_attempt_connection(WALLET));
        assert_eq!(manager.audit_log().failures().len(), 3);
    }
}
