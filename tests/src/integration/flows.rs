//! # Integration Test Flows
//!
//! A page orchestrating a wallet through the facade, end to end:
//!
//! 1. **Connect**: origin check, provider verification, lifecycle, session
//! 2. **Sign-in**: message generation, wallet signature, response verification
//! 3. **Rejections**: repeated user rejections throttle, cooldown recovers
//! 4. **Reconnect**: account continuity across disconnects and page loads

#[cfg(test)]
mod tests {
    use crate::fixtures::{single_tab, tab, APP_ORIGIN};
    use std::sync::Arc;
    use wg_connection_security::testing::MockProvider;
    use wg_connection_security::{
        AutoConnectDecision, ConnectOptions, ConnectionOutcome, ConnectionPhase,
        ConnectionSecurityApi, ProviderError, SecurityEventType, StatusSeverity,
    };

    const WALLET: &str = "Phantom";

    // =============================================================================
    // CONNECT AND SIGN-IN
    // =============================================================================

    #[tokio::test]
    async fn test_orchestrated_connect_and_sign_in() {
        let (mut manager, _store, _clock) = single_tab();
        assert!(manager.verify_configured_origin());

        let provider = Arc::new(MockProvider::phantom(1));
        let verified = manager
            .verify_provider(provider.clone(), WALLET, None)
            .unwrap();
        assert!(verified.assessment().is_valid);

        assert_eq!(
            manager.begin_connection(WALLET),
            Ok(ConnectionPhase::Attempting)
        );
        let key = verified.connect(ConnectOptions::default()).await.unwrap();
        assert_eq!(key, provider.public_key());

        let phase = manager
            .complete_connection(
                WALLET,
                ConnectionOutcome::Connected {
                    public_key: key.to_base58(),
                },
            )
            .unwrap();
        assert_eq!(phase, ConnectionPhase::Connected);

        let session = manager.sessions().session_for_wallet(WALLET).unwrap().clone();
        assert_eq!(session.public_key, key.to_base58());
        assert_eq!(
            session.metadata.and_then(|m| m.origin).as_deref(),
            Some(APP_ORIGIN)
        );
        assert!(manager.validate_session(&session.id));
        assert_eq!(
            manager.auto_connect_decision(),
            AutoConnectDecision::Trusted {
                wallet_name: WALLET.into()
            }
        );

        // Sign-in with the wallet's own signature
        let message = manager.generate_auth_message(&key.to_base58()).unwrap();
        let signed = verified.sign_message(&message.to_bytes()).await.unwrap();
        assert!(manager.verify_auth_response(
            &message.to_message_string(),
            &signed.signature,
            &key.to_base58()
        ));

        let report = manager.security_report();
        assert_eq!(report.active_sessions, 1);
        assert_eq!(
            report.events_by_type.get(&SecurityEventType::SessionCreated),
            Some(&1)
        );
        assert_eq!(report.audit_failures, 0);
    }

    #[tokio::test]
    async fn test_signing_refused_after_account_switch() {
        let (mut manager, _store, _clock) = single_tab();
        let provider = Arc::new(MockProvider::phantom(1));
        let verified = manager
            .verify_provider(provider.clone(), WALLET, None)
            .unwrap();

        manager.begin_connection(WALLET).unwrap();
        let key = verified.connect(ConnectOptions::default()).await.unwrap();
        manager
            .complete_connection(
                WALLET,
                ConnectionOutcome::Connected {
                    public_key: key.to_base58(),
                },
            )
            .unwrap();

        provider.switch_account(2);
        let err = verified.sign_message(b"transfer").await.unwrap_err();
        assert!(matches!(err, ProviderError::PublicKeyChanged { .. }));
    }

    // =============================================================================
    // REJECTIONS
    // =============================================================================

    #[tokio::test]
    async fn test_rejections_throttle_then_recover() {
        let (mut manager, _store, clock) = single_tab();
        let provider = Arc::new(MockProvider::phantom(1));
        let verified = manager
            .verify_provider(provider.clone(), WALLET, None)
            .unwrap();

        provider.set_reject_connect(true);
        for _ in 0..3 {
            assert_eq!(
                manager.begin_connection(WALLET),
                Ok(ConnectionPhase::Attempting)
            );
            let err = verified
                .connect(ConnectOptions::default())
                .await
                .unwrap_err();
            assert_eq!(err, ProviderError::UserRejected);
            manager
                .complete_connection(
                    WALLET,
                    ConnectionOutcome::Failed {
                        reason: err.to_string(),
                    },
                )
                .unwrap();
        }

        assert_eq!(
            manager.begin_connection(WALLET),
            Ok(ConnectionPhase::RateLimited)
        );
        let status = manager.rate_limit_status(WALLET);
        assert_eq!(status.severity, StatusSeverity::Error);
        assert!(status.can_force_retry);

        let cooldown = manager.cooldown_time(WALLET);
        assert!(cooldown > 0);
        clock.advance(cooldown);

        assert_eq!(
            manager.begin_connection(WALLET),
            Ok(ConnectionPhase::Attempting)
        );
        provider.set_reject_connect(false);
        let key = verified.connect(ConnectOptions::default()).await.unwrap();
        manager
            .complete_connection(
                WALLET,
                ConnectionOutcome::Connected {
                    public_key: key.to_base58(),
                },
            )
            .unwrap();

        let stats = manager.attempt_stats(WALLET);
        assert_eq!(stats.consecutive_failures, 0);
        assert_eq!(stats.failure_count, 3);
        assert_eq!(stats.success_count, 1);
        assert_eq!(manager.audit_log().failures().len(), 3);
    }

    #[test]
    fn test_override_after_throttle() {
        let (mut manager, _store, _clock) = single_tab();
        for _ in 0..3 {
            manager.begin_connection(WALLET).unwrap();
            manager
                .complete_connection(
                    WALLET,
                    ConnectionOutcome::Failed {
                        reason: "User rejected the request".into(),
                    },
                )
                .unwrap();
        }
        assert_eq!(
            manager.begin_connection(WALLET),
            Ok(ConnectionPhase::RateLimited)
        );

        assert!(manager.force_retry(WALLET));
        assert_eq!(
            manager.begin_connection(WALLET),
            Ok(ConnectionPhase::Attempting)
        );
        manager
            .complete_connection(
                WALLET,
                ConnectionOutcome::Failed {
                    reason: "User rejected the request".into(),
                },
            )
            .unwrap();

        // The override is spent for this window
        assert!(!manager.force_retry(WALLET));
        assert_eq!(
            manager.begin_connection(WALLET),
            Ok(ConnectionPhase::RateLimited)
        );
    }

    // =============================================================================
    // RECONNECT
    // =============================================================================

    #[tokio::test]
    async fn test_reconnect_detects_switched_account() {
        let (mut manager, _store, _clock) = single_tab();
        let provider = Arc::new(MockProvider::phantom(1));
        let verified = manager
            .verify_provider(provider.clone(), WALLET, None)
            .unwrap();

        manager.begin_connection(WALLET).unwrap();
        let first_key = verified.connect(ConnectOptions::default()).await.unwrap();
        manager
            .complete_connection(
                WALLET,
                ConnectionOutcome::Connected {
                    public_key: first_key.to_base58(),
                },
            )
            .unwrap();

        verified.disconnect().await.unwrap();
        manager.disconnect(WALLET, false);
        assert_eq!(manager.connection_phase(WALLET), ConnectionPhase::Idle);

        provider.switch_account(2);
        let previous = first_key.to_base58();
        let reverified = manager
            .verify_provider(provider.clone(), WALLET, Some(&previous))
            .unwrap();

        manager.begin_connection(WALLET).unwrap();
        let err = reverified
            .connect(ConnectOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ProviderError::PublicKeyChanged {
                previous,
                current: provider.public_key().to_base58(),
            }
        );
        assert!(!reverified.is_connected());
    }

    #[tokio::test]
    async fn test_user_disconnect_survives_reload() {
        let (mut manager, store, clock) = single_tab();
        let provider = Arc::new(MockProvider::phantom(1));
        let verified = manager
            .verify_provider(provider.clone(), WALLET, None)
            .unwrap();

        manager.begin_connection(WALLET).unwrap();
        let key = verified.connect(ConnectOptions::default()).await.unwrap();
        manager
            .complete_connection(
                WALLET,
                ConnectionOutcome::Connected {
                    public_key: key.to_base58(),
                },
            )
            .unwrap();

        let reloaded = tab(store.clone(), clock.clone());
        assert_eq!(
            reloaded.auto_connect_decision(),
            AutoConnectDecision::Trusted {
                wallet_name: WALLET.into()
            }
        );

        manager.disconnect(WALLET, true);
        assert_eq!(
            manager
                .monitor()
                .events_of_type(SecurityEventType::SessionRevoked)
                .len(),
            1
        );

        let reloaded = tab(store, clock);
        assert_eq!(
            reloaded.auto_connect_decision(),
            AutoConnectDecision::UserDisconnected
        );
        assert!(reloaded.sessions().session_for_wallet(WALLET).is_none());
    }
}
