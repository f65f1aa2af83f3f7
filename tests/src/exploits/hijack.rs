//! # Provider Hijacking
//!
//! A hostile extension replaces or wraps the injected wallet object before the
//! page reads it. Each case builds the tampered provider and checks that
//! `verify_provider` refuses it, or lets it through with a warning when the
//! signals are only advisory.

#[cfg(test)]
mod tests {
    use crate::fixtures::{clock, single_tab, APP_ORIGIN};
    use std::sync::Arc;
    use wg_connection_security::testing::{phantom_descriptor, MockProvider};
    use wg_connection_security::{
        ConnectionSecurityApi, MemoryStore, Recommendation, RiskLevel, SecurityEventType,
        SecurityManager, Severity, StaticEnvironment,
    };

    const WALLET: &str = "Phantom";

    #[test]
    fn test_impersonator_claiming_two_wallets() {
        let (mut manager, _store, _clock) = single_tab();
        let provider = Arc::new(MockProvider::with_descriptor(
            phantom_descriptor().with_flag("isSolflare", true),
            1,
        ));

        let rejected = manager.verify_provider(provider, WALLET, None).unwrap_err();
        assert_eq!(rejected.assessment.risk_level, RiskLevel::Critical);
        assert_eq!(
            rejected.assessment.hijack.recommendation,
            Recommendation::Avoid
        );
        assert!(rejected
            .assessment
            .recommendations
            .iter()
            .any(|r| r.contains("hijacking")));

        let report = manager.security_report();
        assert_eq!(
            report
                .events_by_type
                .get(&SecurityEventType::SessionHijackAttempt),
            Some(&1)
        );
        assert_eq!(report.events_by_severity.get(&Severity::Critical), Some(&1));
    }

    #[test]
    fn test_injected_eval_in_sign_message() {
        let (mut manager, _store, _clock) = single_tab();
        let provider = Arc::new(MockProvider::with_descriptor(
            phantom_descriptor().with_method(
                "signMessage",
                "async signMessage(message) { return eval(atob(this._payload)); }",
            ),
            1,
        ));

        let rejected = manager.verify_provider(provider, WALLET, None).unwrap_err();
        assert!(rejected.assessment.hijack_detected());
        assert!(rejected
            .assessment
            .hijack
            .indicators
            .iter()
            .any(|i| i.contains("signMessage")));
    }

    #[test]
    fn test_locked_getter_on_sign_transaction() {
        let (mut manager, _store, _clock) = single_tab();
        let provider = Arc::new(MockProvider::with_descriptor(
            phantom_descriptor().with_getter_method(
                "signTransaction",
                "function signTransaction(tx) { return this.request(tx); }",
                false,
            ),
            1,
        ));

        let rejected = manager.verify_provider(provider, WALLET, None).unwrap_err();
        assert!(!rejected.assessment.hijack_detected());
        assert_eq!(rejected.assessment.risk_level, RiskLevel::High);
        assert!(rejected
            .assessment
            .issues
            .iter()
            .any(|i| i.message.contains("Non-configurable getter")));
        assert_eq!(
            manager
                .monitor()
                .events_of_type(SecurityEventType::SuspiciousProvider)
                .len(),
            1
        );
    }

    #[test]
    fn test_minified_provider_passes_with_caution() {
        let (mut manager, _store, _clock) = single_tab();
        let descriptor = phantom_descriptor()
            .with_method(
                "connect",
                "function connect(o){var _0x3f2a=this._request;return _0x3f2a('connect',o);}",
            )
            .with_method(
                "signTransaction",
                "function signTransaction(t){var _0x1b7c=this._sign;return _0x1b7c(t);}",
            )
            .with_method(
                "signMessage",
                "function signMessage(m){var _0x9e41=this._request;return _0x9e41('signMessage',m);}",
            );
        let provider = Arc::new(MockProvider::with_descriptor(descriptor, 1));

        let verified = manager.verify_provider(provider, WALLET, None).unwrap();
        let assessment = verified.assessment();
        assert_eq!(assessment.hijack.recommendation, Recommendation::Caution);
        assert_eq!(
            assessment
                .issues
                .iter()
                .filter(|i| i.severity == Severity::Medium)
                .count(),
            3
        );
        assert!(manager
            .monitor()
            .events_of_type(SecurityEventType::SessionHijackAttempt)
            .is_empty());
    }

    #[test]
    fn test_nested_frame_is_low_signal() {
        let mut manager = SecurityManager::new(
            crate::fixtures::config(),
            Arc::new(MemoryStore::new()),
            Arc::new(StaticEnvironment::new(APP_ORIGIN).nested()),
            clock(),
        )
        .unwrap();

        let verified = manager
            .verify_provider(Arc::new(MockProvider::phantom(1)), WALLET, None)
            .unwrap();
        let assessment = verified.assessment();
        assert_eq!(assessment.hijack.recommendation, Recommendation::Safe);
        assert_eq!(assessment.hijack.indicators.len(), 1);
        assert!(assessment
            .issues
            .iter()
            .any(|i| i.severity == Severity::Low && i.message.contains("nested")));
    }

    #[test]
    fn test_foreign_origin_refused() {
        let mut manager = SecurityManager::new(
            crate::fixtures::config(),
            Arc::new(MemoryStore::new()),
            Arc::new(StaticEnvironment::new("https://app.example.com.evil.io")),
            clock(),
        )
        .unwrap();

        assert!(!manager.verify_configured_origin());
        assert_eq!(
            manager
                .monitor()
                .events_of_type(SecurityEventType::InvalidOrigin)
                .len(),
            1
        );
    }
}
