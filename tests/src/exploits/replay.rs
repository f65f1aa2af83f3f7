//! # Sign-In Replay and Forgery
//!
//! An attacker holding a captured sign-in response, or able to show the user
//! a look-alike message, tries to get `verify_auth_response` to accept it.

#[cfg(test)]
mod tests {
    use crate::fixtures::{single_tab, tab, APP_DOMAIN};
    use ed25519_dalek::Signer;
    use wg_connection_security::testing::keypair;
    use wg_connection_security::{AuthMessage, ConnectionSecurityApi, SecurityEventType};

    #[test]
    fn test_captured_response_replayed() {
        let (mut manager, _store, _clock) = single_tab();
        let (signing_key, public_key) = keypair(1);
        let address = public_key.to_base58();

        let message = manager.generate_auth_message(&address).unwrap();
        assert_eq!(message.domain, APP_DOMAIN);
        let text = message.to_message_string();
        let signature = signing_key.sign(text.as_bytes()).to_bytes();

        assert!(manager.verify_auth_response(&text, &signature, &address));
        assert!(!manager.verify_auth_response(&text, &signature, &address));
        assert!(!manager.verify_auth_response(&text, &signature, &address));

        assert_eq!(
            manager
                .monitor()
                .events_of_type(SecurityEventType::ReplayAttempt)
                .len(),
            2
        );
    }

    #[test]
    fn test_phishing_domain_rejected() {
        let (mut manager, _store, _clock) = single_tab();
        let (signing_key, public_key) = keypair(1);
        let address = public_key.to_base58();

        let genuine = manager.generate_auth_message(&address).unwrap();
        let phished = AuthMessage {
            domain: "app-example.com.phish.net".to_string(),
            ..genuine.clone()
        };
        let phished_text = phished.to_message_string();
        let phished_signature = signing_key.sign(phished_text.as_bytes()).to_bytes();
        assert!(!manager.verify_auth_response(&phished_text, &phished_signature, &address));

        // Domain is checked before the nonce is spent
        let text = genuine.to_message_string();
        let signature = signing_key.sign(text.as_bytes()).to_bytes();
        assert!(manager.verify_auth_response(&text, &signature, &address));
    }

    #[test]
    fn test_expired_message_rejected() {
        let (mut manager, _store, clock) = single_tab();
        let (signing_key, public_key) = keypair(1);
        let address = public_key.to_base58();

        let message = manager.generate_auth_message(&address).unwrap();
        let text = message.to_message_string();
        let signature = signing_key.sign(text.as_bytes()).to_bytes();

        clock.advance(manager.config().auth_message.ttl_ms);
        assert!(!manager.verify_auth_response(&text, &signature, &address));
        assert_eq!(
            manager
                .monitor()
                .events_of_type(SecurityEventType::SignatureVerificationFailed)
                .len(),
            1
        );
    }

    #[test]
    fn test_signature_from_another_key() {
        let (mut manager, _store, _clock) = single_tab();
        let (victim_key, victim) = keypair(1);
        let (attacker_key, attacker) = keypair(2);
        let address = victim.to_base58();

        let message = manager.generate_auth_message(&address).unwrap();
        let text = message.to_message_string();

        // Attacker signs the victim's message and presents their own key
        let forged = attacker_key.sign(text.as_bytes()).to_bytes();
        assert!(!manager.verify_auth_response(&text, &forged, &attacker.to_base58()));

        // Attacker signs and claims the victim's key; this spends the nonce
        assert!(!manager.verify_auth_response(&text, &forged, &address));

        let genuine = victim_key.sign(text.as_bytes()).to_bytes();
        assert!(!manager.verify_auth_response(&text, &genuine, &address));
    }

    #[test]
    fn test_tampered_statement_rejected() {
        let (mut manager, _store, _clock) = single_tab();
        let (signing_key, public_key) = keypair(1);
        let address = public_key.to_base58();

        let message = manager.generate_auth_message(&address).unwrap();
        let signature = signing_key
            .sign(message.to_message_string().as_bytes())
            .to_bytes();

        let tampered = AuthMessage {
            statement: "Approve unlimited token spending.".to_string(),
            ..message
        };
        assert!(!manager.verify_auth_response(
            &tampered.to_message_string(),
            &signature,
            &address
        ));
    }

    #[test]
    fn test_nonce_from_another_tab_rejected() {
        let (mut issuing, store, clock) = single_tab();
        let mut other = tab(store, clock);
        let (signing_key, public_key) = keypair(1);
        let address = public_key.to_base58();

        let message = issuing.generate_auth_message(&address).unwrap();
        let text = message.to_message_string();
        let signature = signing_key.sign(text.as_bytes()).to_bytes();

        assert!(!other.verify_auth_response(&text, &signature, &address));
        assert!(issuing.verify_auth_response(&text, &signature, &address));
    }
}
