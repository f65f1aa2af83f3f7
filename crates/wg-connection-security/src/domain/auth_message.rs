//! # Sign-In With Solana Messages
//!
//! Builds the sign-in message a wallet is asked to sign, renders it in a
//! fixed canonical form, parses it back, and verifies Ed25519 signatures over
//! the canonical bytes.
//!
//! ## Canonical Form
//!
//! ```text
//! {domain} wants you to sign in with your Solana account:
//! {address}
//!
//! {statement}
//!
//! URI: {uri}
//! Version: {version}
//! Chain ID: {chainId}
//! Nonce: {nonce}
//! Issued At: {issuedAt}
//! Expiration Time: {expirationTime}
//! ```
//!
//! Timestamps are RFC 3339 UTC with millisecond precision.

use crate::domain::config::AuthMessageConfig;
use crate::domain::entities::{Timestamp, WalletPublicKey};
use crate::domain::errors::AuthError;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use ed25519_dalek::{Signature, Verifier};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Length of generated nonces.
pub const NONCE_LENGTH: usize = 16;

/// Length of an Ed25519 signature in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

const HEADER_SUFFIX: &str = " wants you to sign in with your Solana account:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthMessage {
    pub domain: String,
    pub address: String,
    pub statement: String,
    pub uri: String,
    pub version: String,
    pub chain_id: String,
    pub nonce: String,
    pub issued_at: Timestamp,
    pub expiration_time: Timestamp,
}

impl AuthMessage {
    pub fn new(config: &AuthMessageConfig, address: &WalletPublicKey, nonce: String, now: Timestamp) -> Self {
        Self {
            domain: config.domain.clone(),
            address: address.to_base58(),
            statement: config.statement.clone(),
            uri: config.uri.clone(),
            version: config.version.clone(),
            chain_id: config.chain_id.clone(),
            nonce,
            issued_at: now,
            expiration_time: now.saturating_add(config.ttl_ms),
        }
    }

    /// Canonical text form.
    pub fn to_message_string(&self) -> String {
        format!(
            "{domain}{HEADER_SUFFIX}\n{address}\n\n{statement}\n\nURI: {uri}\nVersion: {version}\nChain ID: {chain_id}\nNonce: {nonce}\nIssued At: {issued_at}\nExpiration Time: {expiration_time}",
            domain = self.domain,
            address = self.address,
            statement = self.statement,
            uri = self.uri,
            version = self.version,
            chain_id = self.chain_id,
            nonce = self.nonce,
            issued_at = format_timestamp(self.issued_at),
            expiration_time = format_timestamp(self.expiration_time),
        )
    }

    /// UTF-8 bytes of the canonical form; this is what gets signed.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_message_string().into_bytes()
    }

    /// Parse the canonical form back into fields.
    pub fn parse(text: &str) -> Result<Self, AuthError> {
        let malformed = |what: &str| AuthError::MalformedMessage(what.to_string());
        let mut lines = text.split('\n');

        let domain = lines
            .next()
            .and_then(|l| l.strip_suffix(HEADER_SUFFIX))
            .ok_or_else(|| malformed("header"))?;
        let address = lines.next().ok_or_else(|| malformed("address"))?;
        if lines.next() != Some("") {
            return Err(malformed("separator after address"));
        }
        let statement = lines.next().ok_or_else(|| malformed("statement"))?;
        if lines.next() != Some("") {
            return Err(malformed("separator after statement"));
        }

        let mut field = |prefix: &str| -> Result<String, AuthError> {
            lines
                .next()
                .and_then(|l| l.strip_prefix(prefix))
                .map(String::from)
                .ok_or_else(|| malformed(prefix.trim_end_matches(": ")))
        };
        let uri = field("URI: ")?;
        let version = field("Version: ")?;
        let chain_id = field("Chain ID: ")?;
        let nonce = field("Nonce: ")?;
        let issued_at = parse_timestamp(&field("Issued At: ")?)?;
        let expiration_time = parse_timestamp(&field("Expiration Time: ")?)?;

        if lines.next().is_some() {
            return Err(malformed("trailing content"));
        }

        Ok(Self {
            domain: domain.to_string(),
            address: address.to_string(),
            statement: statement.to_string(),
            uri,
            version,
            chain_id,
            nonce,
            issued_at,
            expiration_time,
        })
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expiration_time
    }
}

/// Random alphanumeric nonce.
pub fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LENGTH)
        .map(char::from)
        .collect()
}

/// Verify an Ed25519 signature over `message`.
pub fn verify_ed25519(
    message: &[u8],
    signature: &[u8],
    public_key: &WalletPublicKey,
) -> Result<(), AuthError> {
    let bytes: [u8; SIGNATURE_LENGTH] = signature
        .try_into()
        .map_err(|_| AuthError::InvalidSignatureFormat)?;
    let signature = Signature::from_bytes(&bytes);
    public_key
        .verifying_key()?
        .verify(message, &signature)
        .map_err(|_| AuthError::VerificationFailed)
}

fn format_timestamp(ms: Timestamp) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| ms.to_string())
}

fn parse_timestamp(text: &str) -> Result<Timestamp, AuthError> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .and_then(|dt| Timestamp::try_from(dt.timestamp_millis()).ok())
        .ok_or_else(|| AuthError::MalformedMessage(format!("timestamp {text}")))
}

// =============================================================================
// NONCE REGISTRY
// =============================================================================

/// Issued sign-in nonces. A nonce verifies at most once.
#[derive(Debug, Default)]
pub struct NonceRegistry {
    /// nonce -> expiration time
    issued: HashMap<String, Timestamp>,
    /// nonce -> expiration time, kept until expiry to recognise replays
    consumed: HashMap<String, Timestamp>,
}

impl NonceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self, nonce: &str, expires_at: Timestamp) {
        self.issued.insert(nonce.to_string(), expires_at);
    }

    /// Consume a nonce. Fails for unknown or already-consumed nonces.
    pub fn consume(&mut self, nonce: &str) -> Result<(), AuthError> {
        if self.consumed.contains_key(nonce) {
            return Err(AuthError::NonceReused(nonce.to_string()));
        }
        let expires_at = self
            .issued
            .remove(nonce)
            .ok_or_else(|| AuthError::UnknownNonce(nonce.to_string()))?;
        self.consumed.insert(nonce.to_string(), expires_at);
        Ok(())
    }

    pub fn is_pending(&self, nonce: &str) -> bool {
        self.issued.contains_key(nonce)
    }

    /// Forget nonces whose message has expired. Returns how many were dropped.
    pub fn prune(&mut self, now: Timestamp) -> usize {
        let before = self.issued.len() + self.consumed.len();
        self.issued.retain(|_, expires_at| *expires_at > now);
        self.consumed.retain(|_, expires_at| *expires_at > now);
        before - self.issued.len() - self.consumed.len()
    }

    pub fn len(&self) -> usize {
        self.issued.len() + self.consumed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty() && self.consumed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    const NOW: Timestamp = 1_700_000_000_000;

    fn signer() -> (SigningKey, WalletPublicKey) {
        let key = SigningKey::from_bytes(&[42u8; 32]);
        let public = WalletPublicKey::from_bytes(key.verifying_key().to_bytes());
        (key, public)
    }

    fn message(address: &WalletPublicKey) -> AuthMessage {
        AuthMessage::new(
            &AuthMessageConfig::default(),
            address,
            "abcDEF0123456789".to_string(),
            NOW,
        )
    }

    #[test]
    fn test_canonical_form() {
        let (_, public) = signer();
        let text = message(&public).to_message_string();
        let expected = format!(
            "localhost wants you to sign in with your Solana account:\n{public}\n\n\
             Sign in to verify ownership of this wallet.\n\n\
             URI: https://localhost\nVersion: 1\nChain ID: mainnet\nNonce: abcDEF0123456789\n\
             Issued At: 2023-11-14T22:13:20.000Z\nExpiration Time: 2023-11-14T22:23:20.000Z"
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_parse_inverts_render() {
        let (_, public) = signer();
        let original = message(&public);
        let parsed = AuthMessage::parse(&original.to_message_string()).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_parse_rejects_other_text() {
        assert!(matches!(
            AuthMessage::parse("hello"),
            Err(AuthError::MalformedMessage(_))
        ));
        let (_, public) = signer();
        let extended = format!("{}\nResources: x", message(&public).to_message_string());
        assert!(AuthMessage::parse(&extended).is_err());
    }

    #[test]
    fn test_generated_nonce_shape() {
        let nonce = generate_nonce();
        assert_eq!(nonce.len(), NONCE_LENGTH);
        assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(nonce, generate_nonce());
    }

    #[test]
    fn test_signature_round_trip() {
        let (key, public) = signer();
        let bytes = message(&public).to_bytes();
        let signature = key.sign(&bytes).to_bytes();

        assert_eq!(verify_ed25519(&bytes, &signature, &public), Ok(()));
    }

    #[test]
    fn test_tampered_message_rejected() {
        let (key, public) = signer();
        let bytes = message(&public).to_bytes();
        let signature = key.sign(&bytes).to_bytes();

        let mut tampered = bytes.clone();
        tampered[0] ^= 1;
        assert_eq!(
            verify_ed25519(&tampered, &signature, &public),
            Err(AuthError::VerificationFailed)
        );
    }

    #[test]
    fn test_wrong_key_and_bad_format() {
        let (key, public) = signer();
        let bytes = message(&public).to_bytes();
        let signature = key.sign(&bytes).to_bytes();

        let other = SigningKey::from_bytes(&[7u8; 32]);
        let other_public = WalletPublicKey::from_bytes(other.verifying_key().to_bytes());
        assert_eq!(
            verify_ed25519(&bytes, &signature, &other_public),
            Err(AuthError::VerificationFailed)
        );
        assert_eq!(
            verify_ed25519(&bytes, &signature[..63], &public),
            Err(AuthError::InvalidSignatureFormat)
        );
    }

    #[test]
    fn test_nonce_consumed_once() {
        let mut registry = NonceRegistry::new();
        registry.issue("n1", NOW + 1_000);

        assert_eq!(registry.consume("n1"), Ok(()));
        assert_eq!(registry.consume("n1"), Err(AuthError::NonceReused("n1".into())));
        assert_eq!(registry.consume("n2"), Err(AuthError::UnknownNonce("n2".into())));
    }

    #[test]
    fn test_nonce_prune() {
        let mut registry = NonceRegistry::new();
        registry.issue("old", NOW);
        registry.issue("fresh", NOW + 10_000);
        registry.issue("used", NOW);
        registry.consume("used").unwrap();

        assert_eq!(registry.prune(NOW), 2);
        assert!(registry.is_pending("fresh"));
        assert_eq!(registry.len(), 1);
    }
}
