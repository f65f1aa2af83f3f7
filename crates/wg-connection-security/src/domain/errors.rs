//! # Connection Security Errors
//!
//! None of these are fatal to the host. Storage errors are caught inside the
//! domain and degrade to in-memory state; provider and signature problems are
//! surfaced as assessments or `false` by the facade.

use crate::domain::assessment::SecurityAssessment;
use thiserror::Error;

/// Durable storage failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// Storage is disabled or not reachable (private browsing, policy)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// The write would exceed the storage quota
    #[error("Storage quota exceeded writing {key} ({size} bytes)")]
    QuotaExceeded { key: String, size: usize },

    /// Underlying I/O failure
    #[error("Storage I/O error: {0}")]
    Io(String),
}

/// Configuration validation failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Invalid rate limiting configuration
    #[error("invalid rate limit: {0}")]
    InvalidRateLimit(String),
    /// Invalid session configuration
    #[error("invalid session config: {0}")]
    InvalidSession(String),
    /// Invalid log buffer configuration
    #[error("invalid monitor config: {0}")]
    InvalidMonitor(String),
    /// Invalid authentication message configuration
    #[error("invalid auth message config: {0}")]
    InvalidAuthMessage(String),
    /// Configuration could not be parsed
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// Session store failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Duration must be positive so that `expires_at > created_at`
    #[error("Session duration must be greater than zero")]
    InvalidDuration,

    /// No session with this id
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Session exists but has expired
    #[error("Session expired: {0}")]
    Expired(String),
}

/// Failures reported by an injected provider call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The user rejected the request in the wallet UI
    #[error("User rejected the request")]
    UserRejected,

    /// Operation requires a connected provider
    #[error("Provider is not connected")]
    NotConnected,

    /// Provider returned a public key that cannot be decoded
    #[error("Provider returned an invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Provider switched accounts since the verified connection
    #[error("Provider public key changed from {previous} to {current}")]
    PublicKeyChanged { previous: String, current: String },

    /// Any other error raised by the provider
    #[error("Provider error: {0}")]
    Internal(String),
}

/// A provider refused by `SecurityManager::verify_provider`.
#[derive(Debug, Clone, Error)]
#[error("Provider for {wallet_name} rejected")]
pub struct ProviderRejected {
    pub wallet_name: String,
    pub assessment: Box<SecurityAssessment>,
}

/// Authentication message and signature failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Public key is not 32 bytes of valid base58 or not a curve point
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Signature is not 64 bytes
    #[error("Invalid signature format")]
    InvalidSignatureFormat,

    /// Signature does not match message and key
    #[error("Signature verification failed")]
    VerificationFailed,

    /// Message text is not a sign-in message
    #[error("Malformed authentication message: {0}")]
    MalformedMessage(String),

    /// Message address differs from the signing key
    #[error("Message address {address} does not match signer {signer}")]
    AddressMismatch { address: String, signer: String },

    /// Message expiration time has passed
    #[error("Authentication message expired at {expired_at}")]
    Expired { expired_at: u64 },

    /// Nonce was never issued by this manager
    #[error("Unknown nonce: {0}")]
    UnknownNonce(String),

    /// Nonce already consumed (replay)
    #[error("Nonce {0} has already been used (replay attempt)")]
    NonceReused(String),
}

/// Invalid connection lifecycle transition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Invalid transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },
}
