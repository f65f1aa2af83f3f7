//! # Outbound Ports (Driven Ports / SPI)
//!
//! Traits that define the dependencies this subsystem needs from its host.

use crate::domain::entities::Timestamp;
use crate::domain::errors::{ProviderError, StorageError};
use crate::domain::provider::ProviderDescriptor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// =============================================================================
// DURABLE STORAGE
// =============================================================================

/// String key/value storage shared by every tab of the application.
///
/// Writes from different tabs interleave last-write-wins; callers treat the
/// contents as an eventually-consistent cache.
pub trait KeyValueStore: Send + Sync {
    /// Read a value. `Ok(None)` when the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// =============================================================================
// TIME
// =============================================================================

/// Time source for consistent timestamp handling.
///
/// Abstracted to allow testing with deterministic time.
pub trait TimeSource: Send + Sync {
    /// Returns the current timestamp in milliseconds.
    fn now(&self) -> Timestamp;
}

/// Default system time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }
}

// =============================================================================
// BROWSER ENVIRONMENT
// =============================================================================

/// Facts about the page the subsystem runs in.
pub trait BrowserEnvironment: Send + Sync {
    /// Origin of the current page (`scheme://host[:port]`), if known.
    fn current_origin(&self) -> Option<String>;

    /// True when running inside an iframe or other nested browsing context.
    fn is_nested_frame(&self) -> bool;

    /// Browser user agent, recorded in session metadata.
    fn user_agent(&self) -> Option<String>;
}

// =============================================================================
// INJECTED PROVIDER
// =============================================================================

/// Options forwarded to `connect`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectOptions {
    /// Connect silently only if the wallet already trusts this site
    pub only_if_trusted: bool,
}

/// Result of `signMessage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedMessage {
    pub signature: Vec<u8>,
}

/// Events a provider can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderEvent {
    Connect,
    Disconnect,
    AccountChanged,
}

impl ProviderEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderEvent::Connect => "connect",
            ProviderEvent::Disconnect => "disconnect",
            ProviderEvent::AccountChanged => "accountChanged",
        }
    }
}

/// Callback registered with `on`. Receives the current public key, if any.
pub type ProviderCallback = Box<dyn Fn(Option<String>) + Send + Sync>;

/// The untrusted, externally-injected wallet object.
///
/// Nothing outside `VerifiedProvider` should call the operations directly;
/// the facade only hands out wrapped providers that passed verification.
#[async_trait]
pub trait InjectedProvider: Send + Sync {
    /// Structural snapshot of the object for inspection.
    fn descriptor(&self) -> ProviderDescriptor;

    /// Request a connection. Returns the base58 public key.
    async fn connect(&self, options: ConnectOptions) -> Result<String, ProviderError>;

    /// Disconnect from the wallet.
    async fn disconnect(&self) -> Result<(), ProviderError>;

    /// Sign a serialized transaction, returning the signed bytes.
    async fn sign_transaction(&self, transaction: &[u8]) -> Result<Vec<u8>, ProviderError>;

    /// Sign arbitrary bytes with the account key.
    async fn sign_message(&self, message: &[u8]) -> Result<SignedMessage, ProviderError>;

    /// Subscribe to a provider event.
    fn on(&self, event: ProviderEvent, callback: ProviderCallback);
}
