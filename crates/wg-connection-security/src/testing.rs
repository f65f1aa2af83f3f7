//! Centralized Testing Utilities
//!
//! Mocks and fixtures used by the unit tests and by downstream integration
//! suites. Available with the `test-utils` feature flag.

use crate::domain::entities::{Timestamp, WalletPublicKey};
use crate::domain::errors::{ProviderError, StorageError};
use crate::domain::provider::ProviderDescriptor;
use crate::ports::outbound::{
    ConnectOptions, InjectedProvider, KeyValueStore, ProviderCallback, ProviderEvent,
    SignedMessage, TimeSource,
};
use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

// =============================================================================
// TIME
// =============================================================================

/// Manually driven clock.
#[derive(Debug)]
pub struct MockTimeSource {
    time: AtomicU64,
}

impl MockTimeSource {
    pub fn new(initial: Timestamp) -> Self {
        Self {
            time: AtomicU64::new(initial),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.time.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, time: Timestamp) {
        self.time.store(time, Ordering::SeqCst);
    }
}

impl TimeSource for MockTimeSource {
    fn now(&self) -> Timestamp {
        self.time.load(Ordering::SeqCst)
    }
}

// =============================================================================
// STORAGE
// =============================================================================

/// Storage that is always unavailable (private browsing, disabled storage).
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("storage disabled".into()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("storage disabled".into()))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("storage disabled".into()))
    }
}

// =============================================================================
// PROVIDER FIXTURES
// =============================================================================

/// The standard provider methods with ordinary source text and no identity flag.
pub fn standard_methods() -> ProviderDescriptor {
    ProviderDescriptor::new()
        .with_method(
            "connect",
            "async connect(options) { return this._request('connect', options); }",
        )
        .with_method(
            "disconnect",
            "async disconnect() { return this._request('disconnect'); }",
        )
        .with_method(
            "signTransaction",
            "async signTransaction(transaction) { return this._sign(transaction); }",
        )
        .with_method(
            "signAllTransactions",
            "async signAllTransactions(transactions) { return Promise.all(transactions.map((t) => this._sign(t))); }",
        )
        .with_method(
            "signMessage",
            "async signMessage(message, display = 'utf8') { return this._request('signMessage', { message, display }); }",
        )
        .with_method(
            "on",
            "on(event, listener) { return this._events.on(event, listener); }",
        )
        .with_flag("isConnected", false)
}

/// A well-formed Phantom provider.
pub fn phantom_descriptor() -> ProviderDescriptor {
    standard_methods().with_flag("isPhantom", true)
}

/// Deterministic keypair from a one-byte seed.
pub fn keypair(seed: u8) -> (SigningKey, WalletPublicKey) {
    let signing_key = SigningKey::from_bytes(&[seed; 32]);
    let public_key = WalletPublicKey::from_bytes(signing_key.verifying_key().to_bytes());
    (signing_key, public_key)
}

// =============================================================================
// MOCK PROVIDER
// =============================================================================

/// In-process wallet that signs with a real Ed25519 key.
pub struct MockProvider {
    descriptor: ProviderDescriptor,
    signing_key: Mutex<SigningKey>,
    connected: AtomicBool,
    reject_connect: AtomicBool,
    listeners: Mutex<Vec<(ProviderEvent, ProviderCallback)>>,
}

impl MockProvider {
    /// Phantom-shaped provider with the key derived from `seed`.
    pub fn phantom(seed: u8) -> Self {
        Self::with_descriptor(phantom_descriptor(), seed)
    }

    pub fn with_descriptor(descriptor: ProviderDescriptor, seed: u8) -> Self {
        let (signing_key, _) = keypair(seed);
        Self {
            descriptor,
            signing_key: Mutex::new(signing_key),
            connected: AtomicBool::new(false),
            reject_connect: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn public_key(&self) -> WalletPublicKey {
        WalletPublicKey::from_bytes(self.signing_key.lock().verifying_key().to_bytes())
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Make the next `connect` calls fail as if the user clicked "reject".
    pub fn set_reject_connect(&self, reject: bool) {
        self.reject_connect.store(reject, Ordering::SeqCst);
    }

    /// Switch to the account derived from `seed` and notify listeners.
    pub fn switch_account(&self, seed: u8) {
        *self.signing_key.lock() = keypair(seed).0;
        self.emit(ProviderEvent::AccountChanged);
    }

    fn emit(&self, event: ProviderEvent) {
        let key = self.is_connected().then(|| self.public_key().to_base58());
        for (registered, callback) in self.listeners.lock().iter() {
            if *registered == event {
                callback(key.clone());
            }
        }
    }
}

#[async_trait]
impl InjectedProvider for MockProvider {
    fn descriptor(&self) -> ProviderDescriptor {
        let mut descriptor = self.descriptor.clone();
        if self.is_connected() {
            descriptor.public_key = Some(self.public_key().to_base58());
        }
        descriptor
    }

    async fn connect(&self, _options: ConnectOptions) -> Result<String, ProviderError> {
        if self.reject_connect.load(Ordering::SeqCst) {
            return Err(ProviderError::UserRejected);
        }
        self.connected.store(true, Ordering::SeqCst);
        self.emit(ProviderEvent::Connect);
        Ok(self.public_key().to_base58())
    }

    async fn disconnect(&self) -> Result<(), ProviderError> {
        self.emit(ProviderEvent::Disconnect);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn sign_transaction(&self, transaction: &[u8]) -> Result<Vec<u8>, ProviderError> {
        if !self.is_connected() {
            return Err(ProviderError::NotConnected);
        }
        let signature = self.signing_key.lock().sign(transaction);
        Ok([signature.to_bytes().as_slice(), transaction].concat())
    }

    async fn sign_message(&self, message: &[u8]) -> Result<SignedMessage, ProviderError> {
        if !self.is_connected() {
            return Err(ProviderError::NotConnected);
        }
        let signature = self.signing_key.lock().sign(message);
        Ok(SignedMessage {
            signature: signature.to_bytes().to_vec(),
        })
    }

    fn on(&self, event: ProviderEvent, callback: ProviderCallback) {
        self.listeners.lock().push((event, callback));
    }
}
