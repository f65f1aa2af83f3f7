//! # Verified Provider
//!
//! Capability wrapper around an injected provider that passed
//! `SecurityManager::verify_provider`.
//!
//! ## Why a wrapper
//!
//! The injected object is untrusted and duck-typed. Calling it directly lets
//! any code skip the structural checks:
//!
//! ```ignore
//! // UNCHECKED: raw provider reaches the wallet UI
//! window_provider.sign_message(bytes).await;
//! ```
//!
//! `VerifiedProvider` can only be built by the facade, so holding one proves
//! the checks ran. It also pins the account: signing refuses to proceed once
//! the provider reports a different public key than the one it connected with.
//!
//! ```ignore
//! let verified = manager.verify_provider(provider, "Phantom", None)?;
//! let key = verified.connect(ConnectOptions::default()).await?;
//! let signed = verified.sign_message(b"hello").await?;
//! ```

use crate::domain::assessment::SecurityAssessment;
use crate::domain::entities::WalletPublicKey;
use crate::domain::errors::ProviderError;
use crate::ports::outbound::{
    ConnectOptions, InjectedProvider, ProviderCallback, ProviderEvent, SignedMessage,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

pub struct VerifiedProvider<P: InjectedProvider> {
    inner: Arc<P>,
    wallet_name: String,
    assessment: SecurityAssessment,
    /// Key the account must keep (from a previous connection)
    expected_key: Option<String>,
    /// Key returned by the last successful `connect`
    connected_key: RwLock<Option<WalletPublicKey>>,
}

impl<P: InjectedProvider> VerifiedProvider<P> {
    pub(crate) fn new(
        inner: Arc<P>,
        wallet_name: &str,
        expected_key: Option<String>,
        assessment: SecurityAssessment,
    ) -> Self {
        Self {
            inner,
            wallet_name: wallet_name.to_string(),
            assessment,
            expected_key,
            connected_key: RwLock::new(None),
        }
    }

    pub fn wallet_name(&self) -> &str {
        &self.wallet_name
    }

    /// Assessment the provider passed.
    pub fn assessment(&self) -> &SecurityAssessment {
        &self.assessment
    }

    pub fn public_key(&self) -> Option<WalletPublicKey> {
        *self.connected_key.read()
    }

    pub fn is_connected(&self) -> bool {
        self.connected_key.read().is_some()
    }

    /// Connect and return the account key.
    ///
    /// # Errors
    /// - `InvalidPublicKey`: the provider answered with an undecodable key
    /// - `PublicKeyChanged`: the key differs from the expected one
    /// - any error raised by the provider itself
    pub async fn connect(&self, options: ConnectOptions) -> Result<WalletPublicKey, ProviderError> {
        let reported = self.inner.connect(options).await?;
        let key: WalletPublicKey = reported
            .parse()
            .map_err(|_| ProviderError::InvalidPublicKey(reported.clone()))?;

        if let Some(expected) = self.expected_key.as_deref() {
            if expected != reported {
                warn!(
                    wallet = %self.wallet_name,
                    expected,
                    reported = %reported,
                    "Provider connected with an unexpected account"
                );
                return Err(ProviderError::PublicKeyChanged {
                    previous: expected.to_string(),
                    current: reported,
                });
            }
        }

        *self.connected_key.write() = Some(key);
        info!(wallet = %self.wallet_name, public_key = %key, "Verified provider connected");
        Ok(key)
    }

    pub async fn disconnect(&self) -> Result<(), ProviderError> {
        self.inner.disconnect().await?;
        *self.connected_key.write() = None;
        info!(wallet = %self.wallet_name, "Verified provider disconnected");
        Ok(())
    }

    pub async fn sign_message(&self, message: &[u8]) -> Result<SignedMessage, ProviderError> {
        self.ensure_same_account()?;
        self.inner.sign_message(message).await
    }

    pub async fn sign_transaction(&self, transaction: &[u8]) -> Result<Vec<u8>, ProviderError> {
        self.ensure_same_account()?;
        self.inner.sign_transaction(transaction).await
    }

    pub fn on(&self, event: ProviderEvent, callback: ProviderCallback) {
        self.inner.on(event, callback);
    }

    /// Signing needs a connection whose account has not switched underneath.
    fn ensure_same_account(&self) -> Result<(), ProviderError> {
        let Some(connected) = *self.connected_key.read() else {
            return Err(ProviderError::NotConnected);
        };
        let current = self.inner.descriptor().public_key;
        match current {
            Some(current) if current != connected.to_base58() => {
                warn!(
                    wallet = %self.wallet_name,
                    previous = %connected,
                    current = %current,
                    "Provider account changed since connect"
                );
                Err(ProviderError::PublicKeyChanged {
                    previous: connected.to_base58(),
                    current,
                })
            }
            _ => Ok(()),
        }
    }
}

impl<P: InjectedProvider> std::fmt::Debug for VerifiedProvider<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifiedProvider")
            .field("wallet_name", &self.wallet_name)
            .field("risk_level", &self.assessment.risk_level)
            .field("public_key", &self.public_key())
            .finish()
    }
}
