//! # Inbound Port - ConnectionSecurityApi
//!
//! Primary driving port used by the connection orchestrator of the host
//! application.
//!
//! ## Call order
//!
//! | Step | Method |
//! |------|--------|
//! | Page load | `verify_origin`, then the auto-connect decision |
//! | Before `connect` | `validate_provider`, `begin_connection` |
//! | After `connect` | `complete_connection` |
//! | Sign-in | `generate_auth_message`, then `verify_auth_response` |
//! | Teardown | `disconnect` |

use crate::domain::assessment::SecurityAssessment;
use crate::domain::auth_message::AuthMessage;
use crate::domain::errors::{AuthError, LifecycleError, SessionError};
use crate::domain::lifecycle::ConnectionPhase;
use crate::domain::provider::ProviderDescriptor;
use crate::domain::rate_limiter::{AttemptStats, RateLimitStatus};
use crate::domain::session::Session;
use crate::domain::verifier::ConsistencyReport;
use crate::service::{ConnectionOutcome, SecurityReport};

/// Primary API of the connection security subsystem.
///
/// Nothing here returns an error for a security refusal: refusals are
/// `false`, a status value or an assessment, and are mirrored into the
/// security monitor and audit log.
///
/// # Example
///
/// ```rust,ignore
/// use wg_connection_security::{ConnectionOutcome, ConnectionSecurityApi};
///
/// async fn connect(guard: &mut impl ConnectionSecurityApi, wallet: &str) {
///     if guard.begin_connection(wallet).is_err() || !guard.can_attempt_connection(wallet) {
///         return;
///     }
///     // ... call the provider ...
///     let outcome = ConnectionOutcome::Connected { public_key: "...".into() };
///     guard.complete_connection(wallet, outcome).ok();
/// }
/// ```
pub trait ConnectionSecurityApi {
    // -------------------------------------------------------------------------
    // Origin
    // -------------------------------------------------------------------------

    /// Check the current page origin against exact origins or `*` globs.
    ///
    /// A miss, or an unknown origin, logs an `invalid-origin` event.
    fn verify_origin(&mut self, allow_list: &[String]) -> bool;

    // -------------------------------------------------------------------------
    // Rate limiting
    // -------------------------------------------------------------------------

    /// Whether a connection attempt for `id` is allowed now.
    ///
    /// Refusals log a `rate-limit-exceeded` event.
    fn can_attempt_connection(&mut self, id: &str) -> bool;

    /// Record the outcome of an attempt and persist limiter state.
    fn record_connection_attempt(&mut self, id: &str, success: bool);

    /// Clear one identifier, or everything when `id` is `None`.
    fn reset_rate_limit(&mut self, id: Option<&str>);

    /// Grant the one-shot override for a rate-limited identifier.
    fn force_retry(&mut self, id: &str) -> bool;

    fn rate_limit_status(&self, id: &str) -> RateLimitStatus;

    /// Milliseconds until `id` may attempt again; 0 when allowed.
    fn cooldown_time(&self, id: &str) -> u64;

    fn attempt_stats(&self, id: &str) -> AttemptStats;

    // -------------------------------------------------------------------------
    // Provider verification
    // -------------------------------------------------------------------------

    /// Structural pass plus hijack scan, merged into one assessment.
    fn validate_provider(
        &mut self,
        provider: &ProviderDescriptor,
        previous_public_key: Option<&str>,
    ) -> SecurityAssessment;

    fn verify_wallet_consistency(
        &mut self,
        wallet_name: &str,
        provider: &ProviderDescriptor,
    ) -> ConsistencyReport;

    // -------------------------------------------------------------------------
    // Authentication
    // -------------------------------------------------------------------------

    /// Build a sign-in message for `public_key` and register its nonce.
    ///
    /// # Errors
    /// - `InvalidPublicKey`: the key is not 32 bytes of base58
    fn generate_auth_message(&mut self, public_key: &str) -> Result<AuthMessage, AuthError>;

    /// Ed25519 check of `signature` over `message`. Never errors.
    fn verify_signature(&mut self, message: &[u8], signature: &[u8], public_key: &str) -> bool;

    /// Full sign-in check: address, expiry, single-use nonce, then signature.
    fn verify_auth_response(&mut self, message: &str, signature: &[u8], public_key: &str)
        -> bool;

    // -------------------------------------------------------------------------
    // Connection lifecycle
    // -------------------------------------------------------------------------

    /// Move `id` into `Attempting`, or `RateLimited` when the limiter refuses.
    ///
    /// # Errors
    /// - `InvalidTransition`: already attempting or connected
    fn begin_connection(&mut self, id: &str) -> Result<ConnectionPhase, LifecycleError>;

    /// Record the provider's answer for an attempt started by `begin_connection`.
    fn complete_connection(
        &mut self,
        id: &str,
        outcome: ConnectionOutcome,
    ) -> Result<ConnectionPhase, LifecycleError>;

    /// Drop the connection and its sessions.
    fn disconnect(&mut self, wallet_name: &str, user_initiated: bool);

    fn connection_phase(&self, id: &str) -> ConnectionPhase;

    // -------------------------------------------------------------------------
    // Sessions
    // -------------------------------------------------------------------------

    fn create_session(&mut self, public_key: &str, wallet_name: &str)
        -> Result<Session, SessionError>;

    fn validate_session(&mut self, session_id: &str) -> bool;

    fn refresh_session(&mut self, session_id: &str) -> Result<Session, SessionError>;

    fn revoke_session(&mut self, session_id: &str) -> bool;

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------

    fn security_report(&self) -> SecurityReport;
}
