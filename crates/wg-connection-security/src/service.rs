//! # Security Manager
//!
//! Application service layer that implements the `ConnectionSecurityApi` trait.
//!
//! ## Architecture
//!
//! This is the hexagonal "application service" that:
//! - Implements the inbound port (`ConnectionSecurityApi`)
//! - Owns one instance of every domain component, created at startup
//! - Mirrors every decision into the `SecurityMonitor` and the `AuditLog`
//!
//! All state lives in the manager instance; there are no process-wide
//! counters or logs.

use crate::adapters::{MemoryStore, StaticEnvironment};
use crate::domain::assessment::{SecurityAssessment, SecurityIssue};
use crate::domain::audit::{AuditCategory, AuditLog};
use crate::domain::auth_message::{generate_nonce, verify_ed25519, AuthMessage, NonceRegistry};
use crate::domain::config::SecurityConfig;
use crate::domain::entities::{RiskLevel, Severity, Timestamp, WalletPublicKey};
use crate::domain::errors::{
    AuthError, ConfigError, LifecycleError, ProviderRejected, SessionError,
};
use crate::domain::hijack::HijackDetector;
use crate::domain::lifecycle::{ConnectionPhase, LifecycleEvent};
use crate::domain::monitor::{SecurityEvent, SecurityEventType, SecurityMonitor};
use crate::domain::origin::is_origin_allowed;
use crate::domain::provider::ProviderDescriptor;
use crate::domain::rate_limiter::{
    AttemptStats, RateLimitStatus, RateLimiter, RATE_LIMIT_STORAGE_KEY,
};
use crate::domain::session::{AutoConnectDecision, Session, SessionMetadata, SessionStore};
use crate::domain::verifier::{ConsistencyReport, ProviderVerifier};
use crate::ports::inbound::ConnectionSecurityApi;
use crate::ports::outbound::{
    BrowserEnvironment, InjectedProvider, KeyValueStore, SystemTimeSource, TimeSource,
};
use crate::verified_provider::VerifiedProvider;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Events included in `SecurityReport::recent_events`.
pub const REPORT_RECENT_EVENTS: usize = 20;

/// Answer of the provider to a `connect` started with `begin_connection`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// Provider connected with this base58 public key
    Connected { public_key: String },
    /// Provider refused or errored
    Failed { reason: String },
}

/// Diagnostics snapshot of the monitor and audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityReport {
    pub generated_at: Timestamp,
    pub total_events: usize,
    pub events_by_severity: BTreeMap<Severity, usize>,
    pub events_by_type: BTreeMap<SecurityEventType, usize>,
    pub recent_events: Vec<SecurityEvent>,
    pub audit_entries: usize,
    pub audit_failures: usize,
    pub active_sessions: usize,
}

/// Facade over rate limiting, provider verification, sessions and logs.
pub struct SecurityManager {
    config: SecurityConfig,
    limiter: RateLimiter,
    sessions: SessionStore,
    verifier: ProviderVerifier,
    hijack: HijackDetector,
    monitor: SecurityMonitor,
    audit: AuditLog,
    nonces: NonceRegistry,
    phases: HashMap<String, ConnectionPhase>,
    env: Arc<dyn BrowserEnvironment>,
    clock: Arc<dyn TimeSource>,
}

impl SecurityManager {
    /// Create a manager over shared storage.
    ///
    /// Persisted rate-limit state, sessions, flags and the audit mirror are
    /// restored from `store`. A corrupt rate-limit snapshot is discarded and
    /// logged as a `storage-corruption` event.
    ///
    /// # Errors
    /// Returns `ConfigError` if `config` fails validation.
    pub fn new(
        config: SecurityConfig,
        store: Arc<dyn KeyValueStore>,
        env: Arc<dyn BrowserEnvironment>,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let limiter =
            RateLimiter::with_storage(config.rate_limit.clone(), store.clone(), clock.clone());
        let sessions =
            SessionStore::with_storage(config.session.clone(), store.clone(), clock.clone());
        let audit = AuditLog::with_storage(&config.monitor, store, clock.clone());
        let monitor = SecurityMonitor::new(config.monitor.max_events, clock.clone());

        let mut manager = Self {
            config,
            limiter,
            sessions,
            verifier: ProviderVerifier::new(),
            hijack: HijackDetector::new(),
            monitor,
            audit,
            nonces: NonceRegistry::new(),
            phases: HashMap::new(),
            env,
            clock,
        };

        if manager.limiter.last_restore().is_corrupt() {
            warn!(
                key = RATE_LIMIT_STORAGE_KEY,
                "Rate limit snapshot corrupt; continuing without restrictions"
            );
            manager.monitor.log_event(
                SecurityEventType::StorageCorruption,
                Severity::Medium,
                json!({ "key": RATE_LIMIT_STORAGE_KEY, "action": "discarded" }),
            );
        }

        info!(
            origins = manager.config.allowed_origins.len(),
            restore = ?manager.limiter.last_restore(),
            "Security manager initialized"
        );
        Ok(manager)
    }

    /// Manager with in-memory storage, no known origin and the system clock.
    pub fn in_memory(config: SecurityConfig) -> Result<Self, ConfigError> {
        Self::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(StaticEnvironment::default()),
            Arc::new(SystemTimeSource),
        )
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    pub fn monitor(&self) -> &SecurityMonitor {
        &self.monitor
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Check the current origin against the configured allow-list.
    pub fn verify_configured_origin(&mut self) -> bool {
        let allow_list = self.config.allowed_origins.clone();
        self.verify_origin(&allow_list)
    }

    /// What to do about auto-connect on page load.
    pub fn auto_connect_decision(&self) -> AutoConnectDecision {
        self.sessions.auto_connect_decision()
    }

    /// Verify a provider and wrap it.
    ///
    /// The provider must pass the structural and hijack checks and, for a
    /// known wallet, match that wallet's expected shape.
    pub fn verify_provider<P: InjectedProvider>(
        &mut self,
        provider: Arc<P>,
        wallet_name: &str,
        previous_public_key: Option<&str>,
    ) -> Result<VerifiedProvider<P>, ProviderRejected> {
        let descriptor = provider.descriptor();
        let mut assessment = self.validate_provider(&descriptor, previous_public_key);
        let consistency = self.verify_wallet_consistency(wallet_name, &descriptor);

        if !consistency.consistent {
            assessment.is_valid = false;
            assessment.risk_level.raise(RiskLevel::High);
            assessment.issues.push(SecurityIssue {
                severity: Severity::High,
                message: format!(
                    "Provider does not look like {wallet_name} (missing: {}; unexpected: {})",
                    consistency.missing_properties.join(", "),
                    consistency.unexpected_identifiers.join(", ")
                ),
            });
        }

        if !assessment.is_valid {
            warn!(
                wallet = wallet_name,
                risk = %assessment.risk_level,
                issues = assessment.issues.len(),
                "Provider rejected"
            );
            return Err(ProviderRejected {
                wallet_name: wallet_name.to_string(),
                assessment: Box::new(assessment),
            });
        }

        info!(wallet = wallet_name, risk = %assessment.risk_level, "Provider verified");
        Ok(VerifiedProvider::new(
            provider,
            wallet_name,
            previous_public_key.map(String::from),
            assessment,
        ))
    }

    /// Events as a JSON array.
    pub fn export_events_json(&self) -> Result<String, serde_json::Error> {
        self.monitor.export_json()
    }

    /// Audit entries as a JSON array.
    pub fn export_audit_json(&self) -> Result<String, serde_json::Error> {
        self.audit.export_json()
    }

    // =========================================================================
    // INTERNAL HELPERS
    // =========================================================================

    fn record_attempt(&mut self, id: &str, success: bool, details: String) {
        self.limiter.record_attempt(id, success);
        self.audit
            .record(AuditCategory::Connection, Some(id), success, details);
    }

    fn check_auth_response(
        &mut self,
        message: &str,
        signature: &[u8],
        public_key: &str,
    ) -> Result<(), AuthError> {
        let parsed = AuthMessage::parse(message)?;
        let key: WalletPublicKey = public_key.parse()?;

        if parsed.domain != self.config.auth_message.domain {
            return Err(AuthError::MalformedMessage(format!(
                "domain {} is not {}",
                parsed.domain, self.config.auth_message.domain
            )));
        }
        if parsed.address != key.to_base58() {
            return Err(AuthError::AddressMismatch {
                address: parsed.address,
                signer: key.to_base58(),
            });
        }
        if parsed.is_expired(self.clock.now()) {
            return Err(AuthError::Expired {
                expired_at: parsed.expiration_time,
            });
        }

        self.nonces.consume(&parsed.nonce)?;
        verify_ed25519(message.as_bytes(), signature, &key)
    }

    fn set_phase(&mut self, id: &str, phase: ConnectionPhase) {
        debug!(wallet = id, phase = %phase, "Connection phase changed");
        if phase == ConnectionPhase::Idle {
            self.phases.remove(id);
        } else {
            self.phases.insert(id.to_string(), phase);
        }
    }
}

impl ConnectionSecurityApi for SecurityManager {
    fn verify_origin(&mut self, allow_list: &[String]) -> bool {
        let origin = self.env.current_origin();
        let allowed = origin
            .as_deref()
            .is_some_and(|origin| is_origin_allowed(allow_list, origin));

        if !allowed {
            self.monitor.log_event(
                SecurityEventType::InvalidOrigin,
                Severity::High,
                json!({ "origin": origin, "allowed": allow_list }),
            );
            self.audit.record(
                AuditCategory::Security,
                None,
                false,
                format!("Origin {} not allowed", origin.as_deref().unwrap_or("<unknown>")),
            );
        }
        allowed
    }

    fn can_attempt_connection(&mut self, id: &str) -> bool {
        let allowed = self.limiter.can_attempt(id);
        if !allowed {
            let cooldown_ms = self.limiter.cooldown_time(id);
            self.monitor.log_event(
                SecurityEventType::RateLimitExceeded,
                Severity::Medium,
                json!({ "wallet": id, "cooldownMs": cooldown_ms }),
            );
        }
        allowed
    }

    fn record_connection_attempt(&mut self, id: &str, success: bool) {
        let details = if success {
            "Connection attempt succeeded"
        } else {
            "Connection attempt failed"
        };
        self.record_attempt(id, success, details.to_string());
    }

    fn reset_rate_limit(&mut self, id: Option<&str>) {
        self.limiter.clear_rate_limit(id);
        self.audit
            .record(AuditCategory::Security, id, true, "Rate limit reset");
    }

    fn force_retry(&mut self, id: &str) -> bool {
        let granted = self.limiter.force_retry(id);
        if granted {
            self.monitor.log_event(
                SecurityEventType::ForcedRetry,
                Severity::Low,
                json!({ "wallet": id }),
            );
        }
        self.audit.record(
            AuditCategory::Security,
            Some(id),
            granted,
            if granted {
                "Rate limit override granted"
            } else {
                "Rate limit override refused"
            },
        );
        granted
    }

    fn rate_limit_status(&self, id: &str) -> RateLimitStatus {
        self.limiter.rate_limit_status(id)
    }

    fn cooldown_time(&self, id: &str) -> u64 {
        self.limiter.cooldown_time(id)
    }

    fn attempt_stats(&self, id: &str) -> AttemptStats {
        self.limiter.attempt_stats(id)
    }

    fn validate_provider(
        &mut self,
        provider: &ProviderDescriptor,
        previous_public_key: Option<&str>,
    ) -> SecurityAssessment {
        let details = self
            .verifier
            .validate_provider_enhanced(provider, previous_public_key);
        let hijack = self
            .hijack
            .check_provider(provider, self.env.is_nested_frame());
        let assessment = SecurityAssessment::from_checks(details, hijack);

        if assessment.hijack_detected() {
            self.monitor.log_event(
                SecurityEventType::SessionHijackAttempt,
                Severity::Critical,
                json!({
                    "confidence": assessment.hijack.confidence,
                    "indicators": assessment.hijack.indicators,
                }),
            );
        } else if !assessment.is_valid {
            self.monitor.log_event(
                SecurityEventType::SuspiciousProvider,
                assessment.risk_level.into(),
                json!({
                    "risk": assessment.risk_level,
                    "issues": assessment.details.issues,
                }),
            );
        }

        self.audit.record(
            AuditCategory::Validation,
            None,
            assessment.is_valid,
            format!(
                "Provider assessed: risk {}, {} issue(s)",
                assessment.risk_level,
                assessment.issues.len()
            ),
        );
        assessment
    }

    fn verify_wallet_consistency(
        &mut self,
        wallet_name: &str,
        provider: &ProviderDescriptor,
    ) -> ConsistencyReport {
        let report = self.verifier.verify_wallet_consistency(wallet_name, provider);
        if !report.consistent {
            self.monitor.log_event(
                SecurityEventType::WalletInconsistency,
                Severity::High,
                json!({
                    "wallet": wallet_name,
                    "missing": report.missing_properties,
                    "unexpected": report.unexpected_identifiers,
                }),
            );
        }
        self.audit.record(
            AuditCategory::Validation,
            Some(wallet_name),
            report.consistent,
            if report.known {
                "Wallet consistency checked"
            } else {
                "Wallet not in expectation table"
            },
        );
        report
    }

    fn generate_auth_message(&mut self, public_key: &str) -> Result<AuthMessage, AuthError> {
        let key: WalletPublicKey = public_key.parse()?;
        let now = self.clock.now();
        let pruned = self.nonces.prune(now);

        let message = AuthMessage::new(&self.config.auth_message, &key, generate_nonce(), now);
        self.nonces.issue(&message.nonce, message.expiration_time);
        debug!(
            public_key,
            nonce = %message.nonce,
            expires_at = message.expiration_time,
            pruned,
            "Generated auth message"
        );
        Ok(message)
    }

    fn verify_signature(&mut self, message: &[u8], signature: &[u8], public_key: &str) -> bool {
        let result = public_key
            .parse::<WalletPublicKey>()
            .and_then(|key| verify_ed25519(message, signature, &key));
        match result {
            Ok(()) => true,
            Err(e) => {
                self.monitor.log_event(
                    SecurityEventType::SignatureVerificationFailed,
                    Severity::High,
                    json!({ "publicKey": public_key, "reason": e.to_string() }),
                );
                false
            }
        }
    }

    fn verify_auth_response(
        &mut self,
        message: &str,
        signature: &[u8],
        public_key: &str,
    ) -> bool {
        match self.check_auth_response(message, signature, public_key) {
            Ok(()) => {
                self.audit.record(
                    AuditCategory::Security,
                    None,
                    true,
                    format!("Sign-in verified for {public_key}"),
                );
                true
            }
            Err(e) => {
                let event_type = match e {
                    AuthError::NonceReused(_) => SecurityEventType::ReplayAttempt,
                    _ => SecurityEventType::SignatureVerificationFailed,
                };
                self.monitor.log_event(
                    event_type,
                    Severity::High,
                    json!({ "publicKey": public_key, "reason": e.to_string() }),
                );
                self.audit.record(
                    AuditCategory::Security,
                    None,
                    false,
                    format!("Sign-in rejected: {e}"),
                );
                false
            }
        }
    }

    fn begin_connection(&mut self, id: &str) -> Result<ConnectionPhase, LifecycleError> {
        let current = self.connection_phase(id);
        let event = if !self.can_attempt_connection(id) {
            LifecycleEvent::Throttled
        } else if current == ConnectionPhase::RateLimited {
            if self.limiter.override_pending(id) {
                LifecycleEvent::OverrideGranted
            } else {
                LifecycleEvent::CooldownElapsed
            }
        } else {
            LifecycleEvent::Begin
        };

        let next = current.apply(event)?;
        self.set_phase(id, next);
        Ok(next)
    }

    fn complete_connection(
        &mut self,
        id: &str,
        outcome: ConnectionOutcome,
    ) -> Result<ConnectionPhase, LifecycleError> {
        let current = self.connection_phase(id);
        match outcome {
            ConnectionOutcome::Connected { public_key } => {
                let next = current.apply(LifecycleEvent::Succeeded)?;
                self.set_phase(id, next);
                self.record_attempt(id, true, format!("Connected with {public_key}"));
                self.sessions.mark_connected(id);
                if let Err(e) = self.create_session(&public_key, id) {
                    warn!(wallet = id, error = %e, "Could not create session");
                }
                Ok(next)
            }
            ConnectionOutcome::Failed { reason } => {
                let next = current.apply(LifecycleEvent::Failed)?;
                self.set_phase(id, next);
                self.record_attempt(id, false, format!("Connection failed: {reason}"));
                Ok(next)
            }
        }
    }

    fn disconnect(&mut self, wallet_name: &str, user_initiated: bool) {
        self.set_phase(wallet_name, ConnectionPhase::Idle);
        let revoked = self.sessions.mark_disconnected(wallet_name, user_initiated);
        for session in &revoked {
            self.monitor.log_event(
                SecurityEventType::SessionRevoked,
                Severity::Low,
                json!({ "wallet": wallet_name, "sessionId": session.id, "reason": "disconnect" }),
            );
        }
        self.audit.record(
            AuditCategory::Connection,
            Some(wallet_name),
            true,
            if user_initiated {
                "Disconnected by user"
            } else {
                "Disconnected by provider"
            },
        );
    }

    fn connection_phase(&self, id: &str) -> ConnectionPhase {
        self.phases.get(id).copied().unwrap_or_default()
    }

    fn create_session(
        &mut self,
        public_key: &str,
        wallet_name: &str,
    ) -> Result<Session, SessionError> {
        let metadata = SessionMetadata {
            origin: self.env.current_origin(),
            user_agent: self.env.user_agent(),
        };
        let session = self
            .sessions
            .create_session(public_key, wallet_name, None, Some(metadata))?;

        self.monitor.log_event(
            SecurityEventType::SessionCreated,
            Severity::Low,
            json!({ "wallet": wallet_name, "sessionId": session.id }),
        );
        self.audit.record(
            AuditCategory::Connection,
            Some(wallet_name),
            true,
            format!("Session {} created", session.id),
        );
        Ok(session)
    }

    fn validate_session(&mut self, session_id: &str) -> bool {
        self.sessions.validate_session(session_id)
    }

    fn refresh_session(&mut self, session_id: &str) -> Result<Session, SessionError> {
        self.sessions.refresh_session(session_id)
    }

    fn revoke_session(&mut self, session_id: &str) -> bool {
        let Some(session) = self.sessions.revoke_session(session_id) else {
            return false;
        };
        self.monitor.log_event(
            SecurityEventType::SessionRevoked,
            Severity::Low,
            json!({ "wallet": session.wallet_name, "sessionId": session.id, "reason": "revoked" }),
        );
        self.audit.record(
            AuditCategory::Connection,
            Some(&session.wallet_name),
            true,
            format!("Session {} revoked", session.id),
        );
        true
    }

    fn security_report(&self) -> SecurityReport {
        SecurityReport {
            generated_at: self.clock.now(),
            total_events: self.monitor.len(),
            events_by_severity: self.monitor.count_by_severity(),
            events_by_type: self.monitor.count_by_type(),
            recent_events: self.monitor.recent(REPORT_RECENT_EVENTS),
            audit_entries: self.audit.len(),
            audit_failures: self.audit.failures().len(),
            active_sessions: self.sessions.get_active_sessions().len(),
        }
    }
}

impl std::fmt::Debug for SecurityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityManager")
            .field("limiter", &self.limiter)
            .field("phases", &self.phases)
            .field("events", &self.monitor.len())
            .field("audit_entries", &self.audit.len())
            .finish()
    }
}
