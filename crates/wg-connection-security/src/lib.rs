//! # Wallet Connection Security
//!
//! Guards connection attempts between a browser application and an injected,
//! untrusted wallet provider object.
//!
//! ## Architecture
//!
//! This crate follows hexagonal architecture:
//! - **Domain Layer** (`domain/`): rate limiting, provider verification, sessions, logs
//! - **Ports Layer** (`ports/`): storage, clock, browser environment and provider traits
//! - **Adapters** (`adapters/`): in-memory/file storage, static environment, cooldown ticker
//! - **Service Layer** (`service.rs`): the `SecurityManager` facade
//!
//! ## Components
//!
//! | Component | Module | Role |
//! |-----------|--------|------|
//! | `RateLimiter` | `domain::rate_limiter` | Per-wallet and global attempt ceilings with backoff |
//! | `ProviderVerifier` | `domain::verifier` | Structural checks on the injected object |
//! | `HijackDetector` | `domain::hijack` | Impersonation and injection heuristics |
//! | `SessionStore` | `domain::session` | Time-boxed sessions and auto-connect flags |
//! | `SecurityMonitor` / `AuditLog` | `domain::monitor`, `domain::audit` | Bounded event logs |
//! | `SecurityManager` | `service` | Facade, origin checks, SIWS messages, signatures |
//!
//! ## Security Notes
//!
//! - Provider heuristics are advisory signals, never a security boundary on their own
//! - Rate limiting is defense-in-depth: storage failures degrade to in-memory state
//! - Corrupt persisted rate-limit state restores to "no restriction" (fail-open)

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;
pub mod verified_provider;

/// Test doubles and fixtures.
///
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export public API
pub use adapters::{CooldownTicker, FileStore, MemoryStore, StaticEnvironment};
pub use domain::assessment::{SecurityAssessment, SecurityIssue};
pub use domain::audit::{AuditCategory, AuditEntry, AuditLog};
pub use domain::auth_message::{AuthMessage, NonceRegistry};
pub use domain::config::{
    AuthMessageConfig, MonitorConfig, RateLimitConfig, SecurityConfig, SessionConfig,
};
pub use domain::entities::{RiskLevel, Severity, Timestamp, WalletPublicKey};
pub use domain::errors::{
    AuthError, ConfigError, LifecycleError, ProviderError, ProviderRejected, SessionError,
    StorageError,
};
pub use domain::hijack::{Confidence, HijackDetector, HijackReport, Recommendation};
pub use domain::lifecycle::{ConnectionPhase, LifecycleEvent};
pub use domain::monitor::{SecurityEvent, SecurityEventType, SecurityMonitor};
pub use domain::provider::{PropertyDescriptor, PropertyValue, ProviderDescriptor};
pub use domain::rate_limiter::{
    AttemptStats, RateLimitStatus, RateLimiter, RestoreOutcome, StatusSeverity,
};
pub use domain::session::{
    AutoConnectDecision, ConnectionState, Session, SessionMetadata, SessionStore,
};
pub use domain::verifier::{ConsistencyReport, ProviderAssessment, ProviderVerifier};
pub use ports::inbound::ConnectionSecurityApi;
pub use ports::outbound::{
    BrowserEnvironment, ConnectOptions, InjectedProvider, KeyValueStore, ProviderEvent,
    SignedMessage, SystemTimeSource, TimeSource,
};
pub use service::{ConnectionOutcome, SecurityManager, SecurityReport};
pub use verified_provider::VerifiedProvider;
