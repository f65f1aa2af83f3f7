//! # Provider Verifier
//!
//! Structural inspection of an injected provider.
//!
//! ## Checks
//!
//! 1. Required methods are present and callable
//! 2. Method source text matches an accepted function shape
//! 3. Exactly one wallet identity flag is set
//! 4. The public key matches the one seen on the previous connection
//! 5. Critical methods are not locked behind non-configurable getters or proxies
//!
//! ## Limits
//!
//! Source-shape matching is defeated by trivial wrapping or minification.
//! The result is an advisory signal for the caller's trust decision, not a
//! security boundary.

use crate::domain::entities::RiskLevel;
use crate::domain::provider::{
    PropertyValue, ProviderDescriptor, CRITICAL_METHODS, IDENTITY_FLAGS, REQUIRED_METHODS,
};
use regex::RegexSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

/// Accepted method shapes, matched against trimmed source text.
static ACCEPTED_SIGNATURES: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        // function name(...) / async function name(...)
        r"^(async\s+)?function\s*\*?\s*[A-Za-z_$][\w$]*\s*\(",
        // function (...) / async function (...)
        r"^(async\s+)?function\s*\*?\s*\(",
        // method shorthand: name(...) { / async name(...) {
        r"^(async\s+)?[A-Za-z_$][\w$]*\s*\([^)]*\)\s*\{",
        // (args) => / async (args) =>
        r"^(async\s+)?\([^)]*\)\s*=>",
        // arg => / async arg =>
        r"^(async\s+)?[A-Za-z_$][\w$]*\s*=>",
        // bound or built-in functions
        r"\{\s*\[native code\]\s*\}\s*$",
    ])
    .expect("accepted signature patterns are valid")
});

/// Expected shape of a known wallet's provider.
struct WalletExpectation {
    name: &'static str,
    identity_flag: &'static str,
    properties: &'static [&'static str],
}

const STANDARD_PROPERTIES: &[&str] = &[
    "connect",
    "disconnect",
    "signTransaction",
    "signAllTransactions",
    "signMessage",
    "on",
];

const MINIMAL_PROPERTIES: &[&str] = &["connect", "disconnect", "signTransaction", "signMessage"];

const WALLET_EXPECTATIONS: &[WalletExpectation] = &[
    WalletExpectation {
        name: "phantom",
        identity_flag: "isPhantom",
        properties: STANDARD_PROPERTIES,
    },
    WalletExpectation {
        name: "solflare",
        identity_flag: "isSolflare",
        properties: STANDARD_PROPERTIES,
    },
    WalletExpectation {
        name: "backpack",
        identity_flag: "isBackpack",
        properties: STANDARD_PROPERTIES,
    },
    WalletExpectation {
        name: "glow",
        identity_flag: "isGlow",
        properties: MINIMAL_PROPERTIES,
    },
    WalletExpectation {
        name: "coinbase",
        identity_flag: "isCoinbaseWallet",
        properties: MINIMAL_PROPERTIES,
    },
    WalletExpectation {
        name: "exodus",
        identity_flag: "isExodus",
        properties: MINIMAL_PROPERTIES,
    },
    WalletExpectation {
        name: "brave",
        identity_flag: "isBraveWallet",
        properties: MINIMAL_PROPERTIES,
    },
    WalletExpectation {
        name: "trust",
        identity_flag: "isTrust",
        properties: MINIMAL_PROPERTIES,
    },
];

/// What went wrong with a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    MissingMethod,
    UnrecognizedSignature,
    UnknownProvider,
    MultipleIdentifiers,
    PublicKeyMismatch,
    NonConfigurableGetter,
    ProxyWrapped,
}

impl IssueKind {
    /// Risk contributed by one issue of this kind.
    pub fn risk(&self) -> RiskLevel {
        match self {
            IssueKind::MissingMethod
            | IssueKind::UnrecognizedSignature
            | IssueKind::UnknownProvider
            | IssueKind::ProxyWrapped => RiskLevel::Medium,
            IssueKind::MultipleIdentifiers
            | IssueKind::PublicKeyMismatch
            | IssueKind::NonConfigurableGetter => RiskLevel::High,
        }
    }

    /// Whether the issue makes the provider invalid.
    pub fn blocks_validity(&self) -> bool {
        !matches!(self, IssueKind::UnknownProvider | IssueKind::ProxyWrapped)
    }
}

/// A single finding of the structural pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIssue {
    pub kind: IssueKind,
    pub message: String,
}

/// Output of `validate_provider_enhanced`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAssessment {
    pub is_valid: bool,
    pub issues: Vec<ProviderIssue>,
    pub security_risk: RiskLevel,
    pub detected_identifiers: Vec<String>,
    /// Method name -> accepted signature
    pub method_signatures: BTreeMap<String, bool>,
    pub suspicious_patterns: Vec<String>,
    /// `Some(false)` when the key changed since the previous connection
    pub public_key_consistency: Option<bool>,
}

impl Default for ProviderAssessment {
    fn default() -> Self {
        Self {
            is_valid: true,
            issues: Vec::new(),
            security_risk: RiskLevel::Low,
            detected_identifiers: Vec::new(),
            method_signatures: BTreeMap::new(),
            suspicious_patterns: Vec::new(),
            public_key_consistency: None,
        }
    }
}

impl ProviderAssessment {
    fn flag(&mut self, kind: IssueKind, message: String) {
        self.security_risk.raise(kind.risk());
        if kind.blocks_validity() {
            self.is_valid = false;
        }
        self.issues.push(ProviderIssue { kind, message });
    }

    pub fn has_issue(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|i| i.kind == kind)
    }
}

/// Result of comparing a provider against a known wallet's expected shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyReport {
    pub wallet_name: String,
    /// Wallet name found in the expectation table
    pub known: bool,
    pub consistent: bool,
    pub missing_properties: Vec<String>,
    pub unexpected_identifiers: Vec<String>,
}

/// Structural verifier for injected providers.
#[derive(Debug, Default, Clone)]
pub struct ProviderVerifier;

impl ProviderVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Whether `source` has one of the accepted function shapes.
    pub fn is_accepted_signature(&self, source: &str) -> bool {
        ACCEPTED_SIGNATURES.is_match(source.trim())
    }

    /// Run the structural pass over a provider snapshot.
    pub fn validate_provider_enhanced(
        &self,
        provider: &ProviderDescriptor,
        previous_public_key: Option<&str>,
    ) -> ProviderAssessment {
        let mut assessment = ProviderAssessment::default();

        // Required methods and their shapes
        for method in REQUIRED_METHODS {
            match provider.method_source(method) {
                None => {
                    assessment
                        .method_signatures
                        .insert(method.to_string(), false);
                    assessment.flag(
                        IssueKind::MissingMethod,
                        format!("Missing required method: {method}"),
                    );
                }
                Some(source) => {
                    let accepted = self.is_accepted_signature(source);
                    assessment
                        .method_signatures
                        .insert(method.to_string(), accepted);
                    if !accepted {
                        assessment
                            .suspicious_patterns
                            .push(format!("{method}: unrecognized function shape"));
                        assessment.flag(
                            IssueKind::UnrecognizedSignature,
                            format!("Unrecognized signature for method: {method}"),
                        );
                    }
                }
            }
        }

        // Identity flags
        let identifiers = provider.identity_flags();
        match identifiers.len() {
            0 => assessment.flag(
                IssueKind::UnknownProvider,
                "Unknown provider: no wallet identifier detected".to_string(),
            ),
            1 => {}
            _ => assessment.flag(
                IssueKind::MultipleIdentifiers,
                format!(
                    "Multiple wallet identifiers detected ({}): potential hijacking",
                    identifiers.join(", ")
                ),
            ),
        }
        assessment.detected_identifiers = identifiers;

        // Public key continuity
        if let (Some(previous), Some(current)) = (previous_public_key, provider.public_key.as_deref())
        {
            let consistent = previous == current;
            assessment.public_key_consistency = Some(consistent);
            if !consistent {
                assessment.flag(
                    IssueKind::PublicKeyMismatch,
                    format!("Public key changed since last connection (was {previous}, now {current})"),
                );
            }
        }

        // Tamper signals on critical methods
        for method in CRITICAL_METHODS {
            let Some(descriptor) = provider.property(method) else {
                continue;
            };
            if descriptor.has_getter && !descriptor.configurable {
                assessment
                    .suspicious_patterns
                    .push(format!("{method}: non-configurable getter"));
                assessment.flag(
                    IssueKind::NonConfigurableGetter,
                    format!("Non-configurable getter on critical method: {method}"),
                );
            }
            if let PropertyValue::Function { is_proxy: true, .. } = descriptor.value {
                assessment
                    .suspicious_patterns
                    .push(format!("{method}: proxy-wrapped implementation"));
                assessment.flag(
                    IssueKind::ProxyWrapped,
                    format!("Method {method} is wrapped in a Proxy"),
                );
            }
        }

        debug!(
            valid = assessment.is_valid,
            risk = %assessment.security_risk,
            issues = assessment.issues.len(),
            "Provider structural pass complete"
        );

        assessment
    }

    /// Compare a provider with the expectation table for `wallet_name`.
    pub fn verify_wallet_consistency(
        &self,
        wallet_name: &str,
        provider: &ProviderDescriptor,
    ) -> ConsistencyReport {
        let normalized = normalize_wallet_name(wallet_name);
        let Some(expected) = WALLET_EXPECTATIONS.iter().find(|w| w.name == normalized) else {
            return ConsistencyReport {
                wallet_name: wallet_name.to_string(),
                known: false,
                consistent: true,
                missing_properties: Vec::new(),
                unexpected_identifiers: Vec::new(),
            };
        };

        let mut missing_properties: Vec<String> = expected
            .properties
            .iter()
            .filter(|p| !provider.has_property(p))
            .map(|p| p.to_string())
            .collect();
        if !provider.flag(expected.identity_flag) {
            missing_properties.insert(0, expected.identity_flag.to_string());
        }

        let unexpected_identifiers: Vec<String> = IDENTITY_FLAGS
            .iter()
            .filter(|flag| **flag != expected.identity_flag && provider.flag(flag))
            .map(|flag| flag.to_string())
            .collect();

        ConsistencyReport {
            wallet_name: wallet_name.to_string(),
            known: true,
            consistent: missing_properties.is_empty() && unexpected_identifiers.is_empty(),
            missing_properties,
            unexpected_identifiers,
        }
    }
}

/// "Coinbase Wallet" -> "coinbase", "Phantom" -> "phantom".
fn normalize_wallet_name(name: &str) -> String {
    let compact: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    match compact.strip_suffix("wallet") {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => compact,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{phantom_descriptor, standard_methods};

    #[test]
    fn test_accepted_signature_shapes() {
        let verifier = ProviderVerifier::new();
        for source in [
            "function connect(options) { return this.request(options); }",
            "async function signMessage(message) { return await this.sign(message); }",
            "function (tx) { return tx; }",
            "async connect(opts) { return this._connect(opts); }",
            "async (message) => this.sign(message)",
            "tx => sign(tx)",
            "function signTransaction() { [native code] }",
        ] {
            assert!(verifier.is_accepted_signature(source), "{source}");
        }
    }

    #[test]
    fn test_rejected_signature_shapes() {
        let verifier = ProviderVerifier::new();
        for source in ["", "[object Object]", "class Wallet {}", "return 1;"] {
            assert!(!verifier.is_accepted_signature(source), "{source}");
        }
    }

    #[test]
    fn test_single_identity_valid() {
        let verifier = ProviderVerifier::new();
        let assessment = verifier.validate_provider_enhanced(&phantom_descriptor(), None);

        assert!(assessment.is_valid, "{:?}", assessment.issues);
        assert_eq!(assessment.security_risk, RiskLevel::Low);
        assert_eq!(assessment.detected_identifiers, vec!["isPhantom"]);
        assert!(assessment.method_signatures.values().all(|ok| *ok));
    }

    #[test]
    fn test_multiple_identifiers_high_risk() {
        let verifier = ProviderVerifier::new();
        let provider = phantom_descriptor().with_flag("isSolflare", true);
        let assessment = verifier.validate_provider_enhanced(&provider, None);

        assert!(!assessment.is_valid);
        assert_eq!(assessment.security_risk, RiskLevel::High);
        assert!(assessment
            .issues
            .iter()
            .any(|i| i.message.contains("Multiple wallet identifiers detected")));
    }

    #[test]
    fn test_no_identifier_medium_risk() {
        let verifier = ProviderVerifier::new();
        let assessment = verifier.validate_provider_enhanced(&standard_methods(), None);

        assert_eq!(assessment.security_risk, RiskLevel::Medium);
        assert!(assessment.has_issue(IssueKind::UnknownProvider));
        // Unknown is a warning, not a block
        assert!(assessment.is_valid);
    }

    #[test]
    fn test_missing_method_invalid() {
        let verifier = ProviderVerifier::new();
        let mut provider = phantom_descriptor();
        provider.properties.remove("signMessage");
        let assessment = verifier.validate_provider_enhanced(&provider, None);

        assert!(!assessment.is_valid);
        assert_eq!(assessment.method_signatures.get("signMessage"), Some(&false));
        assert!(assessment
            .issues
            .iter()
            .any(|i| i.message == "Missing required method: signMessage"));
    }

    #[test]
    fn test_unrecognized_signature_flagged() {
        let verifier = ProviderVerifier::new();
        let provider = phantom_descriptor().with_method("signMessage", "[object Function]");
        let assessment = verifier.validate_provider_enhanced(&provider, None);

        assert!(!assessment.is_valid);
        assert_eq!(assessment.security_risk, RiskLevel::Medium);
        assert!(!assessment.suspicious_patterns.is_empty());
    }

    #[test]
    fn test_public_key_mismatch() {
        let verifier = ProviderVerifier::new();
        let provider = phantom_descriptor().with_public_key("KeyB");
        let assessment = verifier.validate_provider_enhanced(&provider, Some("KeyA"));

        assert_eq!(assessment.public_key_consistency, Some(false));
        assert_eq!(assessment.security_risk, RiskLevel::High);
        assert!(!assessment.is_valid);

        let same = verifier.validate_provider_enhanced(&provider, Some("KeyB"));
        assert_eq!(same.public_key_consistency, Some(true));
        assert!(same.is_valid);
    }

    #[test]
    fn test_key_consistency_unknown_without_current_key() {
        let verifier = ProviderVerifier::new();
        let assessment = verifier.validate_provider_enhanced(&phantom_descriptor(), Some("KeyA"));
        assert_eq!(assessment.public_key_consistency, None);
    }

    #[test]
    fn test_non_configurable_getter_blocks() {
        let verifier = ProviderVerifier::new();
        let provider = phantom_descriptor().with_getter_method(
            "signTransaction",
            "function signTransaction(tx) { return this.request(tx); }",
            false,
        );
        let assessment = verifier.validate_provider_enhanced(&provider, None);

        assert!(!assessment.is_valid);
        assert!(assessment.has_issue(IssueKind::NonConfigurableGetter));
        assert_eq!(assessment.security_risk, RiskLevel::High);
    }

    #[test]
    fn test_proxy_is_advisory() {
        let verifier = ProviderVerifier::new();
        let provider = phantom_descriptor().with_proxy_method(
            "connect",
            "function connect() { [native code] }",
        );
        let assessment = verifier.validate_provider_enhanced(&provider, None);

        assert!(assessment.is_valid);
        assert_eq!(assessment.security_risk, RiskLevel::Medium);
        assert!(assessment.has_issue(IssueKind::ProxyWrapped));
    }

    #[test]
    fn test_wallet_consistency_known_wallet() {
        let verifier = ProviderVerifier::new();
        let report = verifier.verify_wallet_consistency("Phantom", &phantom_descriptor());
        assert!(report.known);
        assert!(report.consistent, "{report:?}");
    }

    #[test]
    fn test_wallet_consistency_reports_foreign_flags() {
        let verifier = ProviderVerifier::new();
        let provider = phantom_descriptor().with_flag("isSolflare", true);
        let report = verifier.verify_wallet_consistency("Solflare", &provider);

        assert!(!report.consistent);
        assert_eq!(report.unexpected_identifiers, vec!["isPhantom"]);
        assert!(report.missing_properties.is_empty());
    }

    #[test]
    fn test_wallet_consistency_missing_properties() {
        let verifier = ProviderVerifier::new();
        let report = verifier.verify_wallet_consistency("Coinbase Wallet", &standard_methods());
        assert!(report.known);
        assert_eq!(report.missing_properties, vec!["isCoinbaseWallet"]);
    }

    #[test]
    fn test_wallet_consistency_unknown_wallet() {
        let verifier = ProviderVerifier::new();
        let report = verifier.verify_wallet_consistency("Homebrew", &standard_methods());
        assert!(!report.known);
        assert!(report.consistent);
    }

    #[test]
    fn test_normalize_wallet_name() {
        assert_eq!(normalize_wallet_name("Coinbase Wallet"), "coinbase");
        assert_eq!(normalize_wallet_name("Trust Wallet"), "trust");
        assert_eq!(normalize_wallet_name("Wallet"), "wallet");
        assert_eq!(normalize_wallet_name("Phantom"), "phantom");
    }
}
