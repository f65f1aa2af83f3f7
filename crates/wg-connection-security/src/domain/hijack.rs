//! # Hijack Detector
//!
//! Heuristic scan for impersonating or injected providers.
//!
//! Indicators, strongest first:
//! - more than one wallet identity flag (short-circuits)
//! - dynamic code execution in a critical method body
//! - obfuscated method bodies
//! - running inside a nested browsing context
//!
//! Like the structural verifier, this is an advisory signal only.

use crate::domain::provider::ProviderDescriptor;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Bodies shorter than this are candidates for the density check.
pub const SHORT_BODY_LIMIT: usize = 120;

/// Bracket density above which a short body is considered obfuscated.
pub const BRACKET_DENSITY_THRESHOLD: f64 = 0.30;

/// More indicators than this turns a clean result into `Caution`.
pub const CAUTION_INDICATOR_THRESHOLD: usize = 2;

static DYNAMIC_CODE: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\beval\s*\(", "eval"),
        (r"\bnew\s+Function\s*\(", "new Function"),
        (r#"(^|[^\w$.])Function\s*\(\s*["'`]"#, "Function constructor"),
        (r#"\bset(Timeout|Interval)\s*\(\s*["'`]"#, "string timer"),
    ]
    .into_iter()
    .map(|(pattern, label)| {
        (
            Regex::new(pattern).expect("dynamic code pattern is valid"),
            label,
        )
    })
    .collect()
});

static ESCAPE_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\\x[0-9a-fA-F]{2}){4,}|(\\u[0-9a-fA-F]{4}){3,}|\b_0x[0-9a-fA-F]{4,}")
        .expect("escape run pattern is valid")
});

/// Confidence of a hijack finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        })
    }
}

/// What the caller should do with the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Safe,
    Caution,
    Avoid,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Recommendation::Safe => "safe",
            Recommendation::Caution => "caution",
            Recommendation::Avoid => "avoid",
        })
    }
}

/// Result of `check_provider`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HijackReport {
    pub suspicious: bool,
    pub confidence: Confidence,
    pub indicators: Vec<String>,
    pub recommendation: Recommendation,
}

impl HijackReport {
    fn clean() -> Self {
        Self {
            suspicious: false,
            confidence: Confidence::Low,
            indicators: Vec::new(),
            recommendation: Recommendation::Safe,
        }
    }

    fn indicate(&mut self, confidence: Confidence, indicator: String) {
        self.confidence = self.confidence.max(confidence);
        self.indicators.push(indicator);
    }

    fn finish(mut self) -> Self {
        self.recommendation = if self.suspicious {
            Recommendation::Avoid
        } else if self.indicators.len() > CAUTION_INDICATOR_THRESHOLD {
            Recommendation::Caution
        } else {
            Recommendation::Safe
        };
        self
    }
}

/// Heuristic hijack detector.
#[derive(Debug, Default, Clone)]
pub struct HijackDetector;

impl HijackDetector {
    pub fn new() -> Self {
        Self
    }

    /// Scan a provider snapshot. `nested_frame` comes from the environment port.
    pub fn check_provider(&self, provider: &ProviderDescriptor, nested_frame: bool) -> HijackReport {
        let mut report = HijackReport::clean();

        let identifiers = provider.identity_flags();
        if identifiers.len() > 1 {
            report.suspicious = true;
            report.indicate(
                Confidence::High,
                format!("Multiple wallet identifiers: {}", identifiers.join(", ")),
            );
            warn!(identifiers = ?identifiers, "Provider claims multiple wallet identities");
            return report.finish();
        }

        if nested_frame {
            report.indicate(
                Confidence::Low,
                "Running inside a nested browsing context".to_string(),
            );
        }

        for (method, source) in provider.critical_sources() {
            for construct in dynamic_code_constructs(source) {
                report.suspicious = true;
                report.indicate(
                    Confidence::High,
                    format!("Dynamic code execution ({construct}) in {method}"),
                );
            }

            if is_obfuscated(source) {
                report.indicate(
                    Confidence::Medium,
                    format!("Obfuscated implementation of {method}"),
                );
            }
        }

        let report = report.finish();
        if report.suspicious {
            warn!(
                confidence = %report.confidence,
                indicators = report.indicators.len(),
                "Provider failed hijack scan"
            );
        } else {
            debug!(
                indicators = report.indicators.len(),
                recommendation = %report.recommendation,
                "Provider hijack scan complete"
            );
        }
        report
    }
}

/// Labels of the dynamic-code constructs found in `source`.
pub fn dynamic_code_constructs(source: &str) -> Vec<&'static str> {
    DYNAMIC_CODE
        .iter()
        .filter(|(pattern, _)| pattern.is_match(source))
        .map(|(_, label)| *label)
        .collect()
}

/// Short and bracket-heavy, or carrying escape/identifier runs typical of
/// minified obfuscators.
pub fn is_obfuscated(source: &str) -> bool {
    let body = source.trim();
    if body.is_empty() {
        return false;
    }
    if ESCAPE_RUN.is_match(body) {
        return true;
    }
    let length = body.chars().count();
    if length >= SHORT_BODY_LIMIT {
        return false;
    }
    let brackets = body
        .chars()
        .filter(|c| matches!(c, '(' | ')' | '{' | '}' | '[' | ']'))
        .count();
    brackets as f64 / length as f64 > BRACKET_DENSITY_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::phantom_descriptor;

    #[test]
    fn test_clean_provider_is_safe() {
        let report = HijackDetector::new().check_provider(&phantom_descriptor(), false);
        assert!(!report.suspicious);
        assert!(report.indicators.is_empty());
        assert_eq!(report.recommendation, Recommendation::Safe);
    }

    #[test]
    fn test_multiple_identities_short_circuit() {
        let provider = phantom_descriptor()
            .with_flag("isSolflare", true)
            .with_method("signMessage", "function signMessage(m) { eval(m); }");
        let report = HijackDetector::new().check_provider(&provider, true);

        assert!(report.suspicious);
        assert_eq!(report.confidence, Confidence::High);
        assert_eq!(report.recommendation, Recommendation::Avoid);
        // Nothing after the identity check is scanned
        assert_eq!(report.indicators.len(), 1);
    }

    #[test]
    fn test_eval_in_critical_method() {
        let provider = phantom_descriptor().with_method(
            "signTransaction",
            "function signTransaction(tx) { return eval(atob(payload)); }",
        );
        let report = HijackDetector::new().check_provider(&provider, false);

        assert!(report.suspicious);
        assert_eq!(report.confidence, Confidence::High);
        assert_eq!(report.recommendation, Recommendation::Avoid);
    }

    #[test]
    fn test_function_constructor_detected() {
        assert_eq!(
            dynamic_code_constructs("function connect() { return new Function(code)(); }"),
            vec!["new Function"]
        );
        assert_eq!(
            dynamic_code_constructs(r#"function connect() { Function("return this")(); }"#),
            vec!["Function constructor"]
        );
        assert_eq!(
            dynamic_code_constructs(r#"function connect() { setTimeout("steal()", 0); }"#),
            vec!["string timer"]
        );
        assert!(dynamic_code_constructs("function connect() { return this.evaluate(); }").is_empty());
    }

    #[test]
    fn test_nested_frame_is_weak_signal() {
        let report = HijackDetector::new().check_provider(&phantom_descriptor(), true);
        assert!(!report.suspicious);
        assert_eq!(report.confidence, Confidence::Low);
        assert_eq!(report.indicators.len(), 1);
        assert_eq!(report.recommendation, Recommendation::Safe);
    }

    #[test]
    fn test_obfuscation_heuristic() {
        assert!(is_obfuscated("a=>{(([[{}]]))}"));
        assert!(is_obfuscated(r"function connect() { var s = '\x65\x76\x61\x6c'; }"));
        assert!(is_obfuscated("function connect() { return _0x3f2a1b(this); }"));
        assert!(!is_obfuscated("function connect() { [native code] }"));
        assert!(!is_obfuscated(""));
    }

    #[test]
    fn test_many_weak_indicators_caution() {
        let provider = phantom_descriptor()
            .with_method("connect", "a=>{(([[{}]]))}")
            .with_method("disconnect", "b=>{(([[{}]]))}");
        let report = HijackDetector::new().check_provider(&provider, true);

        assert!(!report.suspicious);
        assert_eq!(report.indicators.len(), 3);
        assert_eq!(report.confidence, Confidence::Medium);
        assert_eq!(report.recommendation, Recommendation::Caution);
    }
}
