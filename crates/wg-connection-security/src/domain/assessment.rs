//! User-facing provider assessment.
//!
//! Combines the structural pass and the hijack scan into one decision with
//! severity-tagged issues and plain-language recommendations.

use crate::domain::entities::{RiskLevel, Severity};
use crate::domain::hijack::{HijackReport, Recommendation};
use crate::domain::verifier::{IssueKind, ProviderAssessment};
use serde::{Deserialize, Serialize};

/// One issue shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityIssue {
    pub severity: Severity,
    pub message: String,
}

/// Output of `SecurityManager::validate_provider`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityAssessment {
    pub is_valid: bool,
    pub risk_level: RiskLevel,
    pub issues: Vec<SecurityIssue>,
    pub recommendations: Vec<String>,
    pub hijack: HijackReport,
    pub details: ProviderAssessment,
}

impl SecurityAssessment {
    pub fn from_checks(details: ProviderAssessment, hijack: HijackReport) -> Self {
        let mut risk_level = details.security_risk;
        let mut issues: Vec<SecurityIssue> = details
            .issues
            .iter()
            .map(|issue| SecurityIssue {
                severity: issue.kind.risk().into(),
                message: issue.message.clone(),
            })
            .collect();
        let mut recommendations = Vec::new();
        for issue in &details.issues {
            push_unique(&mut recommendations, recommendation_for(issue.kind));
        }

        let indicator_severity = match hijack.recommendation {
            _ if hijack.suspicious => Severity::Critical,
            Recommendation::Caution => Severity::Medium,
            _ => Severity::Low,
        };
        issues.extend(hijack.indicators.iter().map(|indicator| SecurityIssue {
            severity: indicator_severity,
            message: indicator.clone(),
        }));

        match hijack.recommendation {
            Recommendation::Avoid => push_unique(
                &mut recommendations,
                "Potential wallet hijacking detected. Avoid connecting and disable unknown browser extensions.",
            ),
            Recommendation::Caution => push_unique(
                &mut recommendations,
                "Provider shows unusual characteristics. Proceed with caution.",
            ),
            Recommendation::Safe => {}
        }

        if hijack.suspicious {
            risk_level = RiskLevel::Critical;
        }

        Self {
            is_valid: details.is_valid && !hijack.suspicious,
            risk_level,
            issues,
            recommendations,
            hijack,
            details,
        }
    }

    /// The hijack scan fired.
    pub fn hijack_detected(&self) -> bool {
        self.hijack.suspicious
    }
}

fn recommendation_for(kind: IssueKind) -> &'static str {
    match kind {
        IssueKind::MultipleIdentifiers => {
            "Multiple wallet identifiers detected. Another extension may be impersonating your wallet; avoid connecting."
        }
        IssueKind::MissingMethod => {
            "The wallet is missing required methods. Update or reinstall the wallet extension."
        }
        IssueKind::UnrecognizedSignature => {
            "Wallet methods look modified. Verify that the extension is genuine."
        }
        IssueKind::UnknownProvider => {
            "Unknown wallet provider. Only connect if you trust this extension."
        }
        IssueKind::PublicKeyMismatch => {
            "The wallet account changed since your last connection. Confirm the account before signing."
        }
        IssueKind::NonConfigurableGetter => {
            "Wallet methods are locked by another script. Avoid connecting."
        }
        IssueKind::ProxyWrapped => {
            "Wallet methods are wrapped by another script. Proceed with caution."
        }
    }
}

fn push_unique(recommendations: &mut Vec<String>, text: &str) {
    if !recommendations.iter().any(|r| r == text) {
        recommendations.push(text.to_string());
    }
}
