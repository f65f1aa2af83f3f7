//! Subcommand implementations.

use anyhow::{bail, Context, Result};
use chrono::{SecondsFormat, TimeZone, Utc};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use wg_telemetry::{log_event, log_wallet_event};
use wg_connection_security::domain::auth_message::verify_ed25519;
use wg_connection_security::{
    AuditEntry, AuthMessage, ConnectionSecurityApi, MemoryStore, ProviderDescriptor,
    SecurityAssessment, SecurityConfig, SecurityManager, StaticEnvironment, SystemTimeSource,
    WalletPublicKey,
};

/// Config file if given, otherwise defaults with environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<SecurityConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            let config = SecurityConfig::from_json_str(&raw)
                .with_context(|| format!("parsing config {}", path.display()))?;
            debug!(path = %path.display(), "Loaded configuration file");
            Ok(config)
        }
        None => {
            let config = SecurityConfig::from_env();
            config.validate().context("configuration from environment")?;
            Ok(config)
        }
    }
}

fn manager(config: SecurityConfig, nested: bool) -> Result<SecurityManager> {
    let env = StaticEnvironment::default();
    let env = if nested { env.nested() } else { env };
    Ok(SecurityManager::new(
        config,
        Arc::new(MemoryStore::new()),
        Arc::new(env),
        Arc::new(SystemTimeSource),
    )?)
}

// =============================================================================
// ASSESS
// =============================================================================

pub fn assess(
    config: SecurityConfig,
    descriptor_path: &Path,
    previous_key: Option<&str>,
    wallet: Option<&str>,
    nested: bool,
    json: bool,
) -> Result<()> {
    let raw = std::fs::read_to_string(descriptor_path)
        .with_context(|| format!("reading descriptor {}", descriptor_path.display()))?;
    let descriptor: ProviderDescriptor =
        serde_json::from_str(&raw).context("descriptor is not a provider snapshot")?;

    let mut manager = manager(config, nested)?;
    let assessment = manager.validate_provider(&descriptor, previous_key);
    let consistency = wallet.map(|name| manager.verify_wallet_consistency(name, &descriptor));

    if json {
        let mut output = serde_json::to_value(&assessment)?;
        if let Some(report) = &consistency {
            output["consistency"] = serde_json::to_value(report)?;
        }
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!("{}", render_assessment(&assessment));
        if let Some(report) = &consistency {
            log_wallet_event!(
                debug,
                "inspect",
                "Consistency checked",
                report.wallet_name,
                consistent = report.consistent
            );
            if !report.known {
                println!("Wallet {}: no expectations on record", report.wallet_name);
            } else if report.consistent {
                println!("Wallet {}: shape matches", report.wallet_name);
            } else {
                println!(
                    "Wallet {}: missing [{}], unexpected [{}]",
                    report.wallet_name,
                    report.missing_properties.join(", "),
                    report.unexpected_identifiers.join(", ")
                );
            }
        }
    }

    log_event!(
        info,
        "inspect",
        "Assessment complete",
        valid = assessment.is_valid,
        risk = %assessment.risk_level
    );
    Ok(())
}

/// Human-readable assessment.
pub fn render_assessment(assessment: &SecurityAssessment) -> String {
    let verdict = if assessment.is_valid { "VALID" } else { "REJECTED" };
    let mut lines = vec![
        format!("{verdict} (risk: {})", assessment.risk_level),
        format!(
            "Hijack scan: {} confidence, recommendation {}",
            assessment.hijack.confidence, assessment.hijack.recommendation
        ),
    ];
    if !assessment.issues.is_empty() {
        lines.push("Issues:".to_string());
        lines.extend(
            assessment
                .issues
                .iter()
                .map(|issue| format!("  [{}] {}", issue.severity, issue.message)),
        );
    }
    if !assessment.recommendations.is_empty() {
        lines.push("Recommendations:".to_string());
        lines.extend(assessment.recommendations.iter().map(|r| format!("  - {r}")));
    }
    lines.iter().map(|line| format!("{line}\n")).collect()
}

// =============================================================================
// AUTH MESSAGE / VERIFY
// =============================================================================

pub fn auth_message(config: SecurityConfig, public_key: &str) -> Result<()> {
    let mut manager = manager(config, false)?;
    let message = manager
        .generate_auth_message(public_key)
        .with_context(|| format!("public key {public_key}"))?;
    println!("{}", message.to_message_string());
    Ok(())
}

pub fn verify(message_path: &Path, signature: &str, public_key: &str) -> Result<()> {
    let raw = std::fs::read_to_string(message_path)
        .with_context(|| format!("reading message {}", message_path.display()))?;
    let text = signed_text(&raw);

    match check_signature(text, signature, public_key) {
        Ok(()) => {
            println!("Signature valid");
            if let Ok(parsed) = AuthMessage::parse(text) {
                println!(
                    "Sign-in message for {} on {}, expires {}",
                    parsed.address,
                    parsed.domain,
                    format_timestamp(parsed.expiration_time)
                );
            }
            Ok(())
        }
        Err(e) => bail!("Signature invalid: {e}"),
    }
}

/// The canonical message never ends with a newline; editors add one.
pub fn signed_text(raw: &str) -> &str {
    raw.strip_suffix("\r\n")
        .or_else(|| raw.strip_suffix('\n'))
        .unwrap_or(raw)
}

pub fn check_signature(text: &str, signature: &str, public_key: &str) -> Result<()> {
    let key: WalletPublicKey = public_key.parse().context("public key")?;
    let signature = bs58::decode(signature.trim())
        .into_vec()
        .context("signature is not base58")?;
    verify_ed25519(text.as_bytes(), &signature, &key)?;
    Ok(())
}

// =============================================================================
// AUDIT
// =============================================================================

pub fn audit(export_path: &Path, wallet: Option<&str>, failures: bool) -> Result<()> {
    let raw = std::fs::read_to_string(export_path)
        .with_context(|| format!("reading export {}", export_path.display()))?;
    let entries: Vec<AuditEntry> =
        serde_json::from_str(&raw).context("export is not an audit log")?;

    let lines = summarize_audit(&entries, wallet, failures);
    for line in &lines {
        println!("{line}");
    }
    println!(
        "{} of {} entries shown, {} failed overall",
        lines.len(),
        entries.len(),
        entries.iter().filter(|e| !e.success).count()
    );
    Ok(())
}

pub fn summarize_audit(entries: &[AuditEntry], wallet: Option<&str>, failures: bool) -> Vec<String> {
    entries
        .iter()
        .filter(|e| wallet.is_none() || e.wallet_name.as_deref() == wallet)
        .filter(|e| !failures || !e.success)
        .map(|e| {
            format!(
                "{} {:<10} {:<4} {:<12} {}",
                format_timestamp(e.timestamp),
                format!("{:?}", e.category).to_lowercase(),
                if e.success { "ok" } else { "FAIL" },
                e.wallet_name.as_deref().unwrap_or("-"),
                e.details
            )
        })
        .collect()
}

fn format_timestamp(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| ms.to_string())
}
