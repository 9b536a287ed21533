//! Deterministic run identity.

use crate::determinism::DeterminismConfig;
use parity_kernel::stable_json::{canonical_json_bytes, sha256_hex};
use parity_kernel::{Profile, Scenario};
use serde_json::json;

/// `run1_` + SHA-256 over label, profile, scenario digests, and determinism.
///
/// Identical logical inputs always yield the same ID, so normalized artifacts
/// of two captures over the same suite are byte-identical.
pub fn compute_run_id(
    label: &str,
    profile: Profile,
    scenarios: &[Scenario],
    determinism: &DeterminismConfig,
) -> String {
    let digests: Vec<&str> = scenarios.iter().map(|s| s.scenario_digest.as_str()).collect();
    let material = json!({
        "label": label,
        "profile": profile.as_str(),
        "scenario_digests": digests,
        "determinism": {"tz": determinism.tz, "locale": determinism.locale},
    });
    format!("run1_{}", sha256_hex(&canonical_json_bytes(&material)))
}

/// Directory-safe form of a run label.
pub fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('-');
    if cleaned.is_empty() {
        "run".to_string()
    } else {
        cleaned.to_string()
    }
}
