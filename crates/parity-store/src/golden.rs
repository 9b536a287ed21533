//! Versioned golden baseline storage.
//!
//! `<goldens_root>/v1/<baseline_id>/{baseline.norm.json, metadata.json}`.
//! Records are only written through guarded promotion.

use crate::artifacts::read_json_file_if_exists;
use crate::error::StoreError;
use parity_kernel::stable_json::{canonical_json_bytes, sha256_hex};
use parity_kernel::{Profile, ProfileArtifacts, ScenarioRunArtifact};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const GOLDEN_LAYOUT_VERSION: &str = "v1";
pub const GOLDEN_METADATA_FILE: &str = "metadata.json";
pub const DEFAULT_BASELINE_ID: &str = "default";
pub const GOLDEN_METADATA_SCHEMA_VERSION: u32 = 1;

/// Lowercase, map `[^a-z0-9._-]` to `-`, trim; empty becomes `default`.
pub fn sanitize_baseline_id(raw: &str) -> String {
    let mapped: String = raw
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = mapped.trim_matches(|c| c == '-' || c == '.');
    if trimmed.is_empty() {
        DEFAULT_BASELINE_ID.to_string()
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldenLocation {
    pub baseline_id: String,
    pub dir: PathBuf,
    pub baseline_path: PathBuf,
    pub metadata_path: PathBuf,
}

impl GoldenLocation {
    pub fn new(goldens_root: &Path, baseline_id: &str) -> Self {
        let baseline_id = sanitize_baseline_id(baseline_id);
        let dir = goldens_root.join(GOLDEN_LAYOUT_VERSION).join(&baseline_id);
        Self {
            baseline_path: dir.join(Profile::Baseline.norm_file_name()),
            metadata_path: dir.join(GOLDEN_METADATA_FILE),
            baseline_id,
            dir,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldenMetadata {
    pub schema_version: u32,
    pub baseline_id: String,
    pub promoted_at: String,
    pub source_label: String,
    pub source_run_id: String,
    pub scenario_count: usize,
    /// Scenario ID to its content signature at promotion time.
    pub scenario_signatures: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoldenBaselineRecord {
    pub location: GoldenLocation,
    pub metadata: Option<GoldenMetadata>,
    pub artifact: ProfileArtifacts,
}

/// Hash of a scenario's digest plus its normalized events.
pub fn scenario_signature(scenario: &ScenarioRunArtifact) -> String {
    let events = serde_json::to_value(&scenario.normalized_events).unwrap_or_default();
    let material = json!({
        "scenario_digest": scenario.scenario_digest,
        "normalized_events": events,
    });
    format!("sig1_{}", sha256_hex(&canonical_json_bytes(&material)))
}

pub fn scenario_signatures(artifacts: &ProfileArtifacts) -> BTreeMap<String, String> {
    artifacts
        .scenarios
        .iter()
        .map(|s| (s.scenario_id.clone(), scenario_signature(s)))
        .collect()
}

/// Read a promoted baseline; `Ok(None)` when none has been promoted.
pub fn read_golden_baseline(
    goldens_root: &Path,
    baseline_id: &str,
) -> Result<Option<GoldenBaselineRecord>, StoreError> {
    let location = GoldenLocation::new(goldens_root, baseline_id);
    let Some(artifact) = read_json_file_if_exists::<ProfileArtifacts>(&location.baseline_path)? else {
        return Ok(None);
    };
    let metadata = read_json_file_if_exists::<GoldenMetadata>(&location.metadata_path)?;
    Ok(Some(GoldenBaselineRecord {
        location,
        metadata,
        artifact,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_ids_are_sanitized() {
        assert_eq!(sanitize_baseline_id("Main Branch/v2"), "main-branch-v2");
        assert_eq!(sanitize_baseline_id("  "), "default");
        assert_eq!(sanitize_baseline_id("../etc"), "etc");
        assert_eq!(sanitize_baseline_id("release_1.4"), "release_1.4");
    }

    #[test]
    fn location_layout() {
        let loc = GoldenLocation::new(Path::new("/goldens"), "Nightly");
        assert_eq!(loc.dir, Path::new("/goldens/v1/nightly"));
        assert_eq!(loc.baseline_path, Path::new("/goldens/v1/nightly/baseline.norm.json"));
        assert_eq!(loc.metadata_path, Path::new("/goldens/v1/nightly/metadata.json"));
    }

    #[test]
    fn missing_golden_is_none() {
        let root = std::env::temp_dir().join(format!("parity-golden-missing-{}", std::process::id()));
        let record = read_golden_baseline(&root, "absent").expect("missing golden is not an error");
        assert!(record.is_none());
    }
}
