//! The matrix run contract: six axes, determinism controls, and per-risk-tier
//! severity policies.

use crate::error::MatrixError;
use parity_capture::DeterminismConfig;
use parity_capture::determinism::{DEFAULT_LOCALE, DEFAULT_TZ};
use parity_kernel::{ComparatorProfile, GateMode, NormalizationConfig, TerminalSurface};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const MATRIX_CONTRACT_SCHEMA_VERSION: &str = "replay-matrix.v1";

/// Separator between axis values in a cell ID.
pub const CELL_ID_SEPARATOR: &str = "__";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelVariant {
    pub id: String,
    /// Passed to the scenario runner; defaults to `id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ModelVariant {
    pub fn model_name(&self) -> &str {
        self.model.as_deref().unwrap_or(&self.id)
    }
}

/// A comparator profile axis value: a file, an inline profile, or the
/// built-in default named after `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparatorProfileAxis {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ComparatorProfile>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagMatch {
    #[default]
    Any,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioSlice {
    pub id: String,
    pub risk_tier: String,
    /// Empty selects the whole suite.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, alias = "match")]
    pub match_mode: TagMatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationProfile {
    pub id: String,
    #[serde(flatten)]
    pub config: NormalizationConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixAxes {
    pub model_variants: Vec<ModelVariant>,
    pub comparator_profiles: Vec<ComparatorProfileAxis>,
    pub scenario_slices: Vec<ScenarioSlice>,
    pub execution_surfaces: Vec<TerminalSurface>,
    pub gate_modes: Vec<GateMode>,
    pub normalization_profiles: Vec<NormalizationProfile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeterminismControls {
    pub tz: String,
    pub locale: String,
    /// Force timestamp, path, and text-stripping passes in every cell.
    pub normalization_required: bool,
    /// Re-run a blocking cell once to separate flakes from regressions.
    pub retry_once: bool,
    /// Derive the report fingerprint twice and fail if they differ.
    pub fingerprint_stability_check: bool,
}

impl Default for DeterminismControls {
    fn default() -> Self {
        Self {
            tz: DEFAULT_TZ.to_string(),
            locale: DEFAULT_LOCALE.to_string(),
            normalization_required: true,
            retry_once: true,
            fingerprint_stability_check: true,
        }
    }
}

impl DeterminismControls {
    pub fn config(&self) -> DeterminismConfig {
        DeterminismConfig::new(self.tz.clone(), self.locale.clone())
    }
}

/// Maximum drift counts per severity a promotable cell may carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskTierPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_high: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_medium: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_low: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixRunContract {
    pub schema_version: String,
    #[serde(default = "default_contract_id")]
    pub contract_id: String,
    pub axes: MatrixAxes,
    #[serde(default)]
    pub determinism: DeterminismControls,
    #[serde(default)]
    pub risk_tier_policies: BTreeMap<String, RiskTierPolicy>,
}

fn default_contract_id() -> String {
    "matrix".to_string()
}

impl MatrixRunContract {
    pub fn risk_policy(&self, tier: &str) -> Option<&RiskTierPolicy> {
        self.risk_tier_policies.get(tier)
    }

    /// Resolve every comparator profile axis value, reading relative paths
    /// against `base_dir`.
    pub fn resolve_profiles(&self, base_dir: &Path) -> Result<BTreeMap<String, ComparatorProfile>, MatrixError> {
        let mut resolved = BTreeMap::new();
        for axis in &self.axes.comparator_profiles {
            let profile = match (&axis.path, &axis.profile) {
                (Some(path), _) => ComparatorProfile::load(base_dir.join(path)).map_err(|source| {
                    MatrixError::Profile {
                        id: axis.id.clone(),
                        source,
                    }
                })?,
                (None, Some(inline)) => {
                    inline.validate().map_err(|source| MatrixError::Profile {
                        id: axis.id.clone(),
                        source,
                    })?;
                    inline.clone()
                }
                (None, None) => ComparatorProfile {
                    profile_id: axis.id.clone(),
                    ..ComparatorProfile::default()
                },
            };
            resolved.insert(axis.id.clone(), profile);
        }
        Ok(resolved)
    }
}

pub fn parse_contract(raw: &Value) -> Result<MatrixRunContract, MatrixError> {
    let contract: MatrixRunContract =
        serde_json::from_value(raw.clone()).map_err(|e| MatrixError::contract(e.to_string()))?;
    validate_contract(&contract)?;
    Ok(contract)
}

pub fn load_contract(path: &Path) -> Result<MatrixRunContract, MatrixError> {
    let text = fs::read_to_string(path).map_err(|e| MatrixError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let raw: Value = serde_json::from_str(&text).map_err(|e| MatrixError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    parse_contract(&raw)
}

fn check_ids<'a>(axis: &str, ids: impl IntoIterator<Item = &'a str>) -> Result<usize, MatrixError> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if id.trim().is_empty() {
            return Err(MatrixError::contract(format!("{axis}: ids must be non-empty")));
        }
        if id.contains(CELL_ID_SEPARATOR) {
            return Err(MatrixError::contract(format!(
                "{axis}: id `{id}` must not contain `{CELL_ID_SEPARATOR}`"
            )));
        }
        if !seen.insert(id) {
            return Err(MatrixError::contract(format!("{axis}: duplicate id `{id}`")));
        }
    }
    if seen.is_empty() {
        return Err(MatrixError::contract(format!("{axis} must not be empty")));
    }
    Ok(seen.len())
}

pub fn validate_contract(contract: &MatrixRunContract) -> Result<(), MatrixError> {
    if contract.schema_version != MATRIX_CONTRACT_SCHEMA_VERSION {
        return Err(MatrixError::contract(format!(
            "schema_version must be `{MATRIX_CONTRACT_SCHEMA_VERSION}` (got `{}`)",
            contract.schema_version
        )));
    }
    let axes = &contract.axes;
    check_ids("model_variants", axes.model_variants.iter().map(|m| m.id.as_str()))?;
    check_ids(
        "comparator_profiles",
        axes.comparator_profiles.iter().map(|p| p.id.as_str()),
    )?;
    check_ids("scenario_slices", axes.scenario_slices.iter().map(|s| s.id.as_str()))?;
    check_ids(
        "execution_surfaces",
        axes.execution_surfaces.iter().map(|s| s.as_str()),
    )?;
    check_ids("gate_modes", axes.gate_modes.iter().map(|m| m.as_str()))?;
    check_ids(
        "normalization_profiles",
        axes.normalization_profiles.iter().map(|n| n.id.as_str()),
    )?;

    for slice in &axes.scenario_slices {
        if slice.risk_tier.trim().is_empty() {
            return Err(MatrixError::contract(format!(
                "scenario slice `{}` must declare a risk_tier",
                slice.id
            )));
        }
    }
    if contract.determinism.tz.trim().is_empty() || contract.determinism.locale.trim().is_empty() {
        return Err(MatrixError::contract("determinism tz and locale must be non-empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contract_json() -> Value {
        json!({
            "schema_version": "replay-matrix.v1",
            "contract_id": "nightly",
            "axes": {
                "model_variants": [{"id": "model-a"}, {"id": "model-b", "model": "model-b-2025"}],
                "comparator_profiles": [{"id": "default"}],
                "scenario_slices": [
                    {"id": "build", "risk_tier": "p0", "tags": ["domain:build"]},
                    {"id": "auth", "risk_tier": "p1", "tags": ["risk:high", "domain:auth"], "match": "all"}
                ],
                "execution_surfaces": ["auto", "memory_terminal", "memory_terminal_interactive"],
                "gate_modes": ["strict"],
                "normalization_profiles": [{"id": "full"}]
            },
            "risk_tier_policies": {"p0": {"max_high": 0}}
        })
    }

    #[test]
    fn parses_with_defaults() {
        let contract = parse_contract(&contract_json()).expect("contract should parse");
        assert_eq!(contract.contract_id, "nightly");
        assert!(contract.determinism.normalization_required);
        assert_eq!(contract.determinism.tz, "UTC");
        assert_eq!(contract.axes.scenario_slices[1].match_mode, TagMatch::All);
        assert_eq!(contract.axes.model_variants[0].model_name(), "model-a");
        assert_eq!(contract.axes.model_variants[1].model_name(), "model-b-2025");
        assert_eq!(contract.axes.normalization_profiles[0].config, NormalizationConfig::default());
        assert_eq!(contract.risk_policy("p0").and_then(|p| p.max_high), Some(0));
    }

    #[test]
    fn rejects_wrong_schema_version() {
        let mut raw = contract_json();
        raw["schema_version"] = json!("replay-matrix.v0");
        let err = parse_contract(&raw).expect_err("must fail");
        assert!(err.to_string().contains("replay-matrix.v1"));
    }

    #[test]
    fn rejects_empty_axis() {
        let mut raw = contract_json();
        raw["axes"]["gate_modes"] = json!([]);
        let err = parse_contract(&raw).expect_err("must fail");
        assert!(err.to_string().contains("gate_modes must not be empty"));
    }

    #[test]
    fn rejects_separator_in_ids() {
        let mut raw = contract_json();
        raw["axes"]["model_variants"] = json!([{"id": "a__b"}]);
        assert!(parse_contract(&raw).is_err());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut raw = contract_json();
        raw["axes"]["comparator_profiles"] = json!([{"id": "x"}, {"id": "x"}]);
        let err = parse_contract(&raw).expect_err("must fail");
        assert!(err.to_string().contains("duplicate id `x`"));
    }

    #[test]
    fn profiles_resolve_inline_and_default() {
        let mut raw = contract_json();
        raw["axes"]["comparator_profiles"] = json!([
            {"id": "default"},
            {"id": "lenient", "profile": {"profile_id": "lenient", "strict_order_default": false}}
        ]);
        let contract = parse_contract(&raw).expect("contract should parse");
        let profiles = contract.resolve_profiles(Path::new(".")).expect("profiles resolve");
        assert_eq!(profiles["default"], ComparatorProfile::default());
        assert!(!profiles["lenient"].strict_order_default);
    }
}
