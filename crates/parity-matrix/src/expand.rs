//! Cartesian expansion of a contract into cells, and per-cell scenario
//! selection.

use crate::contract::{CELL_ID_SEPARATOR, MatrixRunContract, TagMatch};
use parity_kernel::{GateMode, NormalizationConfig, Scenario, TerminalSurface};
use serde::{Deserialize, Serialize};

/// Axis names in rollup order.
pub const AXES: [&str; 6] = [
    "model_variant",
    "comparator_profile",
    "scenario_slice",
    "execution_surface",
    "gate_mode",
    "normalization_profile",
];

/// One element of the axis product, with the values a cell run needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixCellDefinition {
    pub cell_id: String,
    pub model_variant: String,
    pub model: String,
    pub comparator_profile: String,
    pub scenario_slice: String,
    pub risk_tier: String,
    pub slice_tags: Vec<String>,
    pub slice_match: TagMatch,
    pub execution_surface: TerminalSurface,
    pub gate_mode: GateMode,
    pub normalization_profile: String,
    pub normalization: NormalizationConfig,
}

impl MatrixCellDefinition {
    /// The cell's value on `axis` (one of [`AXES`]).
    pub fn axis_value(&self, axis: &str) -> Option<&str> {
        match axis {
            "model_variant" => Some(&self.model_variant),
            "comparator_profile" => Some(&self.comparator_profile),
            "scenario_slice" => Some(&self.scenario_slice),
            "execution_surface" => Some(self.execution_surface.as_str()),
            "gate_mode" => Some(self.gate_mode.as_str()),
            "normalization_profile" => Some(&self.normalization_profile),
            _ => None,
        }
    }

    fn slice_matches(&self, scenario: &Scenario) -> bool {
        if self.slice_tags.is_empty() {
            return true;
        }
        match self.slice_match {
            TagMatch::Any => self.slice_tags.iter().any(|t| scenario.has_tag(t)),
            TagMatch::All => self.slice_tags.iter().all(|t| scenario.has_tag(t)),
        }
    }

    /// Scenarios in this cell's slice, in suite order, with the cell's surface
    /// and normalization applied and digests recomputed.
    pub fn select_scenarios(&self, scenarios: &[Scenario], normalization_required: bool) -> Vec<Scenario> {
        let normalization = if normalization_required {
            self.normalization.with_required_passes()
        } else {
            self.normalization
        };
        scenarios
            .iter()
            .filter(|s| self.slice_matches(s))
            .map(|s| {
                let mut scenario = s.clone();
                scenario.runtime.terminal_surface = self.execution_surface;
                scenario.normalization = normalization;
                scenario.refresh_digest();
                scenario
            })
            .collect()
    }
}

/// Full Cartesian product, model variants outermost.
pub fn expand_cells(contract: &MatrixRunContract) -> Vec<MatrixCellDefinition> {
    let axes = &contract.axes;
    let mut cells = Vec::new();
    for model in &axes.model_variants {
        for profile in &axes.comparator_profiles {
            for slice in &axes.scenario_slices {
                for surface in &axes.execution_surfaces {
                    for gate_mode in &axes.gate_modes {
                        for norm in &axes.normalization_profiles {
                            let cell_id = [
                                model.id.as_str(),
                                profile.id.as_str(),
                                slice.id.as_str(),
                                surface.as_str(),
                                gate_mode.as_str(),
                                norm.id.as_str(),
                            ]
                            .join(CELL_ID_SEPARATOR);
                            cells.push(MatrixCellDefinition {
                                cell_id,
                                model_variant: model.id.clone(),
                                model: model.model_name().to_string(),
                                comparator_profile: profile.id.clone(),
                                scenario_slice: slice.id.clone(),
                                risk_tier: slice.risk_tier.clone(),
                                slice_tags: slice.tags.clone(),
                                slice_match: slice.match_mode,
                                execution_surface: *surface,
                                gate_mode: *gate_mode,
                                normalization_profile: norm.id.clone(),
                                normalization: norm.config,
                            });
                        }
                    }
                }
            }
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::parse_contract;
    use parity_kernel::scenario::parse_scenario;
    use serde_json::json;

    fn contract() -> MatrixRunContract {
        parse_contract(&json!({
            "schema_version": "replay-matrix.v1",
            "axes": {
                "model_variants": [{"id": "model-a"}, {"id": "model-b"}],
                "comparator_profiles": [{"id": "default"}],
                "scenario_slices": [
                    {"id": "build", "risk_tier": "p0", "tags": ["domain:build"]},
                    {"id": "guarded", "risk_tier": "p1", "tags": ["domain:build", "risk:high"], "match": "all"}
                ],
                "execution_surfaces": ["auto", "memory_terminal", "memory_terminal_interactive"],
                "gate_modes": ["strict"],
                "normalization_profiles": [
                    {"id": "minimal", "timestamps": false, "paths": false, "strip_nondeterministic_text": false}
                ]
            }
        }))
        .expect("contract should parse")
    }

    #[test]
    fn two_by_one_by_two_by_three_is_twelve_cells() {
        let cells = expand_cells(&contract());
        assert_eq!(cells.len(), 12);
        assert_eq!(
            cells[0].cell_id,
            "model-a__default__build__auto__strict__minimal"
        );
        assert_eq!(
            cells[11].cell_id,
            "model-b__default__guarded__memory_terminal_interactive__strict__minimal"
        );
        let unique: std::collections::BTreeSet<_> = cells.iter().map(|c| c.cell_id.clone()).collect();
        assert_eq!(unique.len(), 12);
    }

    #[test]
    fn selection_applies_slice_and_overrides() {
        let scenarios = vec![
            parse_scenario(
                &json!({
                    "scenario_id": "build_launch",
                    "tag_metadata": {"domain": "build", "risk": "high"},
                    "steps": [{"kind": "tool", "tool": "shell", "action": "run"}],
                    "expectations": {"success_signature": ["OK"]}
                }),
                0,
            )
            .expect("scenario"),
            parse_scenario(
                &json!({
                    "scenario_id": "docs_only",
                    "tags": ["domain:docs"],
                    "steps": [{"kind": "user", "text": "hi"}],
                    "expectations": {"success_signature": ["OK"]}
                }),
                1,
            )
            .expect("scenario"),
        ];
        let cells = expand_cells(&contract());
        let guarded = cells
            .iter()
            .find(|c| c.scenario_slice == "guarded" && c.execution_surface == TerminalSurface::MemoryTerminal)
            .expect("guarded cell");

        let selected = guarded.select_scenarios(&scenarios, true);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].scenario_id, "BUILD_LAUNCH");
        assert_eq!(selected[0].runtime.terminal_surface, TerminalSurface::MemoryTerminal);
        assert!(selected[0].normalization.timestamps);
        assert!(selected[0].normalization.strip_nondeterministic_text);
        assert_ne!(selected[0].scenario_digest, scenarios[0].scenario_digest);

        let relaxed = guarded.select_scenarios(&scenarios, false);
        assert!(!relaxed[0].normalization.timestamps);
    }
}
