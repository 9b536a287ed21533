//! Matrix report: cell results, axis rollups, risk-tier summary, and the
//! report-level drift fingerprint.

use crate::error::MatrixError;
use crate::expand::{AXES, MatrixCellDefinition};
use crate::score::{CellScore, round4};
use parity_capture::DeterminismSnapshot;
use parity_kernel::stable_json::{canonical_json_bytes, sha256_hex, write_stable_json, write_text_atomic};
use parity_kernel::{Classification, ComparisonResult, GateEvaluation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tracing::info;

pub const MATRIX_REPORT_SCHEMA_VERSION: &str = "replay-matrix-report.v1";
pub const MATRIX_REPORT_JSON_FILE: &str = "matrix-report.json";
pub const MATRIX_REPORT_MD_FILE: &str = "matrix-report.md";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixCellResult {
    pub cell: MatrixCellDefinition,
    /// Cell run directory, relative to the matrix run directory.
    pub run_dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_run_dir: Option<String>,
    pub scenario_ids: Vec<String>,
    pub comparison: ComparisonResult,
    pub gate: GateEvaluation,
    pub score: CellScore,
    pub deterministic_regression: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policy_violations: Vec<String>,
    pub promotable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisValueRollup {
    pub value: String,
    pub cells: usize,
    pub promotable_cells: usize,
    pub average_cms: f64,
    pub average_wds: f64,
    pub average_spr: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisRollup {
    pub axis: String,
    pub values: Vec<AxisValueRollup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskTierSummary {
    pub risk_tier: String,
    pub cells: usize,
    pub promotable_cells: usize,
    pub deterministic_regressions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixReport {
    pub schema_version: String,
    pub contract_id: String,
    pub contract_schema_version: String,
    pub created_at: String,
    pub determinism: DeterminismSnapshot,
    pub total_cells: usize,
    pub promotable_cells: usize,
    pub cells: Vec<MatrixCellResult>,
    pub axis_rollups: Vec<AxisRollup>,
    pub risk_tiers: Vec<RiskTierSummary>,
    pub drift_fingerprint: String,
}

impl MatrixReport {
    pub fn all_promotable(&self) -> bool {
        self.promotable_cells == self.total_cells
    }
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 { 0.0 } else { round4(sum / count as f64) }
}

/// Per-axis rollups in fixed axis order, values alphabetical within an axis.
pub fn axis_rollups(cells: &[MatrixCellResult]) -> Vec<AxisRollup> {
    AXES.iter()
        .map(|axis| {
            let mut groups: BTreeMap<&str, Vec<&MatrixCellResult>> = BTreeMap::new();
            for result in cells {
                if let Some(value) = result.cell.axis_value(axis) {
                    groups.entry(value).or_default().push(result);
                }
            }
            let values = groups
                .into_iter()
                .map(|(value, group)| AxisValueRollup {
                    value: value.to_string(),
                    cells: group.len(),
                    promotable_cells: group.iter().filter(|c| c.promotable).count(),
                    average_cms: average(group.iter().map(|c| c.score.cms)),
                    average_wds: average(group.iter().map(|c| c.score.wds)),
                    average_spr: average(group.iter().map(|c| c.score.spr)),
                })
                .collect();
            AxisRollup {
                axis: axis.to_string(),
                values,
            }
        })
        .collect()
}

pub fn risk_tier_summary(cells: &[MatrixCellResult]) -> Vec<RiskTierSummary> {
    let mut tiers: BTreeMap<&str, RiskTierSummary> = BTreeMap::new();
    for result in cells {
        let tier = tiers
            .entry(result.cell.risk_tier.as_str())
            .or_insert_with(|| RiskTierSummary {
                risk_tier: result.cell.risk_tier.clone(),
                cells: 0,
                promotable_cells: 0,
                deterministic_regressions: 0,
            });
        tier.cells += 1;
        tier.promotable_cells += usize::from(result.promotable);
        tier.deterministic_regressions += usize::from(result.deterministic_regression);
    }
    tiers.into_values().collect()
}

/// Hash over every cell's ID, classification, scores, and sorted drift
/// fingerprints.
pub fn matrix_drift_fingerprint(cells: &[MatrixCellResult]) -> String {
    let material: Vec<_> = cells
        .iter()
        .map(|c| {
            json!({
                "cell_id": c.cell.cell_id,
                "classification": c.gate.classification.as_str(),
                "promotable": c.promotable,
                "score": c.score,
                "drift_fingerprints": c.comparison.fingerprints(),
            })
        })
        .collect();
    format!("mfp1_{}", sha256_hex(&canonical_json_bytes(&json!(material))))
}

/// Derive the fingerprint twice; differing results are an error.
pub fn stable_matrix_fingerprint(cells: &[MatrixCellResult]) -> Result<String, MatrixError> {
    let first = matrix_drift_fingerprint(cells);
    let second = matrix_drift_fingerprint(cells);
    if first != second {
        return Err(MatrixError::FingerprintUnstable { first, second });
    }
    Ok(first)
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

pub fn render_matrix_markdown(report: &MatrixReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Replay Matrix Report");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "- Contract: `{}` (`{}`)",
        report.contract_id, report.contract_schema_version
    );
    let _ = writeln!(
        out,
        "- Cells: {} ({} promotable)",
        report.total_cells, report.promotable_cells
    );
    let _ = writeln!(out, "- Drift fingerprint: `{}`", report.drift_fingerprint);
    let _ = writeln!(
        out,
        "- Determinism: TZ `{}`, locale `{}`",
        report.determinism.tz, report.determinism.locale
    );

    let _ = writeln!(out);
    let _ = writeln!(out, "## Cells");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "| Cell | Risk | Gate | Classification | WDS | SPR | ECI | BBR | CMS | Promotable |"
    );
    let _ = writeln!(out, "|---|---|---|---|---|---|---|---|---|---|");
    for result in &report.cells {
        let s = &result.score;
        let _ = writeln!(
            out,
            "| `{}` | {} | {} | `{}` | {} | {} | {} | {} | {} | {} |",
            result.cell.cell_id,
            result.cell.risk_tier,
            result.gate.status.as_str(),
            result.gate.classification.as_str(),
            s.wds,
            s.spr,
            s.eci,
            s.bbr,
            s.cms,
            yes_no(result.promotable)
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "## Axis Rollups");
    for rollup in &report.axis_rollups {
        let _ = writeln!(out);
        let _ = writeln!(out, "### {}", rollup.axis);
        let _ = writeln!(out);
        let _ = writeln!(out, "| Value | Cells | Promotable | Avg CMS | Avg WDS | Avg SPR |");
        let _ = writeln!(out, "|---|---|---|---|---|---|");
        for v in &rollup.values {
            let _ = writeln!(
                out,
                "| `{}` | {} | {} | {} | {} | {} |",
                v.value, v.cells, v.promotable_cells, v.average_cms, v.average_wds, v.average_spr
            );
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "## Risk Tiers");
    let _ = writeln!(out);
    let _ = writeln!(out, "| Tier | Cells | Promotable | Regressions |");
    let _ = writeln!(out, "|---|---|---|---|");
    for tier in &report.risk_tiers {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} |",
            tier.risk_tier, tier.cells, tier.promotable_cells, tier.deterministic_regressions
        );
    }

    let blocked: Vec<&MatrixCellResult> = report
        .cells
        .iter()
        .filter(|c| !c.policy_violations.is_empty())
        .collect();
    if !blocked.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Policy Violations");
        let _ = writeln!(out);
        for result in blocked {
            let _ = writeln!(
                out,
                "- `{}`: {}",
                result.cell.cell_id,
                result.policy_violations.join("; ")
            );
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixReportPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
}

pub fn write_matrix_report(dir: &Path, report: &MatrixReport) -> Result<MatrixReportPaths, MatrixError> {
    let json_path = dir.join(MATRIX_REPORT_JSON_FILE);
    let markdown_path = dir.join(MATRIX_REPORT_MD_FILE);
    write_stable_json(&json_path, report)?;
    write_text_atomic(&markdown_path, &render_matrix_markdown(report))?;
    info!(
        dir = %dir.display(),
        cells = report.total_cells,
        promotable = report.promotable_cells,
        "matrix report written"
    );
    Ok(MatrixReportPaths {
        json: json_path,
        markdown: markdown_path,
    })
}

pub(crate) fn is_regression(gate: &GateEvaluation) -> bool {
    gate.classification == Classification::DeterministicRegression
}
