//! Cell scoring and the promotability rule.
//!
//! - `WDS = clamp(100 - 20*high - 7*medium - 2*low, 0, 100)`
//! - `SPR = passed_scenarios / total_scenarios` (0 with no scenarios)
//! - `ECI = explained_drifts / total_drifts` (1 with no drifts)
//! - `BBR = explained_blocker_drifts / explained_drifts` (0 with none explained)
//! - `CMS = WDS * SPR - flake_penalty`
//!
//! Every ratio is rounded to four decimals.

use crate::contract::RiskTierPolicy;
use parity_kernel::{Classification, ComparisonResult, GateEvaluation, SeverityCounts};
use serde::{Deserialize, Serialize};

pub const FLAKE_PENALTY: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellScore {
    pub wds: f64,
    pub spr: f64,
    pub eci: f64,
    pub bbr: f64,
    pub cms: f64,
    pub flake_penalty: f64,
}

pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn ratio(numerator: usize, denominator: usize, empty: f64) -> f64 {
    if denominator == 0 {
        empty
    } else {
        round4(numerator as f64 / denominator as f64)
    }
}

pub fn weighted_drift_score(counts: &SeverityCounts) -> f64 {
    let raw = 100.0 - 20.0 * counts.high as f64 - 7.0 * counts.medium as f64 - 2.0 * counts.low as f64;
    raw.clamp(0.0, 100.0)
}

pub fn score_cell(comparison: &ComparisonResult, gate: &GateEvaluation) -> CellScore {
    let summary = &comparison.summary;
    let rollup = &summary.explainability_rollup;
    let wds = weighted_drift_score(&summary.drifts_by_severity);
    let spr = ratio(summary.passed_scenarios, summary.total_scenarios, 0.0);
    let eci = ratio(rollup.explained_drifts, summary.total_drifts, 1.0);
    let bbr = ratio(rollup.explained_blocker_drifts, rollup.explained_drifts, 0.0);
    let flake_penalty = if gate.classification == Classification::IntermittentFlake {
        FLAKE_PENALTY
    } else {
        0.0
    };
    CellScore {
        wds,
        spr,
        eci,
        bbr,
        cms: round4(wds * spr - flake_penalty),
        flake_penalty,
    }
}

/// Severity limits in `policy` that `counts` exceeds, as readable messages.
pub fn policy_violations(policy: Option<&RiskTierPolicy>, counts: &SeverityCounts) -> Vec<String> {
    let Some(policy) = policy else {
        return Vec::new();
    };
    [
        ("high", policy.max_high, counts.high),
        ("medium", policy.max_medium, counts.medium),
        ("low", policy.max_low, counts.low),
    ]
    .into_iter()
    .filter_map(|(label, max, actual)| match max {
        Some(max) if actual > max => Some(format!("{label} drifts {actual} exceed risk-tier limit {max}")),
        _ => None,
    })
    .collect()
}

pub fn is_promotable(gate: &GateEvaluation, violations: &[String]) -> bool {
    gate.classification != Classification::DeterministicRegression && gate.passed && violations.is_empty()
}
