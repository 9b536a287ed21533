//! Markdown renderings of comparisons and gate evaluations.

use parity_kernel::{ComparisonResult, Drift, GateEvaluation, SeverityCounts};
use std::fmt::Write;

/// Escape text for a Markdown table cell.
pub fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn pass_label(passed: bool) -> &'static str {
    if passed { "PASS" } else { "FAIL" }
}

fn severity_line(counts: &SeverityCounts) -> String {
    format!(
        "{} (high {}, medium {}, low {})",
        counts.total(),
        counts.high,
        counts.medium,
        counts.low
    )
}

pub fn render_comparison_markdown(comparison: &ComparisonResult) -> String {
    let summary = &comparison.summary;
    let mut out = String::new();
    let _ = writeln!(out, "# Replay Parity Report");
    let _ = writeln!(out);
    let _ = writeln!(out, "- Result: **{}**", pass_label(comparison.passed));
    let _ = writeln!(out, "- Comparator profile: `{}`", comparison.profile_id);
    let _ = writeln!(out, "- Baseline run: `{}`", comparison.baseline_run_id);
    let _ = writeln!(out, "- Candidate run: `{}`", comparison.candidate_run_id);
    let _ = writeln!(
        out,
        "- Scenarios: {} total, {} passed, {} failed",
        summary.total_scenarios, summary.passed_scenarios, summary.failed_scenarios
    );
    let _ = writeln!(out, "- Drifts: {}", severity_line(&summary.drifts_by_severity));

    let rollup = &summary.explainability_rollup;
    if rollup.total_drifts > 0 {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Explainability");
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "- Explained drifts: {}/{} (blocker {})",
            rollup.explained_drifts, rollup.total_drifts, rollup.explained_blocker_drifts
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "| Category | Drifts |");
        let _ = writeln!(out, "|---|---|");
        for (category, count) in &rollup.by_category {
            let _ = writeln!(out, "| `{category}` | {count} |");
        }
        if rollup.unexplained_drifts > 0 {
            let _ = writeln!(out, "| _unexplained_ | {} |", rollup.unexplained_drifts);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "## Scenarios");
    let _ = writeln!(out);
    let _ = writeln!(out, "| Scenario | Result | Drifts | Checks |");
    let _ = writeln!(out, "|---|---|---|---|");
    for scenario in &comparison.scenarios {
        let checks = if scenario.checks_executed.is_empty() {
            "-".to_string()
        } else {
            scenario.checks_executed.join(", ")
        };
        let _ = writeln!(
            out,
            "| `{}` | {} | {} | {} |",
            scenario.scenario_id,
            pass_label(scenario.passed),
            scenario.drifts.len(),
            escape_cell(&checks)
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "## Drifts");
    let _ = writeln!(out);
    if summary.total_drifts == 0 {
        let _ = writeln!(out, "No drifts detected.");
        return out;
    }
    for scenario in comparison.scenarios.iter().filter(|s| !s.drifts.is_empty()) {
        let _ = writeln!(out, "### `{}`", scenario.scenario_id);
        let _ = writeln!(out);
        for drift in &scenario.drifts {
            render_drift(&mut out, drift);
        }
        let _ = writeln!(out);
    }
    out
}

fn render_drift(out: &mut String, drift: &Drift) {
    let _ = write!(
        out,
        "- **{}** `{}`: {} (category `{}`",
        drift.severity.as_str(),
        drift.check_id,
        drift.message,
        drift.category_label()
    );
    if let Some(bucket) = drift.operator_bucket {
        let _ = write!(out, ", bucket `{}`", bucket.as_str());
    }
    if let Some(confidence) = drift.confidence {
        let _ = write!(out, ", confidence `{}`", confidence.as_str());
    }
    let _ = writeln!(out, ")");
    if let Some(remediation) = &drift.remediation {
        let _ = writeln!(out, "  - Remediation: {remediation}");
    }
    if let Some(evidence) = &drift.evidence {
        let refs: Vec<String> = evidence.artifact_refs.iter().map(|r| format!("`{r}`")).collect();
        if !refs.is_empty() {
            let _ = writeln!(out, "  - Evidence: {}", refs.join(", "));
        }
        let _ = writeln!(out, "  - Fingerprint: `{}`", evidence.fingerprint);
    }
}

pub fn render_gate_markdown(gate: &GateEvaluation) -> String {
    let summary = &gate.summary;
    let mut out = String::new();
    let _ = writeln!(out, "## Replay Gate: {}", gate.status.as_str());
    let _ = writeln!(out);
    let _ = writeln!(out, "- Mode: `{}`", gate.mode.as_str());
    let _ = writeln!(out, "- Passed: {}", if gate.passed { "yes" } else { "no" });
    let _ = writeln!(out, "- Classification: `{}`", gate.classification.as_str());
    let labels: Vec<String> = gate.triage_labels.iter().map(|l| format!("`{l}`")).collect();
    let _ = writeln!(out, "- Triage labels: {}", labels.join(", "));
    let _ = writeln!(
        out,
        "- Scenarios: {} total, {} failed",
        summary.total_scenarios, summary.failed_scenarios
    );
    let _ = writeln!(
        out,
        "- Drifts: {} (high {}, medium {}, low {})",
        summary.total_drifts, summary.high_drifts, summary.medium_drifts, summary.low_drifts
    );
    if gate.retried {
        let _ = writeln!(
            out,
            "- Retry: {} failed scenarios, {} drifts",
            summary.retry_failed_scenarios.unwrap_or_default(),
            summary.retry_total_drifts.unwrap_or_default()
        );
    }

    if !gate.annotations.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "| Level | Scenario | Check | Message |");
        let _ = writeln!(out, "|---|---|---|---|");
        for annotation in &gate.annotations {
            let _ = writeln!(
                out,
                "| {} | `{}` | `{}` | {} |",
                annotation.level.as_str(),
                annotation.scenario_id,
                annotation.check_id,
                escape_cell(&annotation.message)
            );
        }
    }
    out
}
