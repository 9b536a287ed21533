//! Replay gate: turns a comparison (plus an optional retry comparison) into a
//! CI verdict, triage labels, and one annotation per drift.

use crate::comparator::ComparisonResult;
use crate::drift::Drift;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateMode {
    #[default]
    Strict,
    Warn,
    Info,
}

impl GateMode {
    pub const ALL: [GateMode; 3] = [GateMode::Strict, GateMode::Warn, GateMode::Info];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Warn => "warn",
            Self::Info => "info",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "strict" => Some(Self::Strict),
            "warn" => Some(Self::Warn),
            "info" => Some(Self::Info),
            _ => None,
        }
    }
}

impl fmt::Display for GateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GateStatus {
    Pass,
    Fail,
    Warn,
    Info,
}

impl GateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Warn => "WARN",
            Self::Info => "INFO",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Clean,
    DeterministicRegression,
    IntermittentFlake,
}

impl Classification {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::DeterministicRegression => "deterministic_regression",
            Self::IntermittentFlake => "intermittent_flake",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationLevel {
    Error,
    Warning,
    Notice,
}

impl AnnotationLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Notice => "notice",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateAnnotation {
    pub level: AnnotationLevel,
    pub title: String,
    pub message: String,
    pub scenario_id: String,
    pub check_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence_refs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_fingerprint: Option<String>,
}

impl GateAnnotation {
    /// GitHub workflow-command form of the annotation.
    pub fn to_github_line(&self) -> String {
        let mut line = format!("::{} title={}::{}", self.level.as_str(), self.title, self.message);
        if !self.evidence_refs.is_empty() {
            line.push_str(&format!(" evidence_refs={}", self.evidence_refs.join(",")));
        }
        if let Some(fp) = &self.evidence_fingerprint {
            line.push_str(&format!(" evidence_fingerprint={fp}"));
        }
        line
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSummary {
    pub total_scenarios: usize,
    pub failed_scenarios: usize,
    pub total_drifts: usize,
    pub high_drifts: usize,
    pub medium_drifts: usize,
    pub low_drifts: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_failed_scenarios: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_total_drifts: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateEvaluation {
    pub mode: GateMode,
    pub passed: bool,
    pub status: GateStatus,
    pub classification: Classification,
    pub triage_labels: Vec<String>,
    pub retried: bool,
    pub annotations: Vec<GateAnnotation>,
    pub summary: GateSummary,
}

impl GateEvaluation {
    pub fn github_annotation_lines(&self) -> Vec<String> {
        self.annotations.iter().map(GateAnnotation::to_github_line).collect()
    }
}

pub fn evaluate_replay_gate(comparison: &ComparisonResult, mode: GateMode) -> GateEvaluation {
    evaluate(comparison, None, mode)
}

pub fn evaluate_replay_gate_with_retry(
    primary: &ComparisonResult,
    retry: Option<&ComparisonResult>,
    mode: GateMode,
) -> GateEvaluation {
    evaluate(primary, retry, mode)
}

fn classify(primary: &ComparisonResult, retry: Option<&ComparisonResult>) -> Classification {
    if !primary.is_blocking() {
        return Classification::Clean;
    }
    match retry {
        Some(r) if !r.is_blocking() => Classification::IntermittentFlake,
        _ => Classification::DeterministicRegression,
    }
}

fn evaluate(primary: &ComparisonResult, retry: Option<&ComparisonResult>, mode: GateMode) -> GateEvaluation {
    let classification = classify(primary, retry);
    let has_drifts = primary.summary.total_drifts > 0;

    let (passed, status) = match mode {
        GateMode::Strict => match classification {
            Classification::DeterministicRegression => (false, GateStatus::Fail),
            Classification::IntermittentFlake => (true, GateStatus::Warn),
            Classification::Clean if has_drifts => (true, GateStatus::Warn),
            Classification::Clean => (true, GateStatus::Pass),
        },
        GateMode::Warn if has_drifts => (true, GateStatus::Warn),
        GateMode::Info if has_drifts => (true, GateStatus::Info),
        GateMode::Warn | GateMode::Info => (true, GateStatus::Pass),
    };

    let level = match (mode, classification) {
        (GateMode::Strict, Classification::DeterministicRegression) => AnnotationLevel::Error,
        (GateMode::Strict | GateMode::Warn, _) => AnnotationLevel::Warning,
        (GateMode::Info, _) => AnnotationLevel::Notice,
    };

    let annotations = primary
        .drifts()
        .map(|drift| annotation(drift, level, classification))
        .collect();

    let counts = primary.summary.drifts_by_severity;
    GateEvaluation {
        mode,
        passed,
        status,
        classification,
        triage_labels: triage_labels(primary, retry, classification),
        retried: retry.is_some(),
        annotations,
        summary: GateSummary {
            total_scenarios: primary.summary.total_scenarios,
            failed_scenarios: primary.summary.failed_scenarios,
            total_drifts: primary.summary.total_drifts,
            high_drifts: counts.high,
            medium_drifts: counts.medium,
            low_drifts: counts.low,
            retry_failed_scenarios: retry.map(|r| r.summary.failed_scenarios),
            retry_total_drifts: retry.map(|r| r.summary.total_drifts),
        },
    }
}

fn annotation(drift: &Drift, level: AnnotationLevel, classification: Classification) -> GateAnnotation {
    GateAnnotation {
        level,
        title: format!("Replay Gate ({})", drift.severity.as_str().to_ascii_uppercase()),
        message: format!(
            "[{}] {} {} {}",
            classification.as_str(),
            drift.scenario_id,
            drift.check_id,
            drift.message
        ),
        scenario_id: drift.scenario_id.clone(),
        check_id: drift.check_id.clone(),
        evidence_refs: drift
            .evidence
            .as_ref()
            .map(|e| e.artifact_refs.clone())
            .unwrap_or_default(),
        evidence_fingerprint: drift.fingerprint().map(str::to_string),
    }
}

fn triage_labels(
    primary: &ComparisonResult,
    retry: Option<&ComparisonResult>,
    classification: Classification,
) -> Vec<String> {
    let mut labels = vec![classification.as_str().to_string()];
    match classification {
        Classification::DeterministicRegression => labels.push("needs-fix".to_string()),
        Classification::IntermittentFlake => labels.push("needs-stabilization".to_string()),
        Classification::Clean if primary.summary.total_drifts > 0 => {
            labels.push("review-drift".to_string())
        }
        Classification::Clean => {}
    }
    if let Some(retry) = retry {
        let label = if primary.fingerprints() == retry.fingerprints() {
            "stable-fingerprint"
        } else {
            "changed-fingerprint"
        };
        labels.push(label.to_string());
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::{ComparisonSummary, ScenarioComparison};
    use crate::drift::SeverityCounts;
    use crate::explain::{Finding, enrich};
    use crate::scenario::Severity;

    fn comparison(drifts: Vec<Drift>) -> ComparisonResult {
        let failed = drifts.iter().any(|d| d.severity == Severity::High);
        let counts = SeverityCounts::from_drifts(&drifts);
        ComparisonResult {
            schema_version: 1,
            profile_id: "default".into(),
            baseline_run_id: "b".into(),
            candidate_run_id: "c".into(),
            passed: !failed,
            summary: ComparisonSummary {
                total_scenarios: 1,
                passed_scenarios: usize::from(!failed),
                failed_scenarios: usize::from(failed),
                total_drifts: drifts.len(),
                drifts_by_severity: counts,
                ..ComparisonSummary::default()
            },
            scenarios: vec![ScenarioComparison {
                scenario_id: "S".into(),
                passed: !failed,
                drifts,
                checks_executed: vec!["ORDER".into()],
                explainability_groups: Vec::new(),
            }],
        }
    }

    fn high_drift() -> Drift {
        enrich(
            "S",
            Finding::new("ORDER", None, Severity::High, "tool sequence mismatch"),
            None,
            None,
        )
    }

    #[test]
    fn strict_fails_on_regression_and_warn_passes() {
        let primary = comparison(vec![high_drift()]);
        let strict = evaluate_replay_gate(&primary, GateMode::Strict);
        assert!(!strict.passed);
        assert_eq!(strict.status, GateStatus::Fail);
        assert_eq!(strict.classification, Classification::DeterministicRegression);
        assert_eq!(strict.annotations[0].level, AnnotationLevel::Error);
        assert!(!strict.retried);

        let warn = evaluate_replay_gate(&primary, GateMode::Warn);
        assert!(warn.passed);
        assert_eq!(warn.status, GateStatus::Warn);
        assert_eq!(warn.annotations[0].level, AnnotationLevel::Warning);

        let info = evaluate_replay_gate(&primary, GateMode::Info);
        assert_eq!(info.status, GateStatus::Info);
        assert_eq!(info.annotations[0].level, AnnotationLevel::Notice);
    }

    #[test]
    fn clean_retry_marks_flake() {
        let primary = comparison(vec![high_drift()]);
        let retry = comparison(Vec::new());
        let gate = evaluate_replay_gate_with_retry(&primary, Some(&retry), GateMode::Strict);
        assert!(gate.passed);
        assert_eq!(gate.status, GateStatus::Warn);
        assert_eq!(gate.classification, Classification::IntermittentFlake);
        assert!(gate.retried);
        assert_eq!(
            gate.triage_labels,
            vec!["intermittent_flake", "needs-stabilization", "changed-fingerprint"]
        );
    }

    #[test]
    fn blocking_retry_keeps_regression_with_stable_fingerprint() {
        let primary = comparison(vec![high_drift()]);
        let retry = comparison(vec![high_drift()]);
        let gate = evaluate_replay_gate_with_retry(&primary, Some(&retry), GateMode::Strict);
        assert!(!gate.passed);
        assert_eq!(
            gate.triage_labels,
            vec!["deterministic_regression", "needs-fix", "stable-fingerprint"]
        );
    }

    #[test]
    fn no_drifts_passes_in_every_mode() {
        let primary = comparison(Vec::new());
        for mode in GateMode::ALL {
            let gate = evaluate_replay_gate(&primary, mode);
            assert!(gate.passed);
            assert_eq!(gate.status, GateStatus::Pass);
            assert_eq!(gate.triage_labels, vec!["clean"]);
        }
    }

    #[test]
    fn annotation_line_format() {
        let bare = GateAnnotation {
            level: AnnotationLevel::Warning,
            title: "Replay Gate (MEDIUM)".into(),
            message: "[clean] LOGIN AUTH authorization outcome mismatch".into(),
            scenario_id: "LOGIN".into(),
            check_id: "AUTH".into(),
            evidence_refs: Vec::new(),
            evidence_fingerprint: None,
        };
        insta::assert_snapshot!(
            bare.to_github_line(),
            @"::warning title=Replay Gate (MEDIUM)::[clean] LOGIN AUTH authorization outcome mismatch"
        );

        let gate = evaluate_replay_gate(&comparison(vec![high_drift()]), GateMode::Strict);
        let line = &gate.github_annotation_lines()[0];
        assert!(line.starts_with(
            "::error title=Replay Gate (HIGH)::[deterministic_regression] S ORDER tool sequence mismatch evidence_refs=baseline.norm.json#scenario:S,candidate.norm.json#scenario:S evidence_fingerprint=fp1_"
        ));
    }
}
