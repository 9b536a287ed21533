//! Explainability enrichment for raw comparator findings.
//!
//! Each finding becomes a [`Drift`] with a taxonomy category, a confidence
//! level, an operator bucket, a remediation hint, and evidence (event
//! indexes, artifact refs, fingerprint).

use crate::drift::{
    Confidence, Drift, DriftCategory, DriftEvidence, OperatorBucket, SeverityCounts, UNCLASSIFIED,
};
use crate::scenario::{CheckType, Severity};
use crate::stable_json::sha256_hex;
use crate::trace::{EventType, Profile, TraceEvent};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};

/// Check id of the synthetic drift emitted when a scenario artifact is absent.
pub const SCENARIO_PRESENCE_CHECK: &str = "scenario-presence";

/// Raw output of a comparator rule, before enrichment.
#[derive(Debug, Clone)]
pub struct Finding {
    pub check_id: String,
    pub check_type: Option<CheckType>,
    pub severity: Severity,
    pub message: String,
    pub details: Option<Value>,
    pub hints: EvidenceHints,
}

impl Finding {
    pub fn new(
        check_id: impl Into<String>,
        check_type: Option<CheckType>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            check_id: check_id.into(),
            check_type,
            severity,
            message: message.into(),
            details: None,
            hints: EvidenceHints::default(),
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_hints(mut self, hints: EvidenceHints) -> Self {
        self.hints = hints;
        self
    }
}

/// Pointers a rule leaves for evidence location.
#[derive(Debug, Clone, Default)]
pub struct EvidenceHints {
    /// Canonical actions whose tool-call events should be cited.
    pub actions: Vec<String>,
    pub baseline_indexes: Vec<usize>,
    pub candidate_indexes: Vec<usize>,
}

fn category_for_check_type(check_type: CheckType) -> DriftCategory {
    match check_type {
        CheckType::ToolOrder => DriftCategory::ToolSequence,
        CheckType::AuthOutcome => DriftCategory::AuthorizationPolicy,
        CheckType::Flow => DriftCategory::FlowProtocol,
        CheckType::SuccessSignature => DriftCategory::SuccessSignature,
    }
}

const CATEGORY_KEYWORDS: &[(&str, DriftCategory)] = &[
    ("auth", DriftCategory::AuthorizationPolicy),
    ("handoff", DriftCategory::FlowProtocol),
    ("confirmation", DriftCategory::FlowProtocol),
    ("flow", DriftCategory::FlowProtocol),
    ("surface", DriftCategory::FlowProtocol),
    ("signature", DriftCategory::SuccessSignature),
    ("tool", DriftCategory::ToolSequence),
    ("sequence", DriftCategory::ToolSequence),
    ("presence", DriftCategory::ArtifactIntegrity),
    ("artifact", DriftCategory::ArtifactIntegrity),
];

/// Keyword sniffing over check id and message, used when no check type applies.
pub fn sniff_category(check_id: &str, message: &str) -> Option<DriftCategory> {
    let haystack = format!("{check_id} {message}").to_ascii_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(keyword, _)| haystack.contains(keyword))
        .map(|(_, category)| *category)
}

pub fn remediation_for(category: Option<DriftCategory>) -> &'static str {
    match category {
        Some(DriftCategory::FlowProtocol) => {
            "Review agent handoff/confirmation ordering and terminal surface routing against the baseline flow."
        }
        Some(DriftCategory::AuthorizationPolicy) => {
            "Diff authorization policy inputs; confirm outcome and reason_class changes are intended before promoting."
        }
        Some(DriftCategory::ToolSequence) => {
            "Compare tool-call ordering; update the baseline only if the new sequence is an intended behavior change."
        }
        Some(DriftCategory::SuccessSignature) => {
            "Inspect candidate outcome events; a missing success signature usually means the scenario did not finish."
        }
        Some(DriftCategory::ArtifactIntegrity) => {
            "Re-capture both profiles; a scenario artifact is missing or was produced by a different suite revision."
        }
        None => "No taxonomy rule matched; inspect drift details and the normalized traces manually.",
    }
}

fn detail_count(details: Option<&Value>) -> usize {
    match details {
        Some(Value::Object(map)) => map.len(),
        Some(Value::Array(items)) => items.len(),
        Some(Value::Null) | None => 0,
        Some(_) => 1,
    }
}

/// Severity weight plus up to two points for supporting detail.
pub fn confidence_for(severity: Severity, details: Option<&Value>) -> Confidence {
    let weight = match severity {
        Severity::High => 3,
        Severity::Medium => 2,
        Severity::Low => 1,
    };
    match weight + detail_count(details).min(2) {
        4.. => Confidence::High,
        2..=3 => Confidence::Medium,
        _ => Confidence::Low,
    }
}

/// Stable identity of a drift: hash of scenario, check, severity, message.
pub fn drift_fingerprint(scenario_id: &str, check_id: &str, severity: Severity, message: &str) -> String {
    let material = json!([scenario_id, check_id, severity.as_str(), message]);
    let bytes = crate::stable_json::canonical_json_bytes(&material);
    let hex = sha256_hex(&bytes);
    format!("fp1_{}", &hex[..24])
}

pub fn artifact_refs(scenario_id: &str) -> Vec<String> {
    Profile::ALL
        .iter()
        .map(|p| format!("{}#scenario:{scenario_id}", p.norm_file_name()))
        .collect()
}

fn locate_indexes(events: Option<&[TraceEvent]>, actions: &[String], seeded: &[usize]) -> Vec<usize> {
    let mut out: BTreeSet<usize> = seeded.iter().copied().collect();
    if let Some(events) = events
        && !actions.is_empty()
    {
        for (idx, event) in events.iter().enumerate() {
            if event.event_type == EventType::ToolCall
                && event
                    .action_canonical
                    .as_ref()
                    .is_some_and(|a| actions.contains(a))
            {
                out.insert(idx);
            }
        }
    }
    out.into_iter().collect()
}

/// Turn a finding into a fully enriched drift.
pub fn enrich(
    scenario_id: &str,
    finding: Finding,
    baseline_events: Option<&[TraceEvent]>,
    candidate_events: Option<&[TraceEvent]>,
) -> Drift {
    let category = finding
        .check_type
        .map(category_for_check_type)
        .or_else(|| sniff_category(&finding.check_id, &finding.message));
    let evidence = DriftEvidence {
        baseline_event_indexes: locate_indexes(
            baseline_events,
            &finding.hints.actions,
            &finding.hints.baseline_indexes,
        ),
        candidate_event_indexes: locate_indexes(
            candidate_events,
            &finding.hints.actions,
            &finding.hints.candidate_indexes,
        ),
        artifact_refs: artifact_refs(scenario_id),
        fingerprint: drift_fingerprint(
            scenario_id,
            &finding.check_id,
            finding.severity,
            &finding.message,
        ),
    };

    Drift {
        scenario_id: scenario_id.to_string(),
        check_id: finding.check_id,
        severity: finding.severity,
        confidence: Some(confidence_for(finding.severity, finding.details.as_ref())),
        operator_bucket: Some(OperatorBucket::from_severity(finding.severity)),
        remediation: Some(remediation_for(category).to_string()),
        category,
        message: finding.message,
        details: finding.details,
        evidence: Some(evidence),
    }
}

/// Drifts of one scenario aggregated under one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainabilityGroup {
    pub category: String,
    pub drift_count: usize,
    pub check_ids: Vec<String>,
    pub highest_severity: Severity,
    pub blocker_count: usize,
}

/// Group drifts by category in taxonomy order; unclassified drifts come last.
pub fn explainability_groups(drifts: &[Drift]) -> Vec<ExplainabilityGroup> {
    let keys = DriftCategory::TAXONOMY_ORDER
        .iter()
        .map(|c| Some(*c))
        .chain(std::iter::once(None));

    let mut groups = Vec::new();
    for key in keys {
        let members: Vec<&Drift> = drifts.iter().filter(|d| d.category == key).collect();
        let Some(highest_severity) = members.iter().map(|d| d.severity).max() else {
            continue;
        };
        let mut check_ids: Vec<String> = Vec::new();
        for drift in &members {
            if !check_ids.contains(&drift.check_id) {
                check_ids.push(drift.check_id.clone());
            }
        }
        groups.push(ExplainabilityGroup {
            category: key.map_or(UNCLASSIFIED, DriftCategory::as_str).to_string(),
            drift_count: members.len(),
            check_ids,
            highest_severity,
            blocker_count: members
                .iter()
                .filter(|d| d.operator_bucket == Some(OperatorBucket::Blocker))
                .count(),
        });
    }
    groups
}

/// Suite-wide explainability totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainabilityRollup {
    pub total_drifts: usize,
    pub explained_drifts: usize,
    pub unexplained_drifts: usize,
    /// Explained drifts whose operator bucket is `blocker`.
    pub explained_blocker_drifts: usize,
    pub by_category: BTreeMap<String, usize>,
    pub by_confidence: BTreeMap<String, usize>,
    pub by_operator_bucket: BTreeMap<String, usize>,
    pub by_severity: SeverityCounts,
}

pub fn explainability_rollup<'a>(drifts: impl IntoIterator<Item = &'a Drift>) -> ExplainabilityRollup {
    let mut rollup = ExplainabilityRollup::default();
    for drift in drifts {
        rollup.total_drifts += 1;
        rollup.by_severity.add(drift.severity);
        if drift.is_explained() {
            rollup.explained_drifts += 1;
            if drift.operator_bucket == Some(OperatorBucket::Blocker) {
                rollup.explained_blocker_drifts += 1;
            }
        } else {
            rollup.unexplained_drifts += 1;
        }
        *rollup
            .by_category
            .entry(drift.category_label().to_string())
            .or_default() += 1;
        if let Some(confidence) = drift.confidence {
            *rollup
                .by_confidence
                .entry(confidence.as_str().to_string())
                .or_default() += 1;
        }
        if let Some(bucket) = drift.operator_bucket {
            *rollup
                .by_operator_bucket
                .entry(bucket.as_str().to_string())
                .or_default() += 1;
        }
    }
    rollup
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffing_finds_categories_or_nothing() {
        assert_eq!(
            sniff_category(SCENARIO_PRESENCE_CHECK, "scenario artifact missing"),
            Some(DriftCategory::ArtifactIntegrity)
        );
        assert_eq!(
            sniff_category(
                "drift-threshold-total",
                "total drift count 3 exceeds threshold 0 (mostly tool_sequence)"
            ),
            Some(DriftCategory::ToolSequence)
        );
        assert_eq!(
            sniff_category("drift-threshold-total", "total drift count 3 exceeds threshold 0"),
            None
        );
        assert_eq!(sniff_category("custom", "latency budget exceeded"), None);
        assert_eq!(
            sniff_category("custom", "handoff target changed"),
            Some(DriftCategory::FlowProtocol)
        );
    }

    #[test]
    fn confidence_heuristic() {
        assert_eq!(confidence_for(Severity::High, Some(&json!({"a": 1}))), Confidence::High);
        assert_eq!(confidence_for(Severity::High, None), Confidence::Medium);
        assert_eq!(confidence_for(Severity::Medium, Some(&json!({"a": 1, "b": 2}))), Confidence::High);
        assert_eq!(confidence_for(Severity::Low, None), Confidence::Low);
        assert_eq!(confidence_for(Severity::Low, Some(&json!([1]))), Confidence::Medium);
    }

    #[test]
    fn fingerprint_is_stable_and_message_sensitive() {
        let a = drift_fingerprint("S", "C", Severity::High, "m");
        let b = drift_fingerprint("S", "C", Severity::High, "m");
        let c = drift_fingerprint("S", "C", Severity::High, "m2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("fp1_"));
    }

    #[test]
    fn enrichment_locates_action_indexes() {
        let mut call = TraceEvent::new(EventType::ToolCall, "S", 0);
        call.action_canonical = Some("execute".into());
        let other = TraceEvent::new(EventType::Outcome, "S", 1);
        let events = vec![other, call];
        let finding = Finding::new("ORDER", Some(CheckType::ToolOrder), Severity::High, "x")
            .with_hints(EvidenceHints {
                actions: vec!["execute".into()],
                ..EvidenceHints::default()
            });
        let drift = enrich("S", finding, Some(&events), Some(&events));
        let evidence = drift.evidence.expect("evidence should be attached");
        assert_eq!(evidence.baseline_event_indexes, vec![1]);
        assert_eq!(evidence.candidate_event_indexes, vec![1]);
        assert_eq!(drift.category, Some(DriftCategory::ToolSequence));
        assert_eq!(drift.operator_bucket, Some(OperatorBucket::Blocker));
    }

    #[test]
    fn groups_follow_taxonomy_order() {
        let mk = |check: &str, check_type: Option<CheckType>, severity: Severity, msg: &str| {
            enrich("S", Finding::new(check, check_type, severity, msg), None, None)
        };
        let drifts = vec![
            mk("CUSTOM", None, Severity::High, "latency budget exceeded"),
            mk("SIG", Some(CheckType::SuccessSignature), Severity::Low, "missing"),
            mk("FLOW", Some(CheckType::Flow), Severity::Medium, "no handoff"),
            mk("FLOW", Some(CheckType::Flow), Severity::Medium, "bad target"),
        ];
        let groups = explainability_groups(&drifts);
        let labels: Vec<&str> = groups.iter().map(|g| g.category.as_str()).collect();
        assert_eq!(labels, vec!["flow_protocol", "success_signature", "unclassified"]);
        assert_eq!(groups[0].drift_count, 2);
        assert_eq!(groups[0].check_ids, vec!["FLOW"]);

        let rollup = explainability_rollup(&drifts);
        assert_eq!(rollup.total_drifts, 4);
        assert_eq!(rollup.explained_drifts, 3);
        assert_eq!(rollup.unexplained_drifts, 1);
        assert_eq!(rollup.explained_blocker_drifts, 0);
        assert_eq!(rollup.by_category.get("unclassified"), Some(&1));
    }
}
