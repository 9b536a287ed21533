//! Baseline vs candidate drift comparison.
//!
//! Scenarios are compared in suite order. Each declared check dispatches to
//! one rule by its [`CheckType`]; rule findings are enriched through
//! [`crate::explain`] and then checked against the scenario's acceptance
//! thresholds.

use crate::drift::{Drift, DriftCategory, SeverityCounts};
use crate::explain::{
    EvidenceHints, ExplainabilityGroup, ExplainabilityRollup, Finding, SCENARIO_PRESENCE_CHECK,
    enrich, explainability_groups, explainability_rollup,
};
use crate::profile::ComparatorProfile;
use crate::scenario::{AcceptanceThresholds, CheckSpec, CheckType, Scenario, Severity};
use crate::trace::{EventType, Profile, ProfileArtifacts, ScenarioRunArtifact, TraceEvent};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};

pub const COMPARISON_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioComparison {
    pub scenario_id: String,
    pub passed: bool,
    pub drifts: Vec<Drift>,
    /// IDs of the checks that actually ran, in declaration order.
    pub checks_executed: Vec<String>,
    #[serde(default)]
    pub explainability_groups: Vec<ExplainabilityGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub total_scenarios: usize,
    pub passed_scenarios: usize,
    pub failed_scenarios: usize,
    pub total_drifts: usize,
    pub drifts_by_severity: SeverityCounts,
    pub explainability_rollup: ExplainabilityRollup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub schema_version: u32,
    pub profile_id: String,
    pub baseline_run_id: String,
    pub candidate_run_id: String,
    pub passed: bool,
    pub scenarios: Vec<ScenarioComparison>,
    pub summary: ComparisonSummary,
}

impl ComparisonResult {
    pub fn drifts(&self) -> impl Iterator<Item = &Drift> {
        self.scenarios.iter().flat_map(|s| s.drifts.iter())
    }

    /// Failed, or carrying at least one high-severity drift.
    pub fn is_blocking(&self) -> bool {
        !self.passed || self.summary.drifts_by_severity.high > 0
    }

    pub fn fingerprints(&self) -> BTreeSet<String> {
        self.drifts()
            .filter_map(|d| d.fingerprint().map(str::to_string))
            .collect()
    }
}

/// Compare two profile captures scenario by scenario.
pub fn compare(
    scenarios: &[Scenario],
    baseline: &ProfileArtifacts,
    candidate: &ProfileArtifacts,
    profile: &ComparatorProfile,
) -> ComparisonResult {
    let results: Vec<ScenarioComparison> = scenarios
        .iter()
        .map(|scenario| {
            compare_scenario(
                scenario,
                baseline.scenario(&scenario.scenario_id),
                candidate.scenario(&scenario.scenario_id),
                profile,
            )
        })
        .collect();

    let passed_scenarios = results.iter().filter(|s| s.passed).count();
    let all_drifts: Vec<&Drift> = results.iter().flat_map(|s| s.drifts.iter()).collect();
    let summary = ComparisonSummary {
        total_scenarios: results.len(),
        passed_scenarios,
        failed_scenarios: results.len() - passed_scenarios,
        total_drifts: all_drifts.len(),
        drifts_by_severity: SeverityCounts::from_drifts(all_drifts.iter().copied()),
        explainability_rollup: explainability_rollup(all_drifts.iter().copied()),
    };

    ComparisonResult {
        schema_version: COMPARISON_SCHEMA_VERSION,
        profile_id: profile.profile_id.clone(),
        baseline_run_id: baseline.run_id.clone(),
        candidate_run_id: candidate.run_id.clone(),
        passed: summary.failed_scenarios == 0 && summary.drifts_by_severity.high == 0,
        scenarios: results,
        summary,
    }
}

fn compare_scenario(
    scenario: &Scenario,
    baseline: Option<&ScenarioRunArtifact>,
    candidate: Option<&ScenarioRunArtifact>,
    profile: &ComparatorProfile,
) -> ScenarioComparison {
    let scenario_id = scenario.scenario_id.as_str();
    let (baseline, candidate) = match (baseline, candidate) {
        (Some(b), Some(c)) => (b, c),
        (b, c) => {
            let missing: Vec<&str> = [(Profile::Baseline, b.is_none()), (Profile::Candidate, c.is_none())]
                .into_iter()
                .filter(|(_, absent)| *absent)
                .map(|(p, _)| p.as_str())
                .collect();
            let finding = Finding::new(
                SCENARIO_PRESENCE_CHECK,
                None,
                Severity::High,
                format!("scenario artifact missing for {}", missing.join(", ")),
            )
            .with_details(json!({ "missing_profiles": missing }));
            let drifts = vec![enrich(scenario_id, finding, None, None)];
            return ScenarioComparison {
                scenario_id: scenario_id.to_string(),
                passed: false,
                explainability_groups: explainability_groups(&drifts),
                drifts,
                checks_executed: Vec::new(),
            };
        }
    };

    let base_events = baseline.normalized_events.as_slice();
    let cand_events = candidate.normalized_events.as_slice();

    let mut drifts = Vec::new();
    let mut checks_executed = Vec::new();
    let mut required_failure = false;
    for check in &scenario.expectations.checks {
        checks_executed.push(check.id.clone());
        let findings = match check.check_type {
            CheckType::ToolOrder => tool_order(check, base_events, cand_events, profile),
            CheckType::AuthOutcome => auth_outcome(check, base_events, cand_events, profile),
            CheckType::Flow => flow(check, cand_events, profile),
            CheckType::SuccessSignature => {
                success_signature(check, &scenario.expectations.success_signature, cand_events)
            }
        };
        if check.required && !findings.is_empty() {
            required_failure = true;
        }
        drifts.extend(
            findings
                .into_iter()
                .map(|f| enrich(scenario_id, f, Some(base_events), Some(cand_events))),
        );
    }

    let breaches = threshold_findings(&scenario.acceptance_thresholds, &drifts);
    let threshold_breached = !breaches.is_empty();
    drifts.extend(
        breaches
            .into_iter()
            .map(|f| enrich(scenario_id, f, Some(base_events), Some(cand_events))),
    );

    ScenarioComparison {
        scenario_id: scenario_id.to_string(),
        passed: !required_failure && !threshold_breached,
        explainability_groups: explainability_groups(&drifts),
        drifts,
        checks_executed,
    }
}

/// Most frequent category among `drifts`; ties go to taxonomy order.
fn dominant_category<'a>(drifts: impl Iterator<Item = &'a Drift> + Clone) -> Option<DriftCategory> {
    DriftCategory::TAXONOMY_ORDER
        .into_iter()
        .map(|category| {
            let n = drifts.clone().filter(|d| d.category == Some(category)).count();
            (category, n)
        })
        .filter(|(_, n)| *n > 0)
        .fold(None, |best: Option<(DriftCategory, usize)>, (category, n)| match best {
            Some((_, top)) if top >= n => best,
            _ => Some((category, n)),
        })
        .map(|(category, _)| category)
}

/// Breached acceptance thresholds. The message names the dominant category of
/// the counted drifts so the drift is classified by keyword sniffing.
fn threshold_findings(limits: &AcceptanceThresholds, drifts: &[Drift]) -> Vec<Finding> {
    let counts = SeverityCounts::from_drifts(drifts);
    let checks = [
        ("high", Some(Severity::High), limits.max_high, counts.high),
        ("medium", Some(Severity::Medium), limits.max_medium, counts.medium),
        ("low", Some(Severity::Low), limits.max_low, counts.low),
        ("total", None, limits.max_total_drifts, counts.total()),
    ];
    checks
        .into_iter()
        .filter_map(|(label, severity, limit, observed)| {
            let limit = limit?;
            (observed > limit as usize).then(|| {
                let counted = drifts
                    .iter()
                    .filter(move |d| severity.is_none_or(|s| d.severity == s));
                let dominant = dominant_category(counted);
                let mut message = format!("{label} drift count {observed} exceeds threshold {limit}");
                if let Some(category) = dominant {
                    message.push_str(&format!(" (mostly {})", category.as_str()));
                }
                Finding::new(format!("drift-threshold-{label}"), None, Severity::High, message)
                    .with_details(json!({
                        "observed": observed,
                        "limit": limit,
                        "dominant_category": dominant.map(DriftCategory::as_str),
                    }))
            })
        })
        .collect()
}

fn event_action(event: &TraceEvent) -> String {
    event
        .action_canonical
        .clone()
        .or_else(|| event.action_raw.clone())
        .unwrap_or_default()
}

/// `(tool, canonical action)` pairs of tool calls, ignored tools removed.
fn tool_pairs(events: &[TraceEvent], profile: &ComparatorProfile) -> Vec<(String, String)> {
    events
        .iter()
        .filter(|e| e.event_type == EventType::ToolCall)
        .filter_map(|e| {
            let tool = e.tool_name.clone().unwrap_or_default();
            (!profile.ignores_tool(&tool)).then(|| (tool, event_action(e)))
        })
        .collect()
}

fn is_subsequence<T: PartialEq>(needle: &[T], haystack: &[T]) -> bool {
    let mut remaining = haystack.iter();
    needle.iter().all(|n| remaining.any(|h| h == n))
}

fn action_counts(actions: &[String]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for action in actions {
        *counts.entry(action.as_str()).or_default() += 1;
    }
    counts
}

fn tool_order(
    check: &CheckSpec,
    base_events: &[TraceEvent],
    cand_events: &[TraceEvent],
    profile: &ComparatorProfile,
) -> Vec<Finding> {
    let base = tool_pairs(base_events, profile);
    let cand = tool_pairs(cand_events, profile);
    let strict = check.strict_order.unwrap_or(profile.strict_order_default);
    let mk = |message: String, details: Value, actions: Vec<String>| {
        Finding::new(check.id.clone(), Some(CheckType::ToolOrder), check.severity, message)
            .with_details(details)
            .with_hints(EvidenceHints {
                actions,
                ..EvidenceHints::default()
            })
    };

    if strict {
        if base == cand {
            return Vec::new();
        }
        let render = |pairs: &[(String, String)]| -> Vec<String> {
            pairs.iter().map(|(t, a)| format!("{t}:{a}")).collect()
        };
        let first_divergence = base
            .iter()
            .zip(cand.iter())
            .position(|(b, c)| b != c)
            .unwrap_or_else(|| base.len().min(cand.len()));
        let divergent: BTreeSet<String> = base
            .iter()
            .skip(first_divergence)
            .chain(cand.iter().skip(first_divergence))
            .map(|(_, a)| a.clone())
            .collect();
        return vec![mk(
            "tool sequence mismatch between baseline and candidate".to_string(),
            json!({
                "baseline_sequence": render(&base),
                "candidate_sequence": render(&cand),
                "first_divergence": first_divergence,
            }),
            divergent.into_iter().collect(),
        )];
    }

    let base_actions: Vec<String> = base.into_iter().map(|(_, a)| a).collect();
    let cand_actions: Vec<String> = cand.into_iter().map(|(_, a)| a).collect();
    let base_counts = action_counts(&base_actions);
    let cand_counts = action_counts(&cand_actions);
    let mut findings = Vec::new();

    let omitted: Vec<String> = base_counts
        .iter()
        .filter(|(action, n)| cand_counts.get(*action).copied().unwrap_or(0) < **n)
        .map(|(action, _)| action.to_string())
        .collect();
    if !omitted.is_empty() {
        findings.push(mk(
            format!("candidate omitted baseline tool actions: {}", omitted.join(", ")),
            json!({ "omitted_actions": omitted }),
            omitted.clone(),
        ));
    }

    // Order is judged on the baseline occurrences the candidate still has.
    let mut budget = cand_counts.clone();
    let retained: Vec<String> = base_actions
        .iter()
        .filter(|action| match budget.get_mut(action.as_str()) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        })
        .cloned()
        .collect();
    if !is_subsequence(&retained, &cand_actions) {
        let reordered: BTreeSet<String> = retained.iter().cloned().collect();
        findings.push(mk(
            "candidate reordered baseline tool actions".to_string(),
            json!({ "baseline_actions": base_actions, "candidate_actions": cand_actions }),
            reordered.into_iter().collect(),
        ));
    }

    let excess: BTreeMap<&str, Value> = cand_counts
        .iter()
        .filter_map(|(action, n)| {
            let allowed = base_counts.get(action).copied().unwrap_or(0);
            (*n > allowed).then(|| (*action, json!({ "baseline": allowed, "candidate": n })))
        })
        .collect();
    if !excess.is_empty() {
        let summary: Vec<String> = excess
            .iter()
            .map(|(action, counts)| format!("{action} (+{})", extra_count(counts)))
            .collect();
        findings.push(mk(
            format!("unexpected extra tool actions: {}", summary.join(", ")),
            json!({ "excess_actions": excess }),
            excess.keys().map(|a| a.to_string()).collect(),
        ));
    }
    findings
}

fn extra_count(counts: &Value) -> u64 {
    let get = |key: &str| counts.get(key).and_then(Value::as_u64).unwrap_or(0);
    get("candidate").saturating_sub(get("baseline"))
}

fn auth_events(events: &[TraceEvent]) -> Vec<(usize, &TraceEvent)> {
    events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.event_type == EventType::Authorization)
        .collect()
}

fn auth_outcome(
    check: &CheckSpec,
    base_events: &[TraceEvent],
    cand_events: &[TraceEvent],
    profile: &ComparatorProfile,
) -> Vec<Finding> {
    let base = auth_events(base_events);
    let cand = auth_events(cand_events);
    let mk = |message: String, details: Value, b: Vec<usize>, c: Vec<usize>| {
        Finding::new(check.id.clone(), Some(CheckType::AuthOutcome), check.severity, message)
            .with_details(details)
            .with_hints(EvidenceHints {
                actions: Vec::new(),
                baseline_indexes: b,
                candidate_indexes: c,
            })
    };

    let mut findings = Vec::new();
    for (position, ((b_idx, b), (c_idx, c))) in base.iter().zip(cand.iter()).enumerate() {
        let (b_outcome, b_reason) = auth_parts(b);
        let (c_outcome, c_reason) = auth_parts(c);
        if b_outcome != c_outcome {
            findings.push(mk(
                format!("authorization outcome mismatch at position {position}: baseline {b_outcome}, candidate {c_outcome}"),
                json!({ "position": position, "baseline": b_outcome, "candidate": c_outcome }),
                vec![*b_idx],
                vec![*c_idx],
            ));
        }
        if profile.compare_reason_class && b_reason != c_reason {
            findings.push(mk(
                format!("authorization reason_class mismatch at position {position}: baseline {b_reason}, candidate {c_reason}"),
                json!({ "position": position, "baseline": b_reason, "candidate": c_reason }),
                vec![*b_idx],
                vec![*c_idx],
            ));
        }
    }
    if base.len() != cand.len() {
        findings.push(mk(
            format!(
                "authorization event count mismatch: baseline {}, candidate {}",
                base.len(),
                cand.len()
            ),
            json!({ "baseline_count": base.len(), "candidate_count": cand.len() }),
            base.iter().skip(cand.len()).map(|(i, _)| *i).collect(),
            cand.iter().skip(base.len()).map(|(i, _)| *i).collect(),
        ));
    }
    findings
}

fn auth_parts(event: &TraceEvent) -> (&str, &str) {
    event
        .authorization
        .as_ref()
        .map_or(("unknown", "unknown"), |a| (a.outcome.as_str(), a.reason_class.as_str()))
}

fn flow(check: &CheckSpec, cand_events: &[TraceEvent], profile: &ComparatorProfile) -> Vec<Finding> {
    let mk = |message: String, details: Value, candidate_indexes: Vec<usize>| {
        Finding::new(check.id.clone(), Some(CheckType::Flow), check.severity, message)
            .with_details(details)
            .with_hints(EvidenceHints {
                candidate_indexes,
                ..EvidenceHints::default()
            })
    };
    let first_of = |kind: EventType| cand_events.iter().position(|e| e.event_type == kind);
    let any_before = |kind: EventType, idx: usize| cand_events[..idx].iter().any(|e| e.event_type == kind);

    let mut findings = Vec::new();

    if profile.require_handoff_before_complete
        && let Some(complete_idx) = first_of(EventType::Complete)
        && !any_before(EventType::Handoff, complete_idx)
    {
        findings.push(mk(
            "complete emitted without a preceding handoff".to_string(),
            json!({ "complete_index": complete_idx }),
            vec![complete_idx],
        ));
    }

    if profile.require_confirmation_before_plan_update
        && let Some(update_idx) = first_of(EventType::PlanStepUpdate)
        && !any_before(EventType::Confirmation, update_idx)
    {
        findings.push(mk(
            "plan_step_update emitted without a preceding confirmation".to_string(),
            json!({ "plan_step_update_index": update_idx }),
            vec![update_idx],
        ));
    }

    if let Some(target) = &profile.required_handoff_target {
        let wrong: Vec<(usize, String)> = cand_events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.event_type == EventType::Handoff)
            .filter_map(|(idx, e)| {
                let to_agent = e.payload_str("to_agent").unwrap_or("");
                (to_agent != target).then(|| (idx, to_agent.to_string()))
            })
            .collect();
        if !wrong.is_empty() {
            let observed: Vec<&str> = wrong.iter().map(|(_, a)| a.as_str()).collect();
            findings.push(mk(
                format!("handoff target mismatch: expected {target}, observed {}", observed.join(", ")),
                json!({ "expected_target": target, "observed_targets": observed }),
                wrong.iter().map(|(i, _)| *i).collect(),
            ));
        }
    }

    if let Some(expected) = check.declared("expected_selected_surfaces").and_then(Value::as_array) {
        let expected: Vec<String> = expected
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        let selected: Vec<(usize, String)> = cand_events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.event_type == EventType::SurfaceSelected)
            .map(|(idx, e)| (idx, e.payload_str("selected_surface").unwrap_or("").to_string()))
            .collect();
        let observed: Vec<String> = selected.iter().map(|(_, s)| s.clone()).collect();
        let strict = check.strict_order.unwrap_or(profile.strict_order_default);
        let satisfied = if strict {
            is_subsequence(&expected, &observed)
        } else {
            expected.iter().all(|s| observed.contains(s))
        };
        if !satisfied {
            findings.push(mk(
                format!(
                    "selected surfaces do not match expectation ({})",
                    if strict { "ordered" } else { "unordered" }
                ),
                json!({ "expected_selected_surfaces": expected, "observed_selected_surfaces": observed }),
                selected.iter().map(|(i, _)| *i).collect(),
            ));
        }
    }

    findings
}

fn success_signature(check: &CheckSpec, required: &[String], cand_events: &[TraceEvent]) -> Vec<Finding> {
    let observed: BTreeSet<&str> = cand_events
        .iter()
        .filter(|e| e.event_type == EventType::Outcome)
        .filter_map(|e| e.success_signature.as_deref())
        .collect();
    let missing: Vec<&str> = required
        .iter()
        .map(String::as_str)
        .filter(|s| !observed.contains(s))
        .collect();
    if missing.is_empty() {
        return Vec::new();
    }
    vec![
        Finding::new(
            check.id.clone(),
            Some(CheckType::SuccessSignature),
            check.severity,
            format!("missing success signatures: {}", missing.join(", ")),
        )
        .with_details(json!({ "missing_signatures": missing })),
    ]
}
