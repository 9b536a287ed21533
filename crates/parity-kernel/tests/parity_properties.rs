//! Integration tests: end-to-end kernel properties over a fixture suite.
//!
//! The suite in tests/fixtures/suite.json is parsed once per test; traces are
//! built by hand so each property controls exactly one difference between
//! baseline and candidate.

use parity_kernel::drift::{DriftCategory, OperatorBucket};
use parity_kernel::normalize::{NormalizeOptions, normalize_events};
use parity_kernel::trace::{ARTIFACT_SCHEMA_VERSION, Authorization};
use parity_kernel::{
    Classification, ComparatorProfile, EventType, GateMode, GateStatus, Profile, ProfileArtifacts,
    ScenarioRunArtifact, ScenarioSuite, SchemaError, Severity, TraceEvent, compare,
    evaluate_replay_gate, evaluate_replay_gate_with_retry, parse_suite,
};
use serde_json::{Value, json};
use std::path::PathBuf;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_suite() -> ScenarioSuite {
    let path = fixtures_dir().join("suite.json");
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));
    let raw: Value = serde_json::from_str(&text)
        .unwrap_or_else(|e| panic!("failed to parse {}: {e}", path.display()));
    parse_suite(&raw).expect("fixture suite should parse")
}

fn tool_call(scenario: &str, tool: &str, action: &str) -> TraceEvent {
    let mut event = TraceEvent::new(EventType::ToolCall, scenario, 0);
    event.tool_name = Some(tool.to_string());
    event.action_raw = Some(action.to_string());
    event.action_canonical = Some(action.to_string());
    event
}

fn outcome(scenario: &str, signature: &str) -> TraceEvent {
    let mut event = TraceEvent::new(EventType::Outcome, scenario, 0);
    event.success_signature = Some(signature.to_string());
    event
}

fn authorization(scenario: &str, outcome: &str, reason: &str) -> TraceEvent {
    let mut event = TraceEvent::new(EventType::Authorization, scenario, 0);
    event.authorization = Some(Authorization {
        outcome: outcome.to_string(),
        reason_class: reason.to_string(),
    });
    event
}

fn artifacts(profile: Profile, scenarios: Vec<(&str, Vec<TraceEvent>)>) -> ProfileArtifacts {
    ProfileArtifacts {
        schema_version: ARTIFACT_SCHEMA_VERSION,
        profile,
        label: "fixture".to_string(),
        run_id: format!("run1_{profile}"),
        scenarios: scenarios
            .into_iter()
            .map(|(id, events)| ScenarioRunArtifact {
                scenario_id: id.to_string(),
                scenario_digest: String::new(),
                raw_events: events.clone(),
                normalized_events: events,
                success: true,
            })
            .collect(),
    }
}

const BUILD: &str = "BUILD_SCRIPT_LAUNCH";
const WRITE: &str = "GUARDED_WRITE";

fn build_events(actions: &[(&str, &str)]) -> Vec<TraceEvent> {
    let mut events: Vec<TraceEvent> = actions
        .iter()
        .map(|(tool, action)| tool_call(BUILD, tool, action))
        .collect();
    events.push(outcome(BUILD, "BUILD_OK"));
    events
}

fn write_events(outcome_value: &str) -> Vec<TraceEvent> {
    vec![
        authorization(WRITE, outcome_value, "sandbox"),
        outcome(WRITE, "WRITE_REFUSED"),
    ]
}

#[test]
fn digest_is_stable_across_key_order() {
    let a = json!({"scenarios": [{
        "scenario_id": "x",
        "steps": [],
        "expectations": {"success_signature": ["OK"]},
        "tags": ["b", "a"]
    }]});
    let b = json!({"scenarios": [{
        "tags": ["a", "b"],
        "expectations": {"success_signature": ["OK"]},
        "steps": [],
        "scenario_id": "X"
    }]});
    let a = parse_suite(&a).expect("suite a should parse");
    let b = parse_suite(&b).expect("suite b should parse");
    assert_eq!(a.scenarios[0].scenario_digest, b.scenarios[0].scenario_digest);
    assert_eq!(a.suite_digest(), b.suite_digest());
    assert_eq!(load_suite().scenarios[0].scenario_digest, load_suite().scenarios[0].scenario_digest);
}

#[test]
fn duplicate_ids_fail_the_suite() {
    let raw = json!({"scenarios": [
        {"scenario_id": "dup", "steps": [], "expectations": {"success_signature": ["OK"]}},
        {"scenario_id": "DUP", "steps": [], "expectations": {"success_signature": ["OK"]}}
    ]});
    let err = parse_suite(&raw).expect_err("duplicates must be rejected");
    assert!(matches!(err, SchemaError::DuplicateScenarioIds { ref ids } if ids == &vec!["DUP".to_string()]));
}

#[test]
fn normalization_converges_across_platforms() {
    let mut windows = TraceEvent::new(EventType::ToolCall, BUILD, 1_700_000_000_000);
    windows.payload = Some(json!({"file": r"C:\repo\src\module.ts", "session_id": "sess_8f2k91"}));
    let mut posix = TraceEvent::new(EventType::ToolCall, BUILD, 1_700_000_500_000);
    posix.payload = Some(json!({"file": "/repo/src/module.ts", "session_id": "sess_00zz17"}));

    let win = normalize_events(
        &[windows],
        &NormalizeOptions::new(Default::default(), Some(r"C:\repo".to_string())),
    );
    let nix = normalize_events(
        &[posix],
        &NormalizeOptions::new(Default::default(), Some("/repo".to_string())),
    );
    assert_eq!(win, nix);
    assert_eq!(win[0].timestamp_ms, 0);
    assert_eq!(win[0].payload_str("file"), Some("src/module.ts"));
    assert_eq!(win[0].payload_str("session_id"), Some("<ID>"));
}

#[test]
fn strict_reorder_yields_one_explained_blocker() {
    let suite = load_suite();
    let baseline = artifacts(
        Profile::Baseline,
        vec![
            (BUILD, build_events(&[("terminal", "launch_build_script"), ("fs", "read")])),
            (WRITE, write_events("deny")),
        ],
    );
    let candidate = artifacts(
        Profile::Candidate,
        vec![
            (BUILD, build_events(&[("fs", "read"), ("terminal", "launch_build_script")])),
            (WRITE, write_events("deny")),
        ],
    );
    let result = compare(&suite.scenarios, &baseline, &candidate, &ComparatorProfile::default());

    let drifts = &result.scenarios[0].drifts;
    assert_eq!(drifts.len(), 1);
    let drift = &drifts[0];
    assert_eq!(drift.check_id, "ORDER");
    assert_eq!(drift.category, Some(DriftCategory::ToolSequence));
    assert_eq!(drift.operator_bucket, Some(OperatorBucket::Blocker));
    let evidence = drift.evidence.as_ref().expect("drift should carry evidence");
    assert_eq!(
        evidence.artifact_refs,
        vec![
            format!("baseline.norm.json#scenario:{BUILD}"),
            format!("candidate.norm.json#scenario:{BUILD}"),
        ]
    );
    assert_eq!(evidence.baseline_event_indexes, vec![0, 1]);
    assert!(!result.passed);
    assert!(result.scenarios[1].passed);
}

#[test]
fn ignored_optional_tool_does_not_drift() {
    let suite = load_suite();
    let profile = ComparatorProfile {
        ignore_optional_tools: vec!["optional_tool".to_string()],
        ..ComparatorProfile::default()
    };
    let baseline = artifacts(
        Profile::Baseline,
        vec![
            (BUILD, build_events(&[("terminal", "launch_build_script"), ("fs", "read")])),
            (WRITE, write_events("deny")),
        ],
    );
    let candidate = artifacts(
        Profile::Candidate,
        vec![
            (
                BUILD,
                build_events(&[
                    ("terminal", "launch_build_script"),
                    ("optional_tool", "execute"),
                    ("fs", "read"),
                ]),
            ),
            (WRITE, write_events("deny")),
        ],
    );
    let result = compare(&suite.scenarios, &baseline, &candidate, &profile);
    assert_eq!(result.summary.total_drifts, 0);
    assert!(result.passed);
}

#[test]
fn zero_total_threshold_adds_threshold_drift() {
    let suite = load_suite();
    let build = build_events(&[("terminal", "launch_build_script")]);
    let baseline = artifacts(
        Profile::Baseline,
        vec![(BUILD, build.clone()), (WRITE, write_events("deny"))],
    );
    let candidate = artifacts(
        Profile::Candidate,
        vec![(BUILD, build), (WRITE, write_events("allow"))],
    );
    let result = compare(&suite.scenarios, &baseline, &candidate, &ComparatorProfile::default());
    let write = &result.scenarios[1];
    let ids: Vec<&str> = write.drifts.iter().map(|d| d.check_id.as_str()).collect();
    assert_eq!(ids, vec!["AUTH", "drift-threshold-total"]);
    assert_eq!(write.drifts[1].severity, Severity::High);
    assert_eq!(write.drifts[1].category, Some(DriftCategory::AuthorizationPolicy));
    assert!(write.drifts[1].message.ends_with("(mostly authorization_policy)"));
    assert!(!write.passed);
    assert_eq!(result.summary.explainability_rollup.unexplained_drifts, 0);
}

#[test]
fn gate_modes_and_retry_classification() {
    let suite = load_suite();
    let clean_build = build_events(&[("terminal", "launch_build_script")]);
    let baseline = artifacts(
        Profile::Baseline,
        vec![(BUILD, clean_build.clone()), (WRITE, write_events("deny"))],
    );
    let drifted = artifacts(
        Profile::Candidate,
        vec![(BUILD, build_events(&[("terminal", "execute")])), (WRITE, write_events("deny"))],
    );
    let clean = artifacts(
        Profile::Candidate,
        vec![(BUILD, clean_build), (WRITE, write_events("deny"))],
    );
    let profile = ComparatorProfile::default();
    let primary = compare(&suite.scenarios, &baseline, &drifted, &profile);
    let retry = compare(&suite.scenarios, &baseline, &clean, &profile);
    assert_eq!(primary.summary.drifts_by_severity.high, 1);
    assert_eq!(retry.summary.total_drifts, 0);

    let strict = evaluate_replay_gate(&primary, GateMode::Strict);
    assert!(!strict.passed);
    assert_eq!(strict.status, GateStatus::Fail);
    assert_eq!(strict.classification, Classification::DeterministicRegression);

    let warn = evaluate_replay_gate(&primary, GateMode::Warn);
    assert!(warn.passed);
    assert_eq!(warn.status, GateStatus::Warn);

    let flake = evaluate_replay_gate_with_retry(&primary, Some(&retry), GateMode::Strict);
    assert!(flake.passed);
    assert_eq!(flake.status, GateStatus::Warn);
    assert_eq!(flake.classification, Classification::IntermittentFlake);
    assert!(flake.retried);
}
