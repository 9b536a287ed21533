use parity_capture::{RunContext, RunnerError, ScenarioRunner, SyntheticRunner};
use parity_kernel::{Classification, EventType, Profile, Scenario, TraceEvent, parse_suite};
use parity_matrix::{MatrixOptions, MatrixRun, MatrixRunner, parse_contract};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

struct TempDirGuard(PathBuf);

impl TempDirGuard {
    fn new(prefix: &str) -> Self {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("{prefix}-{}-{unique}", std::process::id()));
        fs::create_dir_all(&path).expect("temp dir should be created");
        Self(path)
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

/// Drops candidate outcome events for the first `remaining` candidate runs.
struct DroppingOutcomes {
    remaining: AtomicUsize,
}

impl DroppingOutcomes {
    fn new(remaining: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(remaining),
        }
    }

    fn take(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl ScenarioRunner for DroppingOutcomes {
    fn run_scenario(&self, scenario: &Scenario, ctx: &RunContext) -> Result<Vec<TraceEvent>, RunnerError> {
        let mut events = SyntheticRunner.run_scenario(scenario, ctx)?;
        if ctx.profile == Profile::Candidate && self.take() {
            events.retain(|e| e.event_type != EventType::Outcome);
        }
        Ok(events)
    }
}

fn scenarios() -> Vec<Scenario> {
    parse_suite(&json!({
        "scenarios": [
            {
                "scenario_id": "build_launch",
                "tag_metadata": {"domain": "build", "risk": "p0"},
                "steps": [
                    {"kind": "user", "text": "run the build"},
                    {"kind": "tool", "tool": "terminal", "action": "launch_build_script"}
                ],
                "expectations": {
                    "success_signature": ["BUILD_OK"],
                    "checks": [
                        {"id": "ORDER", "type": "tool_order", "severity": "high"},
                        {"id": "SIG", "type": "success_signature", "severity": "high"}
                    ]
                }
            },
            {
                "scenario_id": "docs_lookup",
                "tags": ["domain:docs"],
                "steps": [{"kind": "tool", "tool": "fs", "action": "get"}],
                "expectations": {"success_signature": ["DOCS_OK"]}
            }
        ]
    }))
    .expect("suite should parse")
    .scenarios
}

fn single_cell_contract() -> Value {
    json!({
        "schema_version": "replay-matrix.v1",
        "contract_id": "single",
        "axes": {
            "model_variants": [{"id": "model-a"}],
            "comparator_profiles": [{"id": "default"}],
            "scenario_slices": [{"id": "build", "risk_tier": "p0", "tags": ["domain:build"]}],
            "execution_surfaces": ["memory_terminal"],
            "gate_modes": ["strict"],
            "normalization_profiles": [{"id": "full"}]
        },
        "risk_tier_policies": {"p0": {"max_high": 0}}
    })
}

fn run<R: ScenarioRunner>(runner: R, raw: &Value, root: &Path) -> MatrixRun {
    let contract = parse_contract(raw).expect("contract should parse");
    let profiles = contract.resolve_profiles(root).expect("profiles resolve");
    MatrixRunner::new(runner, contract, profiles, MatrixOptions::new(root.join("out"), "nightly"))
        .expect("runner builds")
        .run(&scenarios())
        .expect("matrix run succeeds")
}

#[test]
fn clean_matrix_expands_and_promotes_every_cell() {
    let tmp = TempDirGuard::new("parity-matrix-clean");
    let mut raw = single_cell_contract();
    raw["axes"]["model_variants"] = json!([{"id": "model-a"}, {"id": "model-b"}]);
    raw["axes"]["scenario_slices"] = json!([
        {"id": "build", "risk_tier": "p0", "tags": ["domain:build"]},
        {"id": "everything", "risk_tier": "p2"}
    ]);
    raw["axes"]["execution_surfaces"] = json!(["auto", "memory_terminal", "memory_terminal_interactive"]);

    let run = run(SyntheticRunner, &raw, tmp.path());
    let report = &run.report;
    assert_eq!(report.total_cells, 12);
    assert!(report.all_promotable());
    assert!(report.drift_fingerprint.starts_with("mfp1_"));
    assert!(run.paths.json.is_file());
    assert!(run.paths.markdown.is_file());

    let axes: Vec<&str> = report.axis_rollups.iter().map(|r| r.axis.as_str()).collect();
    assert_eq!(
        axes,
        [
            "model_variant",
            "comparator_profile",
            "scenario_slice",
            "execution_surface",
            "gate_mode",
            "normalization_profile"
        ]
    );
    let slices: Vec<&str> = report.axis_rollups[2].values.iter().map(|v| v.value.as_str()).collect();
    assert_eq!(slices, ["build", "everything"]);
    assert_eq!(report.axis_rollups[0].values[0].cells, 6);
    assert_eq!(report.axis_rollups[0].values[0].average_cms, 100.0);

    let everything = report
        .cells
        .iter()
        .find(|c| c.cell.scenario_slice == "everything")
        .expect("everything cell");
    assert_eq!(everything.scenario_ids, ["BUILD_LAUNCH", "DOCS_LOOKUP"]);
    assert!(everything.run_dir.starts_with("cells/"));
    assert!(run.run_dir.join(&everything.run_dir).join("comparison.json").is_file());
    assert!(everything.retry_run_dir.is_none());

    let tiers: Vec<(&str, usize)> = report
        .risk_tiers
        .iter()
        .map(|t| (t.risk_tier.as_str(), t.cells))
        .collect();
    assert_eq!(tiers, [("p0", 6), ("p2", 6)]);
}

#[test]
fn resolved_flake_is_penalized_but_promotable() {
    let tmp = TempDirGuard::new("parity-matrix-flake");
    let run = run(DroppingOutcomes::new(1), &single_cell_contract(), tmp.path());
    let cell = &run.report.cells[0];

    assert_eq!(cell.gate.classification, Classification::IntermittentFlake);
    assert!(cell.gate.retried);
    assert!(cell.retry_run_dir.is_some());
    assert_eq!(cell.score.flake_penalty, 5.0);
    assert_eq!(cell.score.wds, 80.0);
    assert_eq!(cell.score.spr, 0.0);
    assert!(!cell.deterministic_regression);
    assert!(!cell.promotable, "one high drift breaks the p0 policy");
    assert_eq!(cell.policy_violations, ["high drifts 1 exceed risk-tier limit 0"]);
}

#[test]
fn deterministic_regression_blocks_promotion() {
    let tmp = TempDirGuard::new("parity-matrix-regression");
    let run = run(DroppingOutcomes::new(usize::MAX), &single_cell_contract(), tmp.path());
    let cell = &run.report.cells[0];

    assert_eq!(cell.gate.classification, Classification::DeterministicRegression);
    assert!(cell.deterministic_regression);
    assert!(!cell.gate.passed);
    assert!(!cell.promotable);
    assert_eq!(run.report.risk_tiers[0].deterministic_regressions, 1);
    assert_eq!(run.report.promotable_cells, 0);

    let markdown = fs::read_to_string(&run.paths.markdown).expect("matrix markdown");
    assert!(markdown.contains("## Policy Violations"));
    assert!(markdown.contains("| p0 | 1 | 0 | 1 |"));
}

#[test]
fn retry_can_be_disabled() {
    let tmp = TempDirGuard::new("parity-matrix-no-retry");
    let mut raw = single_cell_contract();
    raw["determinism"] = json!({"retry_once": false});
    let run = run(DroppingOutcomes::new(1), &raw, tmp.path());
    let cell = &run.report.cells[0];
    assert!(!cell.gate.retried);
    assert_eq!(cell.gate.classification, Classification::DeterministicRegression);
}
