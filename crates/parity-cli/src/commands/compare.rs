use crate::cli::{GateArgs, GoldenArgs};
use crate::support::{
    emit_gate_outputs, exit_with, load_profile_or_exit, load_suite_or_exit, print_json_or_exit,
    read_artifacts_or_exit,
};
use parity_kernel::{Profile, compare, evaluate_replay_gate};
use parity_report::write_run_reports;
use parity_store::{ResolveRequest, ResolvedArtifact, resolve_artifact};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process;

pub struct Args {
    pub scenarios: PathBuf,
    pub baseline: Option<PathBuf>,
    pub candidate: Option<PathBuf>,
    pub golden: GoldenArgs,
    pub legacy_run_dir: Option<PathBuf>,
    pub legacy_runs_root: Option<PathBuf>,
    pub profile: Option<PathBuf>,
    pub gate: GateArgs,
    pub out: Option<PathBuf>,
    pub json: bool,
}

fn resolve_or_exit(kind: Profile, explicit: Option<&Path>, args: &Args) -> ResolvedArtifact {
    let request = ResolveRequest {
        explicit,
        goldens_root: args.golden.goldens_root.as_deref(),
        baseline_id: Some(&args.golden.baseline_id),
        legacy_run_dir: args.legacy_run_dir.as_deref(),
        legacy_runs_root: args.legacy_runs_root.as_deref(),
    };
    let resolved = resolve_artifact(kind, &request).unwrap_or_else(|e| exit_with(e));
    resolved.unwrap_or_else(|| {
        let hint = match kind {
            Profile::Baseline => "--baseline, --goldens-root, --legacy-run-dir, or --legacy-runs-root",
            Profile::Candidate => "--candidate, --legacy-run-dir, or --legacy-runs-root",
        };
        if let Some(path) = explicit {
            exit_with(format!("{kind} artifact not found at {} (try {hint})", path.display()))
        }
        exit_with(format!("no {kind} artifact found; pass {hint}"))
    })
}

pub fn run(args: Args) {
    let scenarios = load_suite_or_exit(&args.scenarios);
    let profile = load_profile_or_exit(args.profile.as_deref());
    let baseline_ref = resolve_or_exit(Profile::Baseline, args.baseline.as_deref(), &args);
    let candidate_ref = resolve_or_exit(Profile::Candidate, args.candidate.as_deref(), &args);
    let baseline = read_artifacts_or_exit(&baseline_ref.path);
    let candidate = read_artifacts_or_exit(&candidate_ref.path);

    let result = compare(&scenarios, &baseline, &candidate, &profile);
    let gate = evaluate_replay_gate(&result, args.gate.gate_mode.into());

    let out_dir = args.out.clone().unwrap_or_else(|| {
        candidate_ref
            .path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    });
    let paths = write_run_reports(&out_dir, &result, &gate).unwrap_or_else(|e| exit_with(e));
    let markdown = emit_gate_outputs(&gate, &args.gate, args.json);

    if args.json {
        print_json_or_exit(&json!({
            "baseline": baseline_ref,
            "candidate": candidate_ref,
            "comparison_path": paths.comparison.display().to_string(),
            "report_path": paths.report.display().to_string(),
            "gate_summary_path": paths.gate.json.display().to_string(),
            "comparison": result.summary,
            "gate": gate,
        }));
    } else {
        println!("parity compare");
        println!(
            "  Baseline: {} ({})",
            baseline_ref.path.display(),
            baseline_ref.source.as_str()
        );
        println!(
            "  Candidate: {} ({})",
            candidate_ref.path.display(),
            candidate_ref.source.as_str()
        );
        println!("  Drifts: {}", result.summary.total_drifts);
        println!("  Report: {}", paths.report.display());
        println!();
        print!("{markdown}");
    }

    if !gate.passed {
        process::exit(1);
    }
}
