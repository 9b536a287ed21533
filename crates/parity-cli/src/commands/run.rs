use crate::cli::{CaptureArgs, GateArgs, GoldenArgs, SuiteArgs};
use crate::support::{
    build_runner_or_exit, capture_options, emit_gate_outputs, exit_with, load_profile_or_exit,
    print_json_or_exit, select_scenarios_or_exit,
};
use parity_capture::Orchestrator;
use parity_kernel::{compare, evaluate_replay_gate_with_retry};
use parity_report::write_run_reports;
use parity_store::read_golden_baseline;
use serde_json::json;
use std::path::PathBuf;
use std::process;
use tracing::info;

pub struct Args {
    pub suite: SuiteArgs,
    pub capture: CaptureArgs,
    pub gate: GateArgs,
    pub golden: GoldenArgs,
    pub profile: Option<PathBuf>,
    pub retry_once: bool,
    pub json: bool,
}

pub fn run(args: Args) {
    let scenarios = select_scenarios_or_exit(&args.suite);
    let profile = load_profile_or_exit(args.profile.as_deref());
    let runner = build_runner_or_exit(
        args.capture.adapter_command.as_deref(),
        args.capture.workspace_path.as_deref(),
    );
    let orchestrator = Orchestrator::new(runner, capture_options(&args.capture));

    let golden = args.golden.goldens_root.as_deref().and_then(|root| {
        read_golden_baseline(root, &args.golden.baseline_id).unwrap_or_else(|e| exit_with(e))
    });
    if let Some(record) = &golden {
        info!(
            baseline_id = %record.location.baseline_id,
            path = %record.location.baseline_path.display(),
            "comparing against golden baseline"
        );
    }

    let label = &args.capture.label;
    let primary_run = orchestrator
        .run(&scenarios, label)
        .unwrap_or_else(|e| exit_with(e));
    let anchor = golden.as_ref().map_or(&primary_run.baseline, |g| &g.artifact);
    let primary = compare(&scenarios, anchor, &primary_run.candidate, &profile);

    let mut retry_run_dir = None;
    let retry = if args.retry_once && primary.is_blocking() {
        let retry_run = orchestrator
            .run(&scenarios, &format!("{label}-retry"))
            .unwrap_or_else(|e| exit_with(e));
        let anchor = golden.as_ref().map_or(&retry_run.baseline, |g| &g.artifact);
        let result = compare(&scenarios, anchor, &retry_run.candidate, &profile);
        retry_run_dir = Some(retry_run.run_dir);
        Some(result)
    } else {
        None
    };

    let gate = evaluate_replay_gate_with_retry(&primary, retry.as_ref(), args.gate.gate_mode.into());
    let paths = write_run_reports(&primary_run.run_dir, &primary, &gate)
        .unwrap_or_else(|e| exit_with(e));
    let markdown = emit_gate_outputs(&gate, &args.gate, args.json);

    if args.json {
        print_json_or_exit(&json!({
            "run_dir": primary_run.run_dir.display().to_string(),
            "retry_run_dir": retry_run_dir.as_ref().map(|p| p.display().to_string()),
            "golden_baseline": golden.as_ref().map(|g| g.location.baseline_id.clone()),
            "comparison_path": paths.comparison.display().to_string(),
            "report_path": paths.report.display().to_string(),
            "gate_summary_path": paths.gate.json.display().to_string(),
            "comparison": primary.summary,
            "gate": gate,
        }));
    } else {
        println!("parity run");
        println!("  Run dir: {}", primary_run.run_dir.display());
        if let Some(dir) = &retry_run_dir {
            println!("  Retry run dir: {}", dir.display());
        }
        if let Some(record) = &golden {
            println!("  Golden baseline: {}", record.location.baseline_id);
        }
        println!("  Scenarios: {}", primary.summary.total_scenarios);
        println!("  Drifts: {}", primary.summary.total_drifts);
        println!("  Report: {}", paths.report.display());
        println!();
        print!("{markdown}");
    }

    if !gate.passed {
        process::exit(1);
    }
}
