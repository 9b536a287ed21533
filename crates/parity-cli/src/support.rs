use crate::cli::{CaptureArgs, GateArgs, PromotionArgs, SuiteArgs};
use parity_capture::{CaptureOptions, CommandAdapterRunner, DeterminismConfig, ScenarioRunner, SyntheticRunner};
use parity_kernel::{ComparatorProfile, GateEvaluation, ProfileArtifacts, Scenario, ScenarioFilter, parse_suite};
use parity_report::{append_step_summary, github_step_summary_path, render_gate_markdown, write_gate_summary};
use parity_store::{PromotionFlags, read_profile_artifacts};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

pub fn exit_with(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    std::process::exit(1);
}

pub fn load_suite_or_exit(path: &Path) -> Vec<Scenario> {
    let text = fs::read_to_string(path)
        .unwrap_or_else(|e| exit_with(format!("failed to read {}: {e}", path.display())));
    let raw: Value = serde_json::from_str(&text)
        .unwrap_or_else(|e| exit_with(format!("failed to parse {}: {e}", path.display())));
    let suite = parse_suite(&raw).unwrap_or_else(|e| exit_with(format!("{}: {e}", path.display())));
    debug!(path = %path.display(), scenarios = suite.scenarios.len(), "scenario suite loaded");
    suite.scenarios
}

pub fn shard_or_exit(index: Option<usize>, count: Option<usize>) -> Option<(usize, usize)> {
    match (index, count) {
        (None, None) => None,
        (Some(index), Some(count)) => Some((index, count)),
        _ => exit_with("--shard-index and --shard-count must be given together"),
    }
}

/// Load the suite, then apply ID/tag filters and sharding.
pub fn select_scenarios_or_exit(args: &SuiteArgs) -> Vec<Scenario> {
    let scenarios = load_suite_or_exit(&args.scenarios);
    let filter = ScenarioFilter {
        scenario_ids: args.scenario_ids.clone(),
        tags: args.tags.clone(),
        shard: shard_or_exit(args.shard_index, args.shard_count),
    };
    let selected = filter.apply(&scenarios).unwrap_or_else(|e| exit_with(e));
    if selected.is_empty() {
        warn!(path = %args.scenarios.display(), "no scenarios selected");
    }
    selected
}

pub fn load_profile_or_exit(path: Option<&Path>) -> ComparatorProfile {
    let Some(path) = path else {
        return ComparatorProfile::default();
    };
    ComparatorProfile::load(path)
        .unwrap_or_else(|e| exit_with(format!("failed to load profile {}: {e}", path.display())))
}

pub fn build_runner_or_exit(adapter_command: Option<&str>, workspace_path: Option<&Path>) -> Box<dyn ScenarioRunner> {
    match adapter_command {
        None => Box::new(SyntheticRunner::new()),
        Some(command) => {
            let mut runner = CommandAdapterRunner::from_command_line(command)
                .unwrap_or_else(|e| exit_with(format!("invalid --adapter-command: {e}")));
            if let Some(dir) = workspace_path {
                runner = runner.with_cwd(dir);
            }
            Box::new(runner)
        }
    }
}

pub fn capture_options(args: &CaptureArgs) -> CaptureOptions {
    CaptureOptions {
        workspace_path: args.workspace_path.clone(),
        determinism: DeterminismConfig::from_env(),
        ..CaptureOptions::new(args.out.clone())
    }
}

pub fn read_artifacts_or_exit(path: &Path) -> ProfileArtifacts {
    read_profile_artifacts(path).unwrap_or_else(|e| exit_with(e))
}

pub fn promotion_flags(args: PromotionArgs) -> PromotionFlags {
    PromotionFlags {
        apply: args.apply,
        approve: args.approve,
        force: args.force,
    }
}

pub fn print_json_or_exit<T: Serialize>(value: &T) {
    let rendered = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| exit_with(format!("failed to render json: {e}")));
    println!("{rendered}");
}

/// Write `--gate-output`, append the step summary, and print annotations.
///
/// Annotation lines go to stderr when stdout carries JSON. Returns the
/// rendered gate Markdown.
pub fn emit_gate_outputs(gate: &GateEvaluation, args: &GateArgs, json: bool) -> String {
    let markdown = render_gate_markdown(gate);
    if let Some(path) = &args.gate_output {
        write_gate_summary(path, gate).unwrap_or_else(|e| exit_with(e));
    }
    if let Some(path) = github_step_summary_path() {
        append_step_summary(&path, &markdown).unwrap_or_else(|e| exit_with(e));
    }
    if args.emit_github_annotations {
        for line in gate.github_annotation_lines() {
            if json {
                eprintln!("{line}");
            } else {
                println!("{line}");
            }
        }
    }
    markdown
}
