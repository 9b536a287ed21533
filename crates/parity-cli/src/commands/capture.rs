use crate::cli::{CaptureArgs, SuiteArgs};
use crate::support::{
    build_runner_or_exit, capture_options, exit_with, print_json_or_exit, select_scenarios_or_exit,
};
use parity_capture::{MANIFEST_FILE, Orchestrator};
use parity_kernel::Profile;
use serde_json::json;

pub fn run(suite: SuiteArgs, capture: CaptureArgs, profile: Profile, json_output: bool) {
    let scenarios = select_scenarios_or_exit(&suite);
    let runner = build_runner_or_exit(
        capture.adapter_command.as_deref(),
        capture.workspace_path.as_deref(),
    );
    let orchestrator = Orchestrator::new(runner, capture_options(&capture));
    let result = orchestrator
        .capture(profile, &scenarios, &capture.label)
        .unwrap_or_else(|e| exit_with(e));

    let artifact_path = result.run_dir.join(profile.norm_file_name());
    let successful = result.artifacts.scenarios.iter().filter(|s| s.success).count();

    if json_output {
        print_json_or_exit(&json!({
            "profile": profile,
            "run_id": result.artifacts.run_id,
            "run_dir": result.run_dir.display().to_string(),
            "artifact_path": artifact_path.display().to_string(),
            "manifest_path": result.run_dir.join(MANIFEST_FILE).display().to_string(),
            "scenario_count": result.artifacts.scenarios.len(),
            "successful_scenarios": successful,
        }));
    } else {
        println!("parity capture --profile {profile}");
        println!("  Run ID: {}", result.artifacts.run_id);
        println!("  Run dir: {}", result.run_dir.display());
        println!("  Artifact: {}", artifact_path.display());
        println!(
            "  Scenarios: {} ({} satisfied success signatures)",
            result.artifacts.scenarios.len(),
            successful
        );
    }
}
