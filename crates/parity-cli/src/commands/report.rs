use crate::cli::GateArgs;
use crate::support::{emit_gate_outputs, exit_with, print_json_or_exit};
use parity_kernel::evaluate_replay_gate;
use parity_report::{read_comparison, render_comparison_markdown, write_run_reports};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process;

/// Re-render `report.md` and the gate summary beside an existing comparison.
pub fn run(comparison_path: PathBuf, gate_args: GateArgs, json_output: bool) {
    let comparison = read_comparison(&comparison_path).unwrap_or_else(|e| exit_with(e));
    let gate = evaluate_replay_gate(&comparison, gate_args.gate_mode.into());
    let dir = comparison_path
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let paths = write_run_reports(&dir, &comparison, &gate).unwrap_or_else(|e| exit_with(e));
    let markdown = emit_gate_outputs(&gate, &gate_args, json_output);

    if json_output {
        print_json_or_exit(&json!({
            "report_path": paths.report.display().to_string(),
            "gate_summary_path": paths.gate.json.display().to_string(),
            "gate": gate,
        }));
    } else {
        print!("{}", render_comparison_markdown(&comparison));
        println!();
        print!("{markdown}");
    }

    if !gate.passed {
        process::exit(1);
    }
}
