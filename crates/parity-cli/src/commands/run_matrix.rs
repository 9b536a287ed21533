use crate::cli::SuiteArgs;
use crate::support::{build_runner_or_exit, exit_with, print_json_or_exit, select_scenarios_or_exit};
use parity_matrix::{MatrixOptions, MatrixRunner, load_contract, render_matrix_markdown};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process;

pub struct Args {
    pub suite: SuiteArgs,
    pub matrix_contract: PathBuf,
    pub out: PathBuf,
    pub label: String,
    pub workspace_path: Option<PathBuf>,
    pub adapter_command: Option<String>,
    pub json: bool,
}

pub fn run(args: Args) {
    let scenarios = select_scenarios_or_exit(&args.suite);
    let contract = load_contract(&args.matrix_contract).unwrap_or_else(|e| exit_with(e));
    let base_dir = args.matrix_contract.parent().unwrap_or(Path::new("."));
    let profiles = contract
        .resolve_profiles(base_dir)
        .unwrap_or_else(|e| exit_with(e));
    let runner = build_runner_or_exit(args.adapter_command.as_deref(), args.workspace_path.as_deref());
    let options = MatrixOptions {
        workspace_path: args.workspace_path.clone(),
        ..MatrixOptions::new(args.out.clone(), args.label.clone())
    };
    let matrix = MatrixRunner::new(runner, contract, profiles, options).unwrap_or_else(|e| exit_with(e));
    let run = matrix.run(&scenarios).unwrap_or_else(|e| exit_with(e));

    if args.json {
        print_json_or_exit(&json!({
            "run_dir": run.run_dir.display().to_string(),
            "report_path": run.paths.json.display().to_string(),
            "markdown_path": run.paths.markdown.display().to_string(),
            "total_cells": run.report.total_cells,
            "promotable_cells": run.report.promotable_cells,
            "drift_fingerprint": run.report.drift_fingerprint,
            "risk_tiers": run.report.risk_tiers,
        }));
    } else {
        println!("parity run-matrix");
        println!("  Run dir: {}", run.run_dir.display());
        println!("  Report: {}", run.paths.markdown.display());
        println!();
        print!("{}", render_matrix_markdown(&run.report));
    }

    if !run.report.all_promotable() {
        process::exit(1);
    }
}
