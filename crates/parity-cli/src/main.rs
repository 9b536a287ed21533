//! Replay parity CLI: the `parity` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            suite,
            capture,
            gate,
            golden,
            profile,
            retry_once,
            json,
        } => commands::run::run(commands::run::Args {
            suite,
            capture,
            gate,
            golden,
            profile,
            retry_once,
            json,
        }),

        Commands::RunMatrix {
            suite,
            matrix_contract,
            out,
            label,
            workspace_path,
            adapter_command,
            json,
        } => commands::run_matrix::run(commands::run_matrix::Args {
            suite,
            matrix_contract,
            out,
            label,
            workspace_path,
            adapter_command,
            json,
        }),

        Commands::Capture {
            suite,
            capture,
            profile,
            json,
        } => commands::capture::run(suite, capture, profile.into(), json),

        Commands::Compare {
            scenarios,
            baseline,
            candidate,
            golden,
            legacy_run_dir,
            legacy_runs_root,
            profile,
            gate,
            out,
            json,
        } => commands::compare::run(commands::compare::Args {
            scenarios,
            baseline,
            candidate,
            golden,
            legacy_run_dir,
            legacy_runs_root,
            profile,
            gate,
            out,
            json,
        }),

        Commands::Report {
            comparison,
            gate,
            json,
        } => commands::report::run(comparison, gate, json),

        Commands::ListScenarios { suite, json } => commands::list_scenarios::run(suite, json),

        Commands::PromoteBaseline {
            baseline,
            legacy_run_dir,
            legacy_runs_root,
            goldens_root,
            baseline_id,
            promotion,
            json,
        } => commands::promote_baseline::run(commands::promote_baseline::Args {
            baseline,
            legacy_run_dir,
            legacy_runs_root,
            goldens_root,
            baseline_id,
            promotion,
            json,
        }),

        Commands::MigrateLegacyRuns {
            legacy_runs_root,
            goldens_root,
            baseline_id,
            promotion,
            json,
        } => commands::migrate_legacy_runs::run(
            legacy_runs_root,
            goldens_root,
            baseline_id,
            promotion,
            json,
        ),
    }
}
