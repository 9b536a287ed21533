use super::promote_baseline::print_promotion;
use crate::cli::PromotionArgs;
use crate::support::{exit_with, print_json_or_exit, promotion_flags};
use parity_store::migrate_legacy_runs;
use std::path::PathBuf;
use std::process;

pub fn run(
    legacy_runs_root: PathBuf,
    goldens_root: PathBuf,
    baseline_id: String,
    promotion: PromotionArgs,
    json_output: bool,
) {
    let report = migrate_legacy_runs(
        &legacy_runs_root,
        &goldens_root,
        &baseline_id,
        promotion_flags(promotion),
    )
    .unwrap_or_else(|e| exit_with(e));

    if json_output {
        print_json_or_exit(&report);
    } else {
        println!("parity migrate-legacy-runs");
        println!("  Legacy runs root: {}", legacy_runs_root.display());
        println!("  Run directories: {}", report.legacy_runs.len());
        for run in &report.legacy_runs {
            println!(
                "    {}  baseline={}  candidate={}",
                run.dir.display(),
                if run.has_baseline { "yes" } else { "no" },
                if run.has_candidate { "yes" } else { "no" }
            );
        }
        match (&report.selected, &report.promotion) {
            (Some(selected), Some(promotion)) => {
                println!("  Selected: {}", selected.path.display());
                print_promotion(promotion);
            }
            _ => println!("  Selected: none (no run directory holds a baseline artifact)"),
        }
    }

    let applied = report.promotion.as_ref().is_some_and(|p| p.applied());
    if promotion.apply && !applied {
        process::exit(1);
    }
}
