use crate::cli::PromotionArgs;
use crate::support::{exit_with, print_json_or_exit, promotion_flags, read_artifacts_or_exit};
use parity_kernel::Profile;
use parity_store::{PromotionReport, ResolveRequest, promote_baseline, resolve_artifact};
use serde_json::json;
use std::path::PathBuf;
use std::process;

pub struct Args {
    pub baseline: Option<PathBuf>,
    pub legacy_run_dir: Option<PathBuf>,
    pub legacy_runs_root: Option<PathBuf>,
    pub goldens_root: PathBuf,
    pub baseline_id: String,
    pub promotion: PromotionArgs,
    pub json: bool,
}

pub fn print_promotion(report: &PromotionReport) {
    println!("  Baseline ID: {}", report.baseline_id);
    println!("  Target: {}", report.location.baseline_path.display());
    println!(
        "  Existing baseline: {}",
        if report.existing_baseline { "yes" } else { "no" }
    );
    println!(
        "  Diff: {} added, {} removed, {} changed, {} unchanged",
        report.diff.added.len(),
        report.diff.removed.len(),
        report.diff.changed.len(),
        report.diff.unchanged.len()
    );
    for id in &report.diff.added {
        println!("    + {id}");
    }
    for id in &report.diff.removed {
        println!("    - {id}");
    }
    for id in &report.diff.changed {
        println!("    ~ {id}");
    }
    match &report.guard_reason {
        None => println!("  Applied: yes"),
        Some(reason) => println!("  Applied: no ({reason})"),
    }
}

pub fn run(args: Args) {
    let request = ResolveRequest {
        explicit: args.baseline.as_deref(),
        legacy_run_dir: args.legacy_run_dir.as_deref(),
        legacy_runs_root: args.legacy_runs_root.as_deref(),
        ..ResolveRequest::default()
    };
    let source = resolve_artifact(Profile::Baseline, &request)
        .unwrap_or_else(|e| exit_with(e))
        .unwrap_or_else(|| {
            exit_with("no baseline artifact found; pass --baseline, --legacy-run-dir, or --legacy-runs-root")
        });
    let artifact = read_artifacts_or_exit(&source.path);
    let report = promote_baseline(
        &args.goldens_root,
        &args.baseline_id,
        &artifact,
        promotion_flags(args.promotion),
    )
    .unwrap_or_else(|e| exit_with(e));

    if args.json {
        print_json_or_exit(&json!({
            "source": source,
            "promotion": report,
        }));
    } else {
        println!("parity promote-baseline");
        println!("  Source: {}", source.path.display());
        print_promotion(&report);
    }

    if args.promotion.apply && !report.applied() {
        process::exit(1);
    }
}
