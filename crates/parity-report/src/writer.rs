//! Report files written next to a run's captured artifacts.

use crate::error::ReportError;
use crate::markdown::{render_comparison_markdown, render_gate_markdown};
use parity_kernel::stable_json::{write_stable_json, write_text_atomic};
use parity_kernel::{ComparisonResult, GateEvaluation};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const COMPARISON_FILE: &str = "comparison.json";
pub const REPORT_FILE: &str = "report.md";
pub const GATE_SUMMARY_JSON_FILE: &str = "gate-summary.json";
pub const GATE_SUMMARY_MD_FILE: &str = "gate-summary.md";
pub const GITHUB_STEP_SUMMARY_ENV: &str = "GITHUB_STEP_SUMMARY";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateSummaryPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReportPaths {
    pub comparison: PathBuf,
    pub report: PathBuf,
    pub gate: GateSummaryPaths,
}

/// Write `comparison.json`, `report.md`, and `gate-summary.{json,md}` into `run_dir`.
pub fn write_run_reports(
    run_dir: &Path,
    comparison: &ComparisonResult,
    gate: &GateEvaluation,
) -> Result<RunReportPaths, ReportError> {
    let comparison_path = run_dir.join(COMPARISON_FILE);
    let report_path = run_dir.join(REPORT_FILE);
    write_stable_json(&comparison_path, comparison)?;
    write_text_atomic(&report_path, &render_comparison_markdown(comparison))?;
    let gate_paths = write_gate_summary(&run_dir.join(GATE_SUMMARY_JSON_FILE), gate)?;

    info!(
        run_dir = %run_dir.display(),
        passed = comparison.passed,
        status = gate.status.as_str(),
        "run reports written"
    );
    Ok(RunReportPaths {
        comparison: comparison_path,
        report: report_path,
        gate: gate_paths,
    })
}

/// Write the gate evaluation as JSON at `json_path` and as Markdown beside it
/// (same stem, `.md` extension).
pub fn write_gate_summary(json_path: &Path, gate: &GateEvaluation) -> Result<GateSummaryPaths, ReportError> {
    let markdown_path = json_path.with_extension("md");
    write_stable_json(json_path, gate)?;
    write_text_atomic(&markdown_path, &render_gate_markdown(gate))?;
    debug!(path = %json_path.display(), "gate summary written");
    Ok(GateSummaryPaths {
        json: json_path.to_path_buf(),
        markdown: markdown_path,
    })
}

pub fn read_comparison(path: &Path) -> Result<ComparisonResult, ReportError> {
    let text = fs::read_to_string(path).map_err(|e| ReportError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| ReportError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// The step-summary file named by `GITHUB_STEP_SUMMARY`, when set and non-empty.
pub fn github_step_summary_path() -> Option<PathBuf> {
    std::env::var_os(GITHUB_STEP_SUMMARY_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Append `markdown` to a step-summary file, creating it if needed.
pub fn append_step_summary(path: &Path, markdown: &str) -> Result<(), ReportError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ReportError::io(path, e))?;
    writeln!(file, "{markdown}").map_err(|e| ReportError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parity_kernel::{ComparisonSummary, GateMode, evaluate_replay_gate};
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

    fn comparison() -> ComparisonResult {
        ComparisonResult {
            schema_version: 1,
            profile_id: "default".to_string(),
            baseline_run_id: "run1_a".to_string(),
            candidate_run_id: "run1_b".to_string(),
            passed: true,
            scenarios: Vec::new(),
            summary: ComparisonSummary::default(),
        }
    }

    #[test]
    fn run_reports_land_in_run_dir() {
        let tmp = TempDirGuard::new("parity-report-run");
        let comparison = comparison();
        let gate = evaluate_replay_gate(&comparison, GateMode::Strict);

        let paths = write_run_reports(tmp.path(), &comparison, &gate).expect("reports written");
        assert_eq!(paths.comparison, tmp.path().join("comparison.json"));
        assert_eq!(paths.gate.markdown, tmp.path().join("gate-summary.md"));
        assert!(paths.report.is_file());

        let reread = read_comparison(&paths.comparison).expect("comparison parses");
        assert_eq!(reread, comparison);
        let gate_md = fs::read_to_string(&paths.gate.markdown).expect("gate markdown");
        assert!(gate_md.starts_with("## Replay Gate: PASS"));
        let raw = fs::read_to_string(&paths.comparison).expect("comparison json");
        assert!(raw.ends_with("}\n"));
    }

    #[test]
    fn step_summary_appends() {
        let tmp = TempDirGuard::new("parity-report-summary");
        let path = tmp.path().join("summary.md");
        append_step_summary(&path, "first").expect("append");
        append_step_summary(&path, "second").expect("append");
        assert_eq!(fs::read_to_string(&path).expect("read"), "first\nsecond\n");
    }

    #[test]
    fn unreadable_comparison_is_an_error() {
        let tmp = TempDirGuard::new("parity-report-bad");
        let path = tmp.path().join("comparison.json");
        fs::write(&path, "{not json").expect("write");
        assert!(matches!(read_comparison(&path), Err(ReportError::Parse { .. })));
    }
}
