//! Human-readable and canonical report output for replay parity runs.

pub mod error;
pub mod markdown;
pub mod writer;

pub use error::ReportError;
pub use markdown::{render_comparison_markdown, render_gate_markdown};
pub use writer::{
    COMPARISON_FILE, GATE_SUMMARY_JSON_FILE, GATE_SUMMARY_MD_FILE, GateSummaryPaths, REPORT_FILE,
    RunReportPaths, append_step_summary, github_step_summary_path, read_comparison,
    write_gate_summary, write_run_reports,
};
