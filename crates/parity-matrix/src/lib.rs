//! Replay matrix execution.
//!
//! A [`MatrixRunContract`] declares six axes (model variant, comparator
//! profile, scenario slice, execution surface, gate mode, normalization
//! profile). [`expand_cells`] takes their Cartesian product; the
//! [`MatrixRunner`] pushes every cell through capture, comparison, and the
//! gate, then scores it:
//!
//! ```text
//! contract ─► cells ─► capture ─► compare ─► gate (+ retry) ─► score ─► report
//! ```
//!
//! A cell is promotable when it is not a deterministic regression, its gate
//! passed, and its drift counts satisfy its risk tier's policy.

pub mod contract;
pub mod error;
pub mod expand;
pub mod report;
pub mod runner;
pub mod score;

pub use contract::{
    ComparatorProfileAxis, DeterminismControls, MATRIX_CONTRACT_SCHEMA_VERSION, MatrixAxes,
    MatrixRunContract, ModelVariant, NormalizationProfile, RiskTierPolicy, ScenarioSlice, TagMatch,
    load_contract, parse_contract, validate_contract,
};
pub use error::MatrixError;
pub use expand::{AXES, MatrixCellDefinition, expand_cells};
pub use report::{
    AxisRollup, AxisValueRollup, MATRIX_REPORT_JSON_FILE, MATRIX_REPORT_MD_FILE, MatrixCellResult,
    MatrixReport, MatrixReportPaths, RiskTierSummary, render_matrix_markdown, write_matrix_report,
};
pub use runner::{MatrixOptions, MatrixRun, MatrixRunner};
pub use score::{CellScore, score_cell};
