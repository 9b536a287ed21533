use clap::{Args, Parser, Subcommand, ValueEnum};
use parity_kernel::{GateMode, Profile};
use std::path::PathBuf;

pub const DEFAULT_OUT_ROOT: &str = ".parity/runs";
pub const DEFAULT_GOLDENS_ROOT: &str = ".parity/goldens";

#[derive(Parser)]
#[command(
    name = "parity",
    about = "Replay parity: capture, compare, and gate agent tool-calling traces",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Scenario suite selection.
#[derive(Args, Debug, Clone)]
pub struct SuiteArgs {
    /// Path to the scenario suite JSON
    #[arg(long)]
    pub scenarios: PathBuf,

    /// Only run this scenario ID (repeatable)
    #[arg(long = "scenario")]
    pub scenario_ids: Vec<String>,

    /// Only run scenarios carrying every given tag (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Shard index (requires --shard-count)
    #[arg(long)]
    pub shard_index: Option<usize>,

    /// Total shard count (requires --shard-index)
    #[arg(long)]
    pub shard_count: Option<usize>,
}

/// Where and how traces are captured.
#[derive(Args, Debug, Clone)]
pub struct CaptureArgs {
    /// Output root for run directories
    #[arg(long, default_value = DEFAULT_OUT_ROOT)]
    pub out: PathBuf,

    /// Run label (part of the run directory name and run IDs)
    #[arg(long, default_value = "local")]
    pub label: String,

    /// Workspace root used for path normalization
    #[arg(long)]
    pub workspace_path: Option<PathBuf>,

    /// Drive a live host through this command instead of the synthetic runner
    #[arg(long)]
    pub adapter_command: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct GateArgs {
    /// Gate mode
    #[arg(long, value_enum, default_value_t = GateModeArg::Strict)]
    pub gate_mode: GateModeArg,

    /// Also write the gate summary JSON here (Markdown beside it)
    #[arg(long)]
    pub gate_output: Option<PathBuf>,

    /// Print GitHub workflow annotation lines
    #[arg(long)]
    pub emit_github_annotations: bool,
}

#[derive(Args, Debug, Clone)]
pub struct GoldenArgs {
    /// Golden baseline store root
    #[arg(long)]
    pub goldens_root: Option<PathBuf>,

    /// Golden baseline ID
    #[arg(long, default_value = "default")]
    pub baseline_id: String,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct PromotionArgs {
    /// Write the golden baseline (dry run otherwise)
    #[arg(long)]
    pub apply: bool,

    /// Approve the write requested by --apply
    #[arg(long)]
    pub approve: bool,

    /// Replace an existing golden baseline
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GateModeArg {
    Strict,
    Warn,
    Info,
}

impl From<GateModeArg> for GateMode {
    fn from(arg: GateModeArg) -> Self {
        match arg {
            GateModeArg::Strict => GateMode::Strict,
            GateModeArg::Warn => GateMode::Warn,
            GateModeArg::Info => GateMode::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProfileArg {
    Baseline,
    Candidate,
}

impl From<ProfileArg> for Profile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Baseline => Profile::Baseline,
            ProfileArg::Candidate => Profile::Candidate,
        }
    }
}

#[derive(Subcommand)]
#[allow(clippy::large_enum_variant)]
pub enum Commands {
    /// Capture baseline and candidate, compare them, and evaluate the gate
    Run {
        #[command(flatten)]
        suite: SuiteArgs,

        #[command(flatten)]
        capture: CaptureArgs,

        #[command(flatten)]
        gate: GateArgs,

        #[command(flatten)]
        golden: GoldenArgs,

        /// Comparator profile (.json or .toml)
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Re-run a blocking comparison once to detect flakes
        #[arg(long)]
        retry_once: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run every cell of a matrix contract
    RunMatrix {
        #[command(flatten)]
        suite: SuiteArgs,

        /// Matrix contract JSON
        #[arg(long)]
        matrix_contract: PathBuf,

        /// Output root for the matrix run directory
        #[arg(long, default_value = DEFAULT_OUT_ROOT)]
        out: PathBuf,

        /// Matrix run label
        #[arg(long, default_value = "matrix")]
        label: String,

        /// Workspace root used for path normalization
        #[arg(long)]
        workspace_path: Option<PathBuf>,

        /// Drive a live host through this command instead of the synthetic runner
        #[arg(long)]
        adapter_command: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Capture a single profile
    Capture {
        #[command(flatten)]
        suite: SuiteArgs,

        #[command(flatten)]
        capture: CaptureArgs,

        /// Profile to capture
        #[arg(long, value_enum)]
        profile: ProfileArg,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare existing baseline and candidate artifacts
    Compare {
        /// Path to the scenario suite JSON
        #[arg(long)]
        scenarios: PathBuf,

        /// Explicit baseline artifact
        #[arg(long)]
        baseline: Option<PathBuf>,

        /// Explicit candidate artifact
        #[arg(long)]
        candidate: Option<PathBuf>,

        #[command(flatten)]
        golden: GoldenArgs,

        /// Legacy run directory holding both artifacts
        #[arg(long)]
        legacy_run_dir: Option<PathBuf>,

        /// Root whose newest run directory supplies missing artifacts
        #[arg(long)]
        legacy_runs_root: Option<PathBuf>,

        /// Comparator profile (.json or .toml)
        #[arg(long)]
        profile: Option<PathBuf>,

        #[command(flatten)]
        gate: GateArgs,

        /// Directory for comparison and gate reports (default: candidate's directory)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-render report.md and the gate summary from a comparison.json
    Report {
        /// Path to comparison.json
        #[arg(long)]
        comparison: PathBuf,

        #[command(flatten)]
        gate: GateArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the scenarios a suite (and its filters) selects
    ListScenarios {
        #[command(flatten)]
        suite: SuiteArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Promote a baseline artifact into the golden store
    PromoteBaseline {
        /// Explicit baseline artifact
        #[arg(long)]
        baseline: Option<PathBuf>,

        /// Run directory holding the baseline artifact
        #[arg(long)]
        legacy_run_dir: Option<PathBuf>,

        /// Root whose newest run directory supplies the baseline
        #[arg(long)]
        legacy_runs_root: Option<PathBuf>,

        /// Golden baseline store root
        #[arg(long, default_value = DEFAULT_GOLDENS_ROOT)]
        goldens_root: PathBuf,

        /// Golden baseline ID
        #[arg(long, default_value = "default")]
        baseline_id: String,

        #[command(flatten)]
        promotion: PromotionArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Promote the newest legacy run's baseline into the golden store
    MigrateLegacyRuns {
        /// Root holding legacy run directories
        #[arg(long)]
        legacy_runs_root: PathBuf,

        /// Golden baseline store root
        #[arg(long, default_value = DEFAULT_GOLDENS_ROOT)]
        goldens_root: PathBuf,

        /// Golden baseline ID
        #[arg(long, default_value = "default")]
        baseline_id: String,

        #[command(flatten)]
        promotion: PromotionArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
