//! Trace capture for replay parity runs.
//!
//! A [`ScenarioRunner`] turns one scenario into raw trace events. The
//! [`Orchestrator`] drives a runner over a suite for each profile, normalizes
//! the output, and writes the run directory.

pub mod adapter;
pub mod determinism;
pub mod error;
pub mod identity;
pub mod orchestrator;
pub mod runner;
pub mod synthetic;

pub use adapter::CommandAdapterRunner;
pub use determinism::{DeterminismConfig, DeterminismSnapshot};
pub use error::{CaptureError, RunnerError};
pub use identity::compute_run_id;
pub use orchestrator::{
    CaptureOptions, CaptureRun, MANIFEST_FILE, Orchestrator, ProfileCapture, RawEventEnvelope,
    RunManifest, create_run_dir,
};
pub use runner::{RunContext, ScenarioRunner};
pub use synthetic::SyntheticRunner;
