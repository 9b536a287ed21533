//! The runner capability: the only seam between capture and an agent host.

use crate::error::RunnerError;
use parity_kernel::{Profile, Scenario, TraceEvent};

/// Per-invocation context handed to a runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub profile: Profile,
    pub run_id: String,
    /// Workspace root the host runs in, when known.
    pub workspace_path: Option<String>,
    /// Model variant under test (matrix runs).
    pub model: Option<String>,
}

impl RunContext {
    pub fn new(profile: Profile, run_id: impl Into<String>) -> Self {
        Self {
            profile,
            run_id: run_id.into(),
            workspace_path: None,
            model: None,
        }
    }
}

/// Produces raw trace events for one scenario under one profile.
///
/// Implementations must not swallow failures: an `Err` halts the capture.
pub trait ScenarioRunner {
    fn run_scenario(&self, scenario: &Scenario, ctx: &RunContext) -> Result<Vec<TraceEvent>, RunnerError>;
}

impl<R: ScenarioRunner + ?Sized> ScenarioRunner for &R {
    fn run_scenario(&self, scenario: &Scenario, ctx: &RunContext) -> Result<Vec<TraceEvent>, RunnerError> {
        (**self).run_scenario(scenario, ctx)
    }
}

impl<R: ScenarioRunner + ?Sized> ScenarioRunner for Box<R> {
    fn run_scenario(&self, scenario: &Scenario, ctx: &RunContext) -> Result<Vec<TraceEvent>, RunnerError> {
        (**self).run_scenario(scenario, ctx)
    }
}
