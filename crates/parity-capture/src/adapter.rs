//! Runner that drives a live host through an external command.
//!
//! The scenario is written as JSON to the child's stdin; the child answers
//! with one `TraceEvent` per stdout line. Lines may also be raw-capture
//! envelopes (`{"event": {...}, ...}`), so a previous `*.raw.jsonl` can be
//! replayed through `cat`.

use crate::error::RunnerError;
use crate::runner::{RunContext, ScenarioRunner};
use parity_kernel::{Scenario, TraceEvent};
use serde_json::Value;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CommandAdapterRunner {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
}

impl CommandAdapterRunner {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: None,
        }
    }

    /// Split a whitespace-separated command line (no shell quoting).
    pub fn from_command_line(command: &str) -> Result<Self, RunnerError> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| RunnerError::InvalidCommand("adapter command is empty".to_string()))?;
        Ok(Self::new(program, parts.collect()))
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl ScenarioRunner for CommandAdapterRunner {
    fn run_scenario(&self, scenario: &Scenario, ctx: &RunContext) -> Result<Vec<TraceEvent>, RunnerError> {
        let input = serde_json::to_vec(scenario).map_err(|e| RunnerError::Encode(e.to_string()))?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env("PARITY_PROFILE", ctx.profile.as_str())
            .env("PARITY_RUN_ID", &ctx.run_id)
            .env("PARITY_SCENARIO_ID", &scenario.scenario_id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(model) = &ctx.model {
            command.env("PARITY_MODEL", model);
        }
        if let Some(workspace) = &ctx.workspace_path {
            command.env("PARITY_WORKSPACE", workspace);
        }
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        debug!(
            program = %self.program,
            scenario = %scenario.scenario_id,
            profile = %ctx.profile,
            "spawning adapter"
        );
        let mut child = command.spawn().map_err(|e| RunnerError::Spawn {
            program: self.program.clone(),
            message: e.to_string(),
        })?;

        let io_error = |message: String| RunnerError::Io {
            program: self.program.clone(),
            message,
        };

        // Stdin is fed from its own thread while stdout and stderr drain.
        let stdin = child.stdin.take();
        let (written, output) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => match stdin.write_all(&input) {
                    // The host may exit without reading the scenario.
                    Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                    other => other,
                },
                None => Ok(()),
            });
            let output = child.wait_with_output();
            (writer.join(), output)
        });

        let output = output.map_err(|e| io_error(e.to_string()))?;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(io_error(e.to_string())),
            Err(_) => return Err(io_error("stdin writer panicked".to_string())),
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(RunnerError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: if stderr.is_empty() {
                    "no stderr output".to_string()
                } else {
                    stderr
                },
            });
        }

        parse_event_lines(&self.program, &String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse JSONL adapter output; blank lines are skipped.
pub fn parse_event_lines(program: &str, stdout: &str) -> Result<Vec<TraceEvent>, RunnerError> {
    let malformed = |line: usize, message: String| RunnerError::MalformedEvent {
        program: program.to_string(),
        line,
        message,
    };

    let mut events = Vec::new();
    for (idx, line) in stdout.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut value: Value = serde_json::from_str(line).map_err(|e| malformed(idx + 1, e.to_string()))?;
        if let Some(inner) = value.get_mut("event").map(Value::take)
            && inner.is_object()
        {
            value = inner;
        }
        let event: TraceEvent = serde_json::from_value(value).map_err(|e| malformed(idx + 1, e.to_string()))?;
        events.push(event);
    }
    Ok(events)
}
