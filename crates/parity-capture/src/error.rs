use parity_kernel::{Profile, StableJsonError};

/// Errors produced by a scenario runner.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("failed to start adapter `{program}`: {message}")]
    Spawn { program: String, message: String },

    #[error("adapter `{program}` I/O failed: {message}")]
    Io { program: String, message: String },

    #[error("adapter `{program}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("adapter `{program}` emitted a malformed event on line {line}: {message}")]
    MalformedEvent {
        program: String,
        line: usize,
        message: String,
    },

    #[error("invalid adapter command: {0}")]
    InvalidCommand(String),

    #[error("failed to encode scenario for runner: {0}")]
    Encode(String),
}

/// Errors raised while capturing a profile.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The runner failed; capture halts instead of writing a partial profile.
    #[error("runner failed for scenario {scenario_id} ({profile}): {source}")]
    Runner {
        scenario_id: String,
        profile: Profile,
        #[source]
        source: RunnerError,
    },

    #[error("I/O error at {path}: {message}")]
    Io { path: String, message: String },

    #[error(transparent)]
    Write(#[from] StableJsonError),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CaptureError {
    pub(crate) fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}
