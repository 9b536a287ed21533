use parity_kernel::StableJsonError;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("I/O error at {path}: {message}")]
    Io { path: String, message: String },

    #[error("failed to parse comparison {path}: {message}")]
    Parse { path: String, message: String },

    #[error(transparent)]
    Write(#[from] StableJsonError),
}

impl ReportError {
    pub(crate) fn io(path: &Path, err: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}
