use parity_kernel::{Profile, StableJsonError};
use std::path::Path;

/// Errors from golden-store and artifact I/O.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {message}")]
    Io { path: String, message: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error(transparent)]
    Write(#[from] StableJsonError),
}

impl StoreError {
    pub(crate) fn io(path: &Path, err: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn parse(path: &Path, message: impl ToString) -> Self {
        Self::Parse {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }
}

/// Promotion failures. Guard refusals are not errors; see `PromotionOutcome`.
#[derive(Debug, thiserror::Error)]
pub enum PromotionError {
    #[error("only baseline artifacts can be promoted (got profile `{profile}`)")]
    NotBaseline { profile: Profile },

    #[error(transparent)]
    Store(#[from] StoreError),
}
