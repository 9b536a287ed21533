use parity_capture::CaptureError;
use parity_kernel::{ProfileError, StableJsonError};
use parity_report::ReportError;

/// Errors raised while loading, validating, or running a matrix contract.
#[derive(Debug, thiserror::Error)]
pub enum MatrixError {
    #[error("failed to read matrix contract {path}: {message}")]
    Read { path: String, message: String },

    #[error("invalid matrix contract: {0}")]
    Contract(String),

    #[error("comparator profile axis `{id}`: {source}")]
    Profile {
        id: String,
        #[source]
        source: ProfileError,
    },

    #[error("matrix drift fingerprint is unstable: {first} != {second}")]
    FingerprintUnstable { first: String, second: String },

    #[error("matrix cell {cell_id}: {source}")]
    Capture {
        cell_id: String,
        #[source]
        source: CaptureError,
    },

    #[error("matrix output directory: {0}")]
    Output(#[source] CaptureError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Write(#[from] StableJsonError),
}

impl MatrixError {
    pub(crate) fn contract(message: impl Into<String>) -> Self {
        Self::Contract(message.into())
    }
}
