use std::path::PathBuf;

use thiserror::Error;

/// Failure taxonomy surfaced to callers of the censoring pipeline and the
/// job manager.
///
/// Pipeline failures are recorded on the job as their `Display` text.
#[derive(Error, Debug)]
pub enum CensorError {
    #[error("cannot read input video {path}: {reason}")]
    UnreadableInput { path: PathBuf, reason: String },

    #[error("no face found in reference image {path}")]
    NoReferenceFace { path: PathBuf },

    #[error("cannot analyse reference image {path}: {reason}")]
    UnreadableReference { path: PathBuf, reason: String },

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("face analysis failed on frame {frame_index}: {reason}")]
    Detection { frame_index: usize, reason: String },

    #[error("encoding output failed: {0}")]
    EncodeFailure(String),

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("job {id} is {status}, not completed")]
    NotCompleted { id: String, status: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CensorError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameters(message.into())
    }
}
