use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Failures of the redaction stage (decode, pixel work, encode)
#[derive(Debug, Error)]
pub enum RedactionError {
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode image: {0}")]
    Encode(String),

    #[error("image dimensions are zero")]
    ZeroDimensions,

    #[error("redaction task did not finish: {0}")]
    Aborted(String),
}

/// Why an item ended in the error state.
///
/// Only this reaches the queue; the underlying error is logged and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureKind {
    /// The detector ran fine but reported no plates
    NotFound,
    /// Detection or redaction failed
    Failed,
}

impl FailureKind {
    /// Short user-facing message
    pub fn message(&self) -> &'static str {
        match self {
            FailureKind::NotFound => "Not found",
            FailureKind::Failed => "Processing failed",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
