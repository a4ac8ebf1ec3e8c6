//! Gate evaluation errors.

use super::error_code::{self, ImgscanErrorCode};
use super::StoreError;

/// Errors that can occur during gate evaluation. None of them leave a
/// partial gate result behind.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Gate {name:?} is not registered")]
    GateNotFound { name: String },

    #[error("Image {image_id} has no fact records")]
    ImageNotAnalyzed { image_id: String },

    #[error("Invalid parameter for {gate}/{trigger}: {message}")]
    InvalidParameter {
        gate: String,
        trigger: String,
        message: String,
    },

    /// An executable gate could not be run, exited non-zero, or printed
    /// output that is not `TRIGGER detail`.
    #[error("Gate script {gate} failed: {message}")]
    ScriptFailed { gate: String, message: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ImgscanErrorCode for GateError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::GateNotFound { .. } => error_code::GATE_NOT_FOUND,
            Self::ImageNotAnalyzed { .. } => error_code::IMAGE_NOT_ANALYZED,
            Self::InvalidParameter { .. } => error_code::INVALID_PARAMETER,
            Self::ScriptFailed { .. } => error_code::GATE_SCRIPT_FAILED,
            Self::Store(e) => e.error_code(),
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_retryable())
    }
}
