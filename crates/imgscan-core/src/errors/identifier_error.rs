//! Image identifier validation errors.

use super::error_code::{self, ImgscanErrorCode};

/// Raised when a string is not a valid 64-character hex image id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("invalid image id {input:?}: {reason}")]
    Invalid { input: String, reason: &'static str },
}

impl ImgscanErrorCode for IdentifierError {
    fn error_code(&self) -> &'static str {
        error_code::INVALID_IDENTIFIER
    }
}
