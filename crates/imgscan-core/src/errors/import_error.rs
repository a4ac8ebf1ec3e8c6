//! Export/import errors.

use super::error_code::{self, ImgscanErrorCode};
use super::StoreError;

/// Errors that can occur while importing an image document.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Image {image_id} already exists; use force to overwrite")]
    ImportConflict { image_id: String },

    #[error("Import of {image_id} failed and was rolled back: {source}")]
    RolledBack {
        image_id: String,
        source: StoreError,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Malformed import document: {message}")]
    Serialization { message: String },
}

impl ImgscanErrorCode for ImportError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ImportConflict { .. } => error_code::IMPORT_CONFLICT,
            Self::RolledBack { .. } => error_code::IMPORT_FAILED,
            Self::Store(e) => e.error_code(),
            Self::Serialization { .. } => error_code::SERIALIZATION_ERROR,
        }
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}
