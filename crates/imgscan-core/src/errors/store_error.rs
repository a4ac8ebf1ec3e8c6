//! Image data store errors.

use super::error_code::{self, ImgscanErrorCode};

/// Errors that can occur in any image store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store backend unavailable: {message}")]
    BackendUnavailable { message: String },

    #[error("No store backend registered under {name:?} (available: {available})")]
    BackendNotFound { name: String, available: String },

    #[error("Image {image_id} not found")]
    NotFound { image_id: String },

    #[error("Image {image_id} is present but corrupt: {details}")]
    Corrupt { image_id: String, details: String },

    #[error("Delete of image {image_id} did not complete: {message}")]
    PartialDelete { image_id: String, message: String },

    #[error("SQLite error: {message}")]
    Sqlite { message: String },

    #[error("Migration failed at version {version}: {message}")]
    MigrationFailed { version: u32, message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl ImgscanErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::BackendUnavailable { .. } => error_code::BACKEND_UNAVAILABLE,
            Self::BackendNotFound { .. } => error_code::BACKEND_NOT_FOUND,
            Self::NotFound { .. } => error_code::NOT_FOUND,
            Self::Corrupt { .. } | Self::PartialDelete { .. } => error_code::IMAGE_CORRUPT,
            Self::MigrationFailed { .. } => error_code::MIGRATION_FAILED,
            Self::Serialization { .. } => error_code::SERIALIZATION_ERROR,
            Self::Sqlite { .. } => error_code::STORAGE_ERROR,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}
