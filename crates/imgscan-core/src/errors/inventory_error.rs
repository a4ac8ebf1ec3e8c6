//! File inventory errors.

use std::path::PathBuf;

use super::error_code::{self, ImgscanErrorCode};

/// Errors that can occur while building or loading a file inventory.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Walk of {root} failed at {path}: {message}")]
    WalkFailed {
        root: PathBuf,
        path: PathBuf,
        message: String,
    },

    #[error("IO error on inventory cache {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Inventory cache {path} is unreadable: {message}")]
    Serialization { path: PathBuf, message: String },
}

impl ImgscanErrorCode for InventoryError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::WalkFailed { .. } => error_code::WALK_FAILED,
            _ => error_code::INVENTORY_ERROR,
        }
    }
}
