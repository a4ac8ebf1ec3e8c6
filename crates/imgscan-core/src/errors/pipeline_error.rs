//! Pipeline-fatal errors, also used by runtime operations that take the
//! per-image run lock. Stage failures are not here: they are recorded per
//! stage in the pipeline report.

use std::time::Duration;

use super::error_code::{self, ImgscanErrorCode};
use super::{ConfigError, GateError, InventoryError, StoreError};

/// Errors that abort a pipeline run for one image.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Gate error: {0}")]
    Gate(#[from] GateError),

    #[error("Timed out after {waited:?} waiting for the run lock on {image_id}")]
    LockTimeout { image_id: String, waited: Duration },

    #[error("Pipeline cancelled")]
    Cancelled,

    #[error("Analyzer stage {name:?} is registered twice")]
    DuplicateStage { name: String },
}

impl ImgscanErrorCode for PipelineError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Store(e) => e.error_code(),
            Self::Inventory(e) => e.error_code(),
            Self::Config(e) => e.error_code(),
            Self::Gate(e) => e.error_code(),
            Self::LockTimeout { .. } => error_code::LOCK_TIMEOUT,
            Self::Cancelled => error_code::CANCELLED,
            Self::DuplicateStage { .. } => error_code::DUPLICATE_STAGE,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            Self::Gate(e) => e.is_retryable(),
            Self::LockTimeout { .. } => true,
            _ => false,
        }
    }
}
