//! Analyzer stage errors. Isolated to one stage; never abort a run.

use super::error_code::{self, ImgscanErrorCode};

/// Errors a single analyzer stage can report.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("Stage {stage} exited with code {code}")]
    Failed { stage: String, code: i32 },

    #[error("Stage {stage} produced invalid output {category}: {message}")]
    InvalidOutput {
        stage: String,
        category: String,
        message: String,
    },

    #[error("Stage {stage} could not be launched: {message}")]
    Launch { stage: String, message: String },

    #[error("Stage {stage} IO error: {source}")]
    Io {
        stage: String,
        source: std::io::Error,
    },
}

impl StageError {
    /// Result code recorded in the analyzer status for this failure.
    pub fn result_code(&self) -> i32 {
        match self {
            Self::Failed { code, .. } => *code,
            Self::InvalidOutput { .. } => 2,
            Self::Launch { .. } => 127,
            Self::Io { .. } => 1,
        }
    }
}

impl ImgscanErrorCode for StageError {
    fn error_code(&self) -> &'static str {
        error_code::STAGE_FAILED
    }
}
