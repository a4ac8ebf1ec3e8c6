//! Per image × stage execution status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical status of one stage for one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Succeeded,
    Failed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status row kept for each (image, stage) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerStatus {
    pub stage: String,
    pub priority: u32,
    pub status: StageStatus,
    pub result_code: i32,
    /// Checksum of the stage definition and parameters at last run.
    pub checksum: String,
    /// Unix seconds of the last run; 0 when never run.
    pub last_run_at: i64,
}

impl AnalyzerStatus {
    /// Whether a re-analysis with `checksum` may skip this stage.
    pub fn is_skip_eligible(&self, checksum: &str) -> bool {
        self.status == StageStatus::Succeeded && self.checksum == checksum
    }
}
