//! Analyzer pipeline configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    /// Stage names that are neither run nor reported.
    pub disabled_stages: Vec<String>,
    /// Directory scanned for `NN_name` executable stages.
    pub script_dir: Option<PathBuf>,
    /// Upper bound on waiting for another run of the same image. Default: 30000.
    pub lock_timeout_ms: Option<u64>,
    /// Worker threads for multi-image analysis; 0 uses the rayon default.
    pub parallelism: Option<usize>,
    /// Per-stage parameters, e.g. `[pipeline.params.gem_package_list]`.
    pub params: BTreeMap<String, BTreeMap<String, String>>,
}

impl PipelineConfig {
    pub fn effective_lock_timeout_ms(&self) -> u64 {
        self.lock_timeout_ms.unwrap_or(30_000)
    }

    pub fn effective_parallelism(&self) -> usize {
        self.parallelism.unwrap_or(0)
    }

    pub fn is_stage_enabled(&self, stage: &str) -> bool {
        !self.disabled_stages.iter().any(|s| s == stage)
    }

    /// Parameters configured for `stage`; empty when none.
    pub fn stage_params(&self, stage: &str) -> BTreeMap<String, String> {
        self.params.get(stage).cloned().unwrap_or_default()
    }
}
