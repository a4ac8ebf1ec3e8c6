//! File inventory cache configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InventoryConfig {
    /// Directory holding `<image id>/inventory.json`. Default: `.imgscan/inventory`.
    pub cache_dir: Option<PathBuf>,
    /// Hash regular file contents with xxh3. Default: true.
    pub compute_hashes: Option<bool>,
    /// Walker threads; 0 lets the walker decide. Default: 0.
    pub threads: Option<usize>,
}

impl InventoryConfig {
    pub fn effective_cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(".imgscan").join("inventory"))
    }

    pub fn effective_compute_hashes(&self) -> bool {
        self.compute_hashes.unwrap_or(true)
    }

    pub fn effective_threads(&self) -> usize {
        self.threads.unwrap_or(0)
    }
}
