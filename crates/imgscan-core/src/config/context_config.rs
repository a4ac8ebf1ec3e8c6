//! In-memory image context cache configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ContextConfig {
    /// Maximum cached image contexts. Default: 256.
    pub max_capacity: Option<u64>,
}

impl ContextConfig {
    pub fn effective_max_capacity(&self) -> u64 {
        self.max_capacity.unwrap_or(256)
    }
}
