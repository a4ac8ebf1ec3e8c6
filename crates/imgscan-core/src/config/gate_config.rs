//! Gate evaluation configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Gates run by `evaluate_all`. Empty means every registered gate.
    pub enabled_gates: Vec<String>,
    /// Default parameter text per gate, in `KEY=value KEY2=a,b` form.
    pub params: BTreeMap<String, String>,
    /// Directory scanned for executable gates.
    pub script_dir: Option<PathBuf>,
}

impl GateConfig {
    pub fn is_gate_enabled(&self, gate: &str) -> bool {
        self.enabled_gates.is_empty() || self.enabled_gates.iter().any(|g| g == gate)
    }

    pub fn gate_params(&self, gate: &str) -> &str {
        self.params.get(gate).map(String::as_str).unwrap_or("")
    }
}
