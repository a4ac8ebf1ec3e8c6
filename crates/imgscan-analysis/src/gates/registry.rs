//! Gates by name.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use imgscan_core::errors::ConfigError;

use super::builtin;
use super::script;
use super::trigger::Gate;

#[derive(Debug, Default, Clone)]
pub struct GateRegistry {
    gates: BTreeMap<String, Arc<Gate>>,
}

impl GateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `SUIDCHECK`, `GEMCHECK` and `DISTROCHECK`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(builtin::suid_check());
        registry.register(builtin::gem_check());
        registry.register(builtin::distro_check());
        registry
    }

    /// Add a gate, returning the one it replaced.
    pub fn register(&mut self, gate: Gate) -> Option<Arc<Gate>> {
        self.gates.insert(gate.name().to_string(), Arc::new(gate))
    }

    /// Register every executable gate script in `dir`. A script named like
    /// an already registered gate replaces it. Returns the number of gates
    /// added.
    pub fn discover_scripts(&mut self, dir: &Path) -> Result<usize, ConfigError> {
        let gates = script::discover(dir)?;
        let added = gates.len();
        for gate in gates {
            let name = gate.name().to_string();
            let triggers = gate.triggers().count();
            if self.register(gate).is_some() {
                tracing::warn!(gate = %name, "gate script replaces a registered gate");
            }
            tracing::debug!(gate = %name, triggers, "discovered gate script");
        }
        Ok(added)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Gate>> {
        self.gates.get(name)
    }

    /// Sorted gate names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.gates.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }
}
