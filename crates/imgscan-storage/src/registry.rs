//! Name → constructor table for store backends.

use std::collections::BTreeMap;
use std::sync::Arc;

use imgscan_core::config::StoreConfig;
use imgscan_core::errors::StoreError;
use imgscan_core::ImageStore;

use crate::memory::MemoryImageStore;
use crate::sqlite::SqliteImageStore;

/// Builds a backend from the store section of the config.
pub type BackendConstructor = fn(&StoreConfig) -> Result<Arc<dyn ImageStore>, StoreError>;

/// Explicit registry of store backends, resolved once at startup.
#[derive(Clone)]
pub struct BackendRegistry {
    constructors: BTreeMap<String, BackendConstructor>,
}

impl BackendRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// `sqlite` and `memory`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("sqlite", open_sqlite);
        registry.register("memory", open_memory);
        registry
    }

    /// Register or replace a backend.
    pub fn register(&mut self, name: &str, constructor: BackendConstructor) {
        self.constructors.insert(name.to_string(), constructor);
    }

    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Construct the backend named by `config.backend`.
    pub fn resolve(&self, config: &StoreConfig) -> Result<Arc<dyn ImageStore>, StoreError> {
        let name = config.effective_backend();
        let constructor =
            self.constructors
                .get(name)
                .ok_or_else(|| StoreError::BackendNotFound {
                    name: name.to_string(),
                    available: self.names().join(", "),
                })?;
        let store = constructor(config)?;
        tracing::info!(backend = name, "store backend resolved");
        Ok(store)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn open_sqlite(config: &StoreConfig) -> Result<Arc<dyn ImageStore>, StoreError> {
    Ok(Arc::new(SqliteImageStore::from_config(config)?))
}

fn open_memory(_config: &StoreConfig) -> Result<Arc<dyn ImageStore>, StoreError> {
    Ok(Arc::new(MemoryImageStore::new()))
}
