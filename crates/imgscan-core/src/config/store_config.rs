//! Image data store configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which backend to resolve and how to open it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// Registry name of the backend. Default: "sqlite".
    pub backend: Option<String>,
    /// Database path for file-backed stores. `None` opens an in-memory database.
    pub path: Option<PathBuf>,
    /// Read connections kept by the SQLite backend. Default: 4.
    pub read_pool_size: Option<usize>,
}

impl StoreConfig {
    pub fn effective_backend(&self) -> &str {
        self.backend.as_deref().unwrap_or("sqlite")
    }

    pub fn effective_read_pool_size(&self) -> usize {
        self.read_pool_size.unwrap_or(4)
    }
}
