//! Top-level imgscan configuration with 4-layer resolution.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{ContextConfig, GateConfig, InventoryConfig, PipelineConfig, StoreConfig};
use crate::errors::ConfigError;

/// Name of the project-level config file.
pub const PROJECT_CONFIG_FILE: &str = "imgscan.toml";

/// Top-level configuration aggregating all sub-configs.
///
/// Resolution order (highest priority first):
/// 1. CLI flags (applied via `apply_cli_overrides`)
/// 2. Environment variables (`IMGSCAN_*`)
/// 3. Project config (`imgscan.toml` in the project root)
/// 4. User config (`~/.imgscan/config.toml`)
/// 5. Compiled defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ImgscanConfig {
    pub store: StoreConfig,
    pub inventory: InventoryConfig,
    pub pipeline: PipelineConfig,
    pub gates: GateConfig,
    pub context: ContextConfig,
}

/// CLI override arguments that can be applied to a config.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub store_backend: Option<String>,
    pub store_path: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub lock_timeout_ms: Option<u64>,
    pub disabled_stages: Vec<String>,
}

impl ImgscanConfig {
    /// Load configuration with 4-layer resolution rooted at `root`.
    pub fn load(root: &Path, cli_overrides: Option<&CliOverrides>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Layer 4: user config
        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                match Self::merge_toml_file(&mut config, &user_config_path) {
                    Ok(()) => {}
                    Err(e @ ConfigError::ParseError { .. }) => return Err(e),
                    Err(e) => {
                        tracing::warn!(
                            path = %user_config_path.display(),
                            error = %e,
                            "ignoring unreadable user config"
                        );
                    }
                }
            }
        }

        // Layer 3: project config
        let project_config_path = root.join(PROJECT_CONFIG_FILE);
        if project_config_path.exists() {
            Self::merge_toml_file(&mut config, &project_config_path)?;
        }

        // Layer 2: environment
        Self::apply_env_overrides(&mut config);

        // Layer 1: CLI
        if let Some(cli) = cli_overrides {
            Self::apply_cli_overrides(&mut config, cli);
        }

        Self::validate(&config)?;
        tracing::debug!(backend = config.store.effective_backend(), "configuration resolved");
        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })
    }

    pub fn validate(config: &ImgscanConfig) -> Result<(), ConfigError> {
        if config.store.effective_backend().trim().is_empty() {
            return Err(ConfigError::ValidationFailed {
                field: "store.backend".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if let Some(size) = config.store.read_pool_size {
            if size == 0 || size > 64 {
                return Err(ConfigError::ValidationFailed {
                    field: "store.read_pool_size".to_string(),
                    message: "must be between 1 and 64".to_string(),
                });
            }
        }
        if config.pipeline.lock_timeout_ms == Some(0) {
            return Err(ConfigError::ValidationFailed {
                field: "pipeline.lock_timeout_ms".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if config.context.max_capacity == Some(0) {
            return Err(ConfigError::ValidationFailed {
                field: "context.max_capacity".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    /// `~/.imgscan/config.toml`
    fn user_config_path() -> Option<PathBuf> {
        home_dir().map(|h| h.join(".imgscan").join("config.toml"))
    }

    /// Merge a TOML file into the existing config. Unknown keys are ignored.
    fn merge_toml_file(config: &mut ImgscanConfig, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let file_config: ImgscanConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Self::merge(config, &file_config);
        Ok(())
    }

    /// Overlay `other` onto `base` wherever `other` carries a value.
    fn merge(base: &mut ImgscanConfig, other: &ImgscanConfig) {
        // Store
        if other.store.backend.is_some() {
            base.store.backend = other.store.backend.clone();
        }
        if other.store.path.is_some() {
            base.store.path = other.store.path.clone();
        }
        if other.store.read_pool_size.is_some() {
            base.store.read_pool_size = other.store.read_pool_size;
        }

        // Inventory
        if other.inventory.cache_dir.is_some() {
            base.inventory.cache_dir = other.inventory.cache_dir.clone();
        }
        if other.inventory.compute_hashes.is_some() {
            base.inventory.compute_hashes = other.inventory.compute_hashes;
        }
        if other.inventory.threads.is_some() {
            base.inventory.threads = other.inventory.threads;
        }

        // Pipeline
        if !other.pipeline.disabled_stages.is_empty() {
            base.pipeline.disabled_stages = other.pipeline.disabled_stages.clone();
        }
        if other.pipeline.script_dir.is_some() {
            base.pipeline.script_dir = other.pipeline.script_dir.clone();
        }
        if other.pipeline.lock_timeout_ms.is_some() {
            base.pipeline.lock_timeout_ms = other.pipeline.lock_timeout_ms;
        }
        if other.pipeline.parallelism.is_some() {
            base.pipeline.parallelism = other.pipeline.parallelism;
        }
        for (stage, params) in &other.pipeline.params {
            base.pipeline
                .params
                .entry(stage.clone())
                .or_default()
                .extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        // Gates
        if !other.gates.enabled_gates.is_empty() {
            base.gates.enabled_gates = other.gates.enabled_gates.clone();
        }
        for (gate, params) in &other.gates.params {
            base.gates.params.insert(gate.clone(), params.clone());
        }
        if other.gates.script_dir.is_some() {
            base.gates.script_dir = other.gates.script_dir.clone();
        }

        // Context
        if other.context.max_capacity.is_some() {
            base.context.max_capacity = other.context.max_capacity;
        }
    }

    /// Pattern: `IMGSCAN_STORE_BACKEND`, `IMGSCAN_PIPELINE_LOCK_TIMEOUT_MS`, etc.
    fn apply_env_overrides(config: &mut ImgscanConfig) {
        if let Ok(val) = std::env::var("IMGSCAN_STORE_BACKEND") {
            config.store.backend = Some(val);
        }
        if let Ok(val) = std::env::var("IMGSCAN_STORE_PATH") {
            config.store.path = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("IMGSCAN_STORE_READ_POOL_SIZE") {
            if let Ok(v) = val.parse::<usize>() {
                config.store.read_pool_size = Some(v);
            }
        }
        if let Ok(val) = std::env::var("IMGSCAN_INVENTORY_CACHE_DIR") {
            config.inventory.cache_dir = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("IMGSCAN_INVENTORY_COMPUTE_HASHES") {
            if let Ok(v) = val.parse::<bool>() {
                config.inventory.compute_hashes = Some(v);
            }
        }
        if let Ok(val) = std::env::var("IMGSCAN_PIPELINE_SCRIPT_DIR") {
            config.pipeline.script_dir = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("IMGSCAN_GATES_SCRIPT_DIR") {
            config.gates.script_dir = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("IMGSCAN_PIPELINE_LOCK_TIMEOUT_MS") {
            if let Ok(v) = val.parse::<u64>() {
                config.pipeline.lock_timeout_ms = Some(v);
            }
        }
        if let Ok(val) = std::env::var("IMGSCAN_CONTEXT_MAX_CAPACITY") {
            if let Ok(v) = val.parse::<u64>() {
                config.context.max_capacity = Some(v);
            }
        }
    }

    fn apply_cli_overrides(config: &mut ImgscanConfig, cli: &CliOverrides) {
        if let Some(ref v) = cli.store_backend {
            config.store.backend = Some(v.clone());
        }
        if let Some(ref v) = cli.store_path {
            config.store.path = Some(v.clone());
        }
        if let Some(ref v) = cli.cache_dir {
            config.inventory.cache_dir = Some(v.clone());
        }
        if let Some(v) = cli.lock_timeout_ms {
            config.pipeline.lock_timeout_ms = Some(v);
        }
        if !cli.disabled_stages.is_empty() {
            config.pipeline.disabled_stages = cli.disabled_stages.clone();
        }
    }

    /// Serialize the config back to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            path: "<serialization>".to_string(),
            message: e.to_string(),
        })
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
