//! Configuration system for imgscan.
//! TOML-based, 4-layer resolution: CLI > env > project > user > defaults.

pub mod context_config;
pub mod gate_config;
pub mod imgscan_config;
pub mod inventory_config;
pub mod pipeline_config;
pub mod store_config;

pub use context_config::ContextConfig;
pub use gate_config::GateConfig;
pub use imgscan_config::{CliOverrides, ImgscanConfig};
pub use inventory_config::InventoryConfig;
pub use pipeline_config::PipelineConfig;
pub use store_config::StoreConfig;
