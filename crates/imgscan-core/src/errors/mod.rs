//! Error handling for imgscan.
//! One error enum per subsystem, `thiserror` only.

pub mod config_error;
pub mod error_code;
pub mod gate_error;
pub mod identifier_error;
pub mod import_error;
pub mod inventory_error;
pub mod pipeline_error;
pub mod stage_error;
pub mod store_error;

pub use config_error::ConfigError;
pub use error_code::ImgscanErrorCode;
pub use gate_error::GateError;
pub use identifier_error::IdentifierError;
pub use import_error::ImportError;
pub use inventory_error::InventoryError;
pub use pipeline_error::PipelineError;
pub use stage_error::StageError;
pub use store_error::StoreError;
