//! ImgscanErrorCode trait for structured error reporting.

/// Every error enum implements this to provide a stable, machine-readable
/// code alongside its human message.
pub trait ImgscanErrorCode {
    /// Returns the error code string (e.g., "STORE_UNAVAILABLE").
    fn error_code(&self) -> &'static str;

    /// Returns the formatted error string: `[ERROR_CODE] message`.
    fn coded_string(&self) -> String
    where
        Self: std::fmt::Display,
    {
        format!("[{}] {}", self.error_code(), self)
    }

    /// Whether the caller may retry the failed operation unchanged.
    fn is_retryable(&self) -> bool {
        false
    }
}

pub const INVALID_IDENTIFIER: &str = "INVALID_IDENTIFIER";
pub const BACKEND_UNAVAILABLE: &str = "BACKEND_UNAVAILABLE";
pub const BACKEND_NOT_FOUND: &str = "BACKEND_NOT_FOUND";
pub const NOT_FOUND: &str = "NOT_FOUND";
pub const IMAGE_CORRUPT: &str = "IMAGE_CORRUPT";
pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
pub const MIGRATION_FAILED: &str = "MIGRATION_FAILED";
pub const SERIALIZATION_ERROR: &str = "SERIALIZATION_ERROR";
pub const WALK_FAILED: &str = "WALK_FAILED";
pub const INVENTORY_ERROR: &str = "INVENTORY_ERROR";
pub const STAGE_FAILED: &str = "STAGE_FAILED";
pub const GATE_NOT_FOUND: &str = "GATE_NOT_FOUND";
pub const IMAGE_NOT_ANALYZED: &str = "IMAGE_NOT_ANALYZED";
pub const INVALID_PARAMETER: &str = "INVALID_PARAMETER";
pub const GATE_SCRIPT_FAILED: &str = "GATE_SCRIPT_FAILED";
pub const IMPORT_CONFLICT: &str = "IMPORT_CONFLICT";
pub const IMPORT_FAILED: &str = "IMPORT_FAILED";
pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
pub const LOCK_TIMEOUT: &str = "LOCK_TIMEOUT";
pub const CANCELLED: &str = "CANCELLED";
pub const DUPLICATE_STAGE: &str = "DUPLICATE_STAGE";
