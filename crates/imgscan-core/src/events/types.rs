//! Event payload types.

use crate::types::ImageId;

/// Payload for `on_analysis_started`.
#[derive(Debug, Clone)]
pub struct AnalysisStartedEvent {
    pub image_id: ImageId,
    pub stage_count: usize,
    pub force: bool,
}

/// Payload for `on_inventory_ready`.
#[derive(Debug, Clone)]
pub struct InventoryReadyEvent {
    pub image_id: ImageId,
    pub entries: usize,
    /// True when a cached inventory was reused instead of walking the root.
    pub reused: bool,
    pub duration_ms: u64,
}

/// Payload for `on_stage_skipped`.
#[derive(Debug, Clone)]
pub struct StageSkippedEvent {
    pub image_id: ImageId,
    pub stage: String,
}

/// Payload for `on_stage_completed`.
#[derive(Debug, Clone)]
pub struct StageCompletedEvent {
    pub image_id: ImageId,
    pub stage: String,
    pub records: usize,
    pub duration_ms: u64,
}

/// Payload for `on_stage_failed`.
#[derive(Debug, Clone)]
pub struct StageFailedEvent {
    pub image_id: ImageId,
    pub stage: String,
    pub result_code: i32,
    pub message: String,
}

/// Payload for `on_analysis_complete`.
#[derive(Debug, Clone)]
pub struct AnalysisCompleteEvent {
    pub image_id: ImageId,
    pub executed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub duration_ms: u64,
}

/// Payload for `on_gate_evaluated`.
#[derive(Debug, Clone)]
pub struct GateEvaluatedEvent {
    pub image_id: ImageId,
    pub gate: String,
    pub findings: usize,
}

/// Payload for `on_image_deleted`.
#[derive(Debug, Clone)]
pub struct ImageDeletedEvent {
    pub image_id: ImageId,
}

/// Payload for `on_import_complete`.
#[derive(Debug, Clone)]
pub struct ImportCompleteEvent {
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Payload for `on_context_invalidated`. `None` means every image.
#[derive(Debug, Clone)]
pub struct ContextInvalidatedEvent {
    pub image_id: Option<ImageId>,
}

/// Payload for `on_error`.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub message: String,
    pub error_code: String,
}
