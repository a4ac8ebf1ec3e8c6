//! `ImgscanEventHandler` trait, all methods no-op by default.

use super::types::*;

/// Observer of pipeline, gate and store lifecycle events.
///
/// Handlers override only what they need. `Send + Sync` because events are
/// emitted from rayon workers during multi-image analysis.
pub trait ImgscanEventHandler: Send + Sync {
    // ---- Analysis ----
    fn on_analysis_started(&self, _event: &AnalysisStartedEvent) {}
    fn on_inventory_ready(&self, _event: &InventoryReadyEvent) {}
    fn on_stage_skipped(&self, _event: &StageSkippedEvent) {}
    fn on_stage_completed(&self, _event: &StageCompletedEvent) {}
    fn on_stage_failed(&self, _event: &StageFailedEvent) {}
    fn on_analysis_complete(&self, _event: &AnalysisCompleteEvent) {}

    // ---- Gates ----
    fn on_gate_evaluated(&self, _event: &GateEvaluatedEvent) {}

    // ---- Store ----
    fn on_image_deleted(&self, _event: &ImageDeletedEvent) {}
    fn on_import_complete(&self, _event: &ImportCompleteEvent) {}
    fn on_context_invalidated(&self, _event: &ContextInvalidatedEvent) {}

    // ---- Errors ----
    fn on_error(&self, _event: &ErrorEvent) {}
}
