//! EventDispatcher: synchronous fan-out to registered handlers.

use std::sync::Arc;

use super::handler::ImgscanEventHandler;
use super::types::*;

/// Synchronous event dispatcher wrapping a list of handlers.
#[derive(Default, Clone)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn ImgscanEventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn ImgscanEventHandler>) {
        self.handlers.push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// A panicking handler is logged and skipped; later handlers still run.
    fn emit<F: Fn(&dyn ImgscanEventHandler)>(&self, f: F) {
        for (index, handler) in self.handlers.iter().enumerate() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                f(handler.as_ref());
            }));
            if result.is_err() {
                tracing::warn!(handler = index, "event handler panicked");
            }
        }
    }

    // ---- Analysis ----
    pub fn emit_analysis_started(&self, event: &AnalysisStartedEvent) {
        self.emit(|h| h.on_analysis_started(event));
    }

    pub fn emit_inventory_ready(&self, event: &InventoryReadyEvent) {
        self.emit(|h| h.on_inventory_ready(event));
    }

    pub fn emit_stage_skipped(&self, event: &StageSkippedEvent) {
        self.emit(|h| h.on_stage_skipped(event));
    }

    pub fn emit_stage_completed(&self, event: &StageCompletedEvent) {
        self.emit(|h| h.on_stage_completed(event));
    }

    pub fn emit_stage_failed(&self, event: &StageFailedEvent) {
        self.emit(|h| h.on_stage_failed(event));
    }

    pub fn emit_analysis_complete(&self, event: &AnalysisCompleteEvent) {
        self.emit(|h| h.on_analysis_complete(event));
    }

    // ---- Gates ----
    pub fn emit_gate_evaluated(&self, event: &GateEvaluatedEvent) {
        self.emit(|h| h.on_gate_evaluated(event));
    }

    // ---- Store ----
    pub fn emit_image_deleted(&self, event: &ImageDeletedEvent) {
        self.emit(|h| h.on_image_deleted(event));
    }

    pub fn emit_import_complete(&self, event: &ImportCompleteEvent) {
        self.emit(|h| h.on_import_complete(event));
    }

    pub fn emit_context_invalidated(&self, event: &ContextInvalidatedEvent) {
        self.emit(|h| h.on_context_invalidated(event));
    }

    // ---- Errors ----
    pub fn emit_error(&self, event: &ErrorEvent) {
        self.emit(|h| h.on_error(event));
    }
}
