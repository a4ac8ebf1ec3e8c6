//! # imgscan-analysis
//!
//! Everything that runs against an unpacked image root: the file inventory
//! cache, the analyzer pipeline, the gate engine, the in-memory image context
//! cache and the `Runtime` facade tying them to a store.

pub mod context;
pub mod gates;
pub mod inventory;
pub mod pipeline;
pub mod runtime;

pub use context::{ImageContext, ImageContextCache};
pub use gates::{FactView, Gate, GateEngine, GateRegistry, Trigger, TriggerParams};
pub use inventory::{FileInventory, FileInventoryEntry, InventoryCache};
pub use pipeline::{
    Analyzer, AnalyzerRegistry, Pipeline, PipelineReport, RunOutcome, RunRequest, StageContext,
};
pub use runtime::Runtime;

/// Current unix time in seconds.
pub(crate) fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
