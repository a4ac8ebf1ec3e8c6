//! Analyzer pipeline: ordered stages, change-aware re-execution, per-image
//! run locks.

pub mod analyzer;
pub mod builtin;
pub mod checksum;
pub mod locks;
pub mod registry;
pub mod runner;
pub mod script;

pub use analyzer::{Analyzer, StageContext, StageOutput};
pub use checksum::stage_checksum;
pub use locks::{ImageLockGuard, ImageLocks};
pub use registry::AnalyzerRegistry;
pub use runner::{Pipeline, PipelineReport, RunOutcome, RunRequest};
pub use script::ScriptAnalyzer;
