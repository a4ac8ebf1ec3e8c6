//! Data model for imgscan: identifiers, image records, fact sets,
//! analyzer status and gate results.

pub mod analyzer;
pub mod collections;
pub mod facts;
pub mod gate;
pub mod identifiers;
pub mod image;

pub use analyzer::{AnalyzerStatus, StageStatus};
pub use collections::{FxHashMap, FxHashSet};
pub use facts::{FactMap, FactSet};
pub use gate::{Finding, GateResult};
pub use identifiers::ImageId;
pub use image::{Distro, ImageRecord, Manifest};
