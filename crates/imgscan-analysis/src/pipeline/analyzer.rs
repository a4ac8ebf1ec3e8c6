//! The `Analyzer` trait every stage implements.

use std::collections::BTreeMap;
use std::path::Path;

use imgscan_core::errors::StageError;
use imgscan_core::types::{FactMap, ImageId};

use crate::inventory::FileInventory;

/// Categories a stage produced, keyed by category name.
pub type StageOutput = FactMap;

/// Everything a stage may read during one execution.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub image_id: &'a ImageId,
    /// Unpacked image root on the host.
    pub root: &'a Path,
    pub inventory: &'a FileInventory,
    /// Stored categories of earlier stages this stage declared it depends on.
    pub inputs: &'a FactMap,
    pub params: &'a BTreeMap<String, String>,
    /// Dockerfile contents handed over by the materializer, if any.
    pub dockerfile: Option<&'a str>,
    /// Scratch directory private to this stage and run. Recreated empty
    /// before every execution.
    pub work_dir: &'a Path,
}

/// One analysis stage.
///
/// Stages are independent: they see the inventory, the root and the
/// declared inputs, and return fact sets for their declared output
/// categories. Returning a category that is not declared fails the stage.
pub trait Analyzer: Send + Sync {
    /// Stable name, unique within a registry.
    fn name(&self) -> &str;

    /// Lower runs first; ties are broken by name.
    fn priority(&self) -> u32;

    fn outputs(&self) -> Vec<String>;

    fn depends_on(&self) -> Vec<String> {
        Vec::new()
    }

    /// Bytes identifying this stage's behaviour, fed into the checksum.
    fn definition(&self) -> &[u8];

    fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutput, StageError>;
}
