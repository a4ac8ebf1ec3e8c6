//! The `ImageStore` trait: backend-agnostic persistence for everything
//! recorded about an image.
//!
//! Backends are resolved by name from a registry at startup. Every method
//! takes `&self`; implementations serialize writes internally so the last
//! committed write to a key wins and a reader in the same process always
//! sees its own writes.

use crate::errors::StoreError;
use crate::types::{AnalyzerStatus, FactMap, FactSet, GateResult, ImageId, ImageRecord, Manifest};

/// Visibility of an image in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageState {
    Absent,
    Present,
    /// A delete started but did not finish; the image is still listed.
    Corrupt,
}

pub trait ImageStore: Send + Sync {
    /// Registry name of the backend ("sqlite", "memory", ...).
    fn backend_name(&self) -> &'static str;

    // ---- Fact records ----

    /// Write one fact record, creating a placeholder image when unknown.
    fn put_record(
        &self,
        id: &ImageId,
        category: &str,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError>;

    fn get_record(
        &self,
        id: &ImageId,
        category: &str,
        key: &str,
    ) -> Result<Option<String>, StoreError>;

    /// Overwrite a whole category. An empty set removes it.
    fn replace_category(
        &self,
        id: &ImageId,
        category: &str,
        facts: &FactSet,
    ) -> Result<(), StoreError>;

    fn load_category(&self, id: &ImageId, category: &str) -> Result<Option<FactSet>, StoreError>;

    /// Every category recorded for the image. Empty when there are none.
    fn load_facts(&self, id: &ImageId) -> Result<FactMap, StoreError>;

    fn list_categories(&self, id: &ImageId) -> Result<Vec<String>, StoreError>;

    // ---- Image records ----

    /// Insert or overwrite the image record (manifest, tags, family tree).
    fn save_image(&self, record: &ImageRecord) -> Result<(), StoreError>;

    fn load_image(&self, id: &ImageId) -> Result<Option<ImageRecord>, StoreError>;

    /// Replace the tag lists. `NotFound` when the image is absent.
    fn update_tags(
        &self,
        id: &ImageId,
        current: &[String],
        all: &[String],
    ) -> Result<(), StoreError>;

    /// Replace the family tree. `NotFound` when the image is absent.
    fn update_family_tree(&self, id: &ImageId, tree: &[String]) -> Result<(), StoreError>;

    /// Ids of every visible image (present or corrupt), sorted.
    fn list_image_ids(&self) -> Result<Vec<ImageId>, StoreError>;

    /// Remove the image and everything keyed under it.
    ///
    /// Returns `false` when the image was already absent. On failure the
    /// image stays visible in state [`ImageState::Corrupt`].
    fn delete_image(&self, id: &ImageId) -> Result<bool, StoreError>;

    fn image_state(&self, id: &ImageId) -> Result<ImageState, StoreError>;

    fn exists(&self, id: &ImageId) -> Result<bool, StoreError> {
        Ok(self.image_state(id)? != ImageState::Absent)
    }

    // ---- Analyzer status ----

    fn save_analyzer_status(&self, id: &ImageId, status: &AnalyzerStatus)
        -> Result<(), StoreError>;

    /// Status rows ordered by (priority, stage).
    fn load_analyzer_statuses(&self, id: &ImageId) -> Result<Vec<AnalyzerStatus>, StoreError>;

    /// Replace each category in `outputs` and the stage's status row as one
    /// atomic unit. Empty sets remove their category.
    fn commit_stage(
        &self,
        id: &ImageId,
        outputs: &FactMap,
        status: &AnalyzerStatus,
    ) -> Result<(), StoreError>;

    // ---- Gate results ----

    /// Overwrite the result for (image, gate). Unlike fact writes this never
    /// creates the image: `NotFound` when it is absent.
    fn save_gate_result(&self, id: &ImageId, result: &GateResult) -> Result<(), StoreError>;

    fn load_gate_result(&self, id: &ImageId, gate: &str) -> Result<Option<GateResult>, StoreError>;

    /// All gate results for the image, ordered by gate name.
    fn load_gate_results(&self, id: &ImageId) -> Result<Vec<GateResult>, StoreError>;
}

/// Lazy iterator over `(ImageId, Manifest)` pairs.
///
/// The id list is snapshotted up front; manifests load on demand. Images
/// deleted after the snapshot are skipped. Cloning yields an iterator that
/// resumes from the same position.
#[derive(Clone)]
pub struct ImageIter<'a> {
    store: &'a dyn ImageStore,
    ids: Vec<ImageId>,
    next: usize,
}

impl<'a> ImageIter<'a> {
    /// Start again from the first id of the snapshot.
    pub fn restart(&mut self) {
        self.next = 0;
    }

    pub fn len_hint(&self) -> usize {
        self.ids.len() - self.next
    }
}

impl Iterator for ImageIter<'_> {
    type Item = Result<(ImageId, Manifest), StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.ids.len() {
            let id = &self.ids[self.next];
            self.next += 1;
            match self.store.load_image(id) {
                Ok(Some(record)) => return Some(Ok((record.image_id, record.manifest))),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.len_hint()))
    }
}

/// Snapshot the store's image ids and return a lazy manifest iterator.
pub fn list_images(store: &dyn ImageStore) -> Result<ImageIter<'_>, StoreError> {
    let ids = store.list_image_ids()?;
    Ok(ImageIter {
        store,
        ids,
        next: 0,
    })
}
