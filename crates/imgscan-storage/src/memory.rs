//! In-process `ImageStore` backed by a hash map behind an `RwLock`.
//!
//! Every operation takes the lock once, so multi-part writes such as
//! `commit_stage` and `delete_image` are atomic with respect to readers.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use imgscan_core::errors::StoreError;
use imgscan_core::types::{
    AnalyzerStatus, FactMap, FactSet, FxHashMap, GateResult, ImageId, ImageRecord,
};
use imgscan_core::{ImageState, ImageStore};

#[derive(Debug, Clone)]
struct ImageEntry {
    record: ImageRecord,
    facts: FactMap,
    statuses: BTreeMap<String, AnalyzerStatus>,
    gates: BTreeMap<String, GateResult>,
}

impl ImageEntry {
    fn placeholder(id: &ImageId) -> Self {
        Self {
            record: ImageRecord::new(id.clone()),
            facts: FactMap::new(),
            statuses: BTreeMap::new(),
            gates: BTreeMap::new(),
        }
    }

    fn replace_category(&mut self, category: &str, set: &FactSet) {
        if set.is_empty() {
            self.facts.remove(category);
        } else {
            self.facts.insert(category.to_string(), set.clone());
        }
    }
}

#[derive(Default)]
pub struct MemoryImageStore {
    images: RwLock<FxHashMap<ImageId, ImageEntry>>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, FxHashMap<ImageId, ImageEntry>>, StoreError> {
        self.images.read().map_err(|_| StoreError::BackendUnavailable {
            message: "memory store lock poisoned".to_string(),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, FxHashMap<ImageId, ImageEntry>>, StoreError> {
        self.images.write().map_err(|_| StoreError::BackendUnavailable {
            message: "memory store lock poisoned".to_string(),
        })
    }

    fn with_entry<T>(
        &self,
        id: &ImageId,
        f: impl FnOnce(&ImageEntry) -> T,
    ) -> Result<Option<T>, StoreError> {
        Ok(self.read()?.get(id).map(f))
    }

    /// Mutate the entry, creating a placeholder first when unknown.
    fn upsert<T>(&self, id: &ImageId, f: impl FnOnce(&mut ImageEntry) -> T) -> Result<T, StoreError> {
        let mut images = self.write()?;
        let entry = images
            .entry(id.clone())
            .or_insert_with(|| ImageEntry::placeholder(id));
        Ok(f(entry))
    }

    /// Mutate an existing entry; `NotFound` otherwise.
    fn update<T>(&self, id: &ImageId, f: impl FnOnce(&mut ImageEntry) -> T) -> Result<T, StoreError> {
        let mut images = self.write()?;
        match images.get_mut(id) {
            Some(entry) => Ok(f(entry)),
            None => Err(StoreError::NotFound {
                image_id: id.to_string(),
            }),
        }
    }
}

impl ImageStore for MemoryImageStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn put_record(
        &self,
        id: &ImageId,
        category: &str,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        self.upsert(id, |entry| {
            entry
                .facts
                .entry(category.to_string())
                .or_default()
                .insert(key.to_string(), value.to_string());
        })
    }

    fn get_record(
        &self,
        id: &ImageId,
        category: &str,
        key: &str,
    ) -> Result<Option<String>, StoreError> {
        Ok(self
            .with_entry(id, |entry| {
                entry
                    .facts
                    .get(category)
                    .and_then(|set| set.get(key))
                    .cloned()
            })?
            .flatten())
    }

    fn replace_category(
        &self,
        id: &ImageId,
        category: &str,
        facts: &FactSet,
    ) -> Result<(), StoreError> {
        self.upsert(id, |entry| entry.replace_category(category, facts))
    }

    fn load_category(&self, id: &ImageId, category: &str) -> Result<Option<FactSet>, StoreError> {
        Ok(self
            .with_entry(id, |entry| entry.facts.get(category).cloned())?
            .flatten())
    }

    fn load_facts(&self, id: &ImageId) -> Result<FactMap, StoreError> {
        Ok(self
            .with_entry(id, |entry| entry.facts.clone())?
            .unwrap_or_default())
    }

    fn list_categories(&self, id: &ImageId) -> Result<Vec<String>, StoreError> {
        Ok(self
            .with_entry(id, |entry| entry.facts.keys().cloned().collect())?
            .unwrap_or_default())
    }

    fn save_image(&self, record: &ImageRecord) -> Result<(), StoreError> {
        self.upsert(&record.image_id, |entry| entry.record = record.clone())
    }

    fn load_image(&self, id: &ImageId) -> Result<Option<ImageRecord>, StoreError> {
        self.with_entry(id, |entry| entry.record.clone())
    }

    fn update_tags(
        &self,
        id: &ImageId,
        current: &[String],
        all: &[String],
    ) -> Result<(), StoreError> {
        self.update(id, |entry| {
            entry.record.current_tags = current.to_vec();
            entry.record.all_tags = all.to_vec();
        })
    }

    fn update_family_tree(&self, id: &ImageId, tree: &[String]) -> Result<(), StoreError> {
        self.update(id, |entry| entry.record.family_tree = tree.to_vec())
    }

    fn list_image_ids(&self) -> Result<Vec<ImageId>, StoreError> {
        let mut ids: Vec<ImageId> = self.read()?.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn delete_image(&self, id: &ImageId) -> Result<bool, StoreError> {
        let removed = self.write()?.remove(id).is_some();
        if removed {
            tracing::info!(image_id = %id, "image deleted");
        }
        Ok(removed)
    }

    fn image_state(&self, id: &ImageId) -> Result<ImageState, StoreError> {
        Ok(if self.read()?.contains_key(id) {
            ImageState::Present
        } else {
            ImageState::Absent
        })
    }

    fn save_analyzer_status(&self, id: &ImageId, status: &AnalyzerStatus) -> Result<(), StoreError> {
        self.upsert(id, |entry| {
            entry.statuses.insert(status.stage.clone(), status.clone());
        })
    }

    fn load_analyzer_statuses(&self, id: &ImageId) -> Result<Vec<AnalyzerStatus>, StoreError> {
        let mut statuses = self
            .with_entry(id, |entry| entry.statuses.values().cloned().collect::<Vec<_>>())?
            .unwrap_or_default();
        statuses.sort_by(|a, b| (a.priority, &a.stage).cmp(&(b.priority, &b.stage)));
        Ok(statuses)
    }

    fn commit_stage(
        &self,
        id: &ImageId,
        outputs: &FactMap,
        status: &AnalyzerStatus,
    ) -> Result<(), StoreError> {
        self.upsert(id, |entry| {
            for (category, set) in outputs {
                entry.replace_category(category, set);
            }
            entry.statuses.insert(status.stage.clone(), status.clone());
        })
    }

    fn save_gate_result(&self, id: &ImageId, result: &GateResult) -> Result<(), StoreError> {
        self.update(id, |entry| {
            entry.gates.insert(result.gate.clone(), result.clone());
        })
    }

    fn load_gate_result(&self, id: &ImageId, gate: &str) -> Result<Option<GateResult>, StoreError> {
        Ok(self
            .with_entry(id, |entry| entry.gates.get(gate).cloned())?
            .flatten())
    }

    fn load_gate_results(&self, id: &ImageId) -> Result<Vec<GateResult>, StoreError> {
        Ok(self
            .with_entry(id, |entry| entry.gates.values().cloned().collect())?
            .unwrap_or_default())
    }
}
