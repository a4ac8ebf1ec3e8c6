//! In-memory image context cache.
//!
//! Holds a loaded snapshot of each image (record, facts, statuses, gate
//! results) behind an `Arc`. Entries are only ever dropped explicitly; every
//! mutating path in the runtime invalidates the affected image.
//!
//! Invalidation bumps a generation counter. A snapshot loaded while the
//! counter moved is returned to its caller but never cached.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use imgscan_core::constants::CATEGORY_ANALYZER_META;
use imgscan_core::errors::StoreError;
use imgscan_core::traits::ImageStore;
use imgscan_core::types::{AnalyzerStatus, Distro, FactMap, GateResult, ImageId, ImageRecord};
use moka::sync::Cache;

/// Snapshot of everything stored for one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageContext {
    pub record: ImageRecord,
    pub facts: FactMap,
    pub statuses: Vec<AnalyzerStatus>,
    pub gate_results: Vec<GateResult>,
}

impl ImageContext {
    pub fn load(store: &dyn ImageStore, id: &ImageId) -> Result<Option<Self>, StoreError> {
        let Some(record) = store.load_image(id)? else {
            return Ok(None);
        };
        Ok(Some(Self {
            record,
            facts: store.load_facts(id)?,
            statuses: store.load_analyzer_statuses(id)?,
            gate_results: store.load_gate_results(id)?,
        }))
    }

    pub fn distro(&self) -> Distro {
        self.facts
            .get(CATEGORY_ANALYZER_META)
            .map(Distro::from_meta)
            .unwrap_or_else(Distro::unknown)
    }

    pub fn gate_result(&self, gate: &str) -> Option<&GateResult> {
        self.gate_results.iter().find(|r| r.gate == gate)
    }
}

pub struct ImageContextCache {
    cache: Cache<ImageId, Arc<ImageContext>>,
    /// Bumped by every invalidation; held while inserting.
    generation: Mutex<u64>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ImageContextCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(max_capacity).build(),
            generation: Mutex::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn generation(&self) -> MutexGuard<'_, u64> {
        self.generation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached context, loading it from `store` on a miss. Absent images are
    /// not cached.
    pub fn get_or_load(
        &self,
        store: &dyn ImageStore,
        id: &ImageId,
    ) -> Result<Option<Arc<ImageContext>>, StoreError> {
        self.get_or_load_with(id, || ImageContext::load(store, id))
    }

    /// Like [`get_or_load`](Self::get_or_load) with a caller-supplied loader.
    pub fn get_or_load_with(
        &self,
        id: &ImageId,
        load: impl FnOnce() -> Result<Option<ImageContext>, StoreError>,
    ) -> Result<Option<Arc<ImageContext>>, StoreError> {
        if let Some(ctx) = self.cache.get(id) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(ctx));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let started = *self.generation();
        let Some(ctx) = load()? else {
            return Ok(None);
        };
        let ctx = Arc::new(ctx);

        let current = self.generation();
        if *current == started {
            self.cache.insert(id.clone(), Arc::clone(&ctx));
        } else {
            tracing::debug!(image_id = %id, "context invalidated while loading, not cached");
        }
        Ok(Some(ctx))
    }

    pub fn invalidate(&self, id: &ImageId) {
        let mut generation = self.generation();
        *generation += 1;
        self.cache.invalidate(id);
    }

    pub fn invalidate_all(&self) {
        let mut generation = self.generation();
        *generation += 1;
        self.cache.invalidate_all();
    }

    pub fn contains(&self, id: &ImageId) -> bool {
        self.cache.contains_key(id)
    }

    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}
