//! `Runtime`: one object owning the store, inventory cache, pipeline, gate
//! engine, context cache and event dispatcher.
//!
//! Every mutating operation invalidates the context cache for the images it
//! touched before returning.

use std::sync::Arc;

use imgscan_core::errors::{GateError, ImportError, PipelineError, StoreError};
use imgscan_core::events::{ContextInvalidatedEvent, ImageDeletedEvent, ImportCompleteEvent};
use imgscan_core::traits::{Cancellable, CancellationToken, ImageStore};
use imgscan_core::types::{GateResult, ImageId, ImageRecord};
use imgscan_core::{EventDispatcher, ImgscanConfig};
use imgscan_storage::export::{export_images, import_documents, parse_documents, to_json};
use imgscan_storage::listing::{analyzer_status_rows, listing_rows};
use imgscan_storage::{
    AnalyzerStatusRow, BackendRegistry, ImageDocument, ImageListingRow, ImageSummary, ImportOutcome,
};
use rayon::prelude::*;

use crate::context::{ImageContext, ImageContextCache};
use crate::gates::{GateEngine, GateRegistry};
use crate::inventory::InventoryCache;
use crate::pipeline::{AnalyzerRegistry, ImageLockGuard, Pipeline, PipelineReport, RunRequest};

pub struct Runtime {
    config: ImgscanConfig,
    store: Arc<dyn ImageStore>,
    inventory: Arc<InventoryCache>,
    pipeline: Pipeline,
    gates: GateEngine,
    contexts: ImageContextCache,
    events: EventDispatcher,
    pool: Option<rayon::ThreadPool>,
}

impl Runtime {
    /// Default backends, built-in stages plus any scripts in
    /// `pipeline.script_dir`, built-in gates plus any scripts in
    /// `gates.script_dir`, no event handlers.
    pub fn open(config: ImgscanConfig) -> Result<Self, PipelineError> {
        let mut analyzers = AnalyzerRegistry::with_builtins();
        if let Some(dir) = &config.pipeline.script_dir {
            let added = analyzers.discover_scripts(dir)?;
            tracing::info!(dir = %dir.display(), added, "script stages discovered");
        }
        let mut gates = GateRegistry::with_builtins();
        if let Some(dir) = &config.gates.script_dir {
            let added = gates.discover_scripts(dir)?;
            tracing::info!(dir = %dir.display(), added, "gate scripts discovered");
        }
        Self::open_with(
            config,
            &BackendRegistry::with_defaults(),
            analyzers,
            gates,
            EventDispatcher::new(),
        )
    }

    /// Resolve the configured backend from `backends`. An unknown backend
    /// name fails here, before any analysis work.
    pub fn open_with(
        config: ImgscanConfig,
        backends: &BackendRegistry,
        analyzers: AnalyzerRegistry,
        gates: GateRegistry,
        events: EventDispatcher,
    ) -> Result<Self, PipelineError> {
        ImgscanConfig::validate(&config)?;
        let store = backends.resolve(&config.store)?;
        let inventory = Arc::new(InventoryCache::new(&config.inventory));

        let pipeline = Pipeline::new(
            Arc::clone(&store),
            analyzers,
            Arc::clone(&inventory),
            config.pipeline.clone(),
        )
        .with_events(events.clone());
        let gates = GateEngine::new(Arc::clone(&store), gates, config.gates.clone())
            .with_events(events.clone());
        let contexts = ImageContextCache::new(config.context.effective_max_capacity());

        let pool = match config.pipeline.effective_parallelism() {
            0 => None,
            threads => match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
                Ok(pool) => Some(pool),
                Err(e) => {
                    tracing::warn!(threads, error = %e, "falling back to the global rayon pool");
                    None
                }
            },
        };

        tracing::info!(
            backend = store.backend_name(),
            stages = pipeline.registry().len(),
            gates = gates.registry().len(),
            "runtime opened"
        );
        Ok(Self {
            config,
            store,
            inventory,
            pipeline,
            gates,
            contexts,
            events,
            pool,
        })
    }

    pub fn config(&self) -> &ImgscanConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ImageStore> {
        &self.store
    }

    pub fn inventory(&self) -> &InventoryCache {
        &self.inventory
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn gate_engine(&self) -> &GateEngine {
        &self.gates
    }

    pub fn contexts(&self) -> &ImageContextCache {
        &self.contexts
    }

    fn invalidate(&self, id: &ImageId) {
        self.contexts.invalidate(id);
        self.events.emit_context_invalidated(&ContextInvalidatedEvent {
            image_id: Some(id.clone()),
        });
    }

    fn invalidate_all(&self) {
        self.contexts.invalidate_all();
        self.events
            .emit_context_invalidated(&ContextInvalidatedEvent { image_id: None });
    }

    // ---- Analysis ----

    pub fn analyze(
        &self,
        request: &RunRequest,
        cancel: &dyn Cancellable,
    ) -> Result<PipelineReport, PipelineError> {
        let result = self.pipeline.run_all(request, cancel);
        // Stages may have committed before a fatal error.
        self.invalidate(&request.image_id);
        result
    }

    /// Analyze several images in parallel. Requests for the same image
    /// serialize on its run lock. Results keep the order of `requests`.
    pub fn analyze_many(
        &self,
        requests: &[RunRequest],
        cancel: &CancellationToken,
    ) -> Vec<Result<PipelineReport, PipelineError>> {
        let run = || -> Vec<Result<PipelineReport, PipelineError>> {
            requests
                .par_iter()
                .map(|request| self.analyze(request, cancel))
                .collect()
        };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }

    // ---- Image records ----

    pub fn save_image(&self, record: &ImageRecord) -> Result<(), StoreError> {
        self.store.save_image(record)?;
        self.invalidate(&record.image_id);
        Ok(())
    }

    pub fn update_tags(&self, id: &ImageId, current: &[String], all: &[String]) -> Result<(), StoreError> {
        self.store.update_tags(id, current, all)?;
        self.invalidate(id);
        Ok(())
    }

    pub fn update_family_tree(&self, id: &ImageId, tree: &[String]) -> Result<(), StoreError> {
        self.store.update_family_tree(id, tree)?;
        self.invalidate(id);
        Ok(())
    }

    /// Wait for the image's run lock without a way to cancel.
    fn lock_image(&self, id: &ImageId) -> Result<ImageLockGuard<'_>, PipelineError> {
        let never = CancellationToken::new();
        self.pipeline
            .locks()
            .acquire(id, self.pipeline.lock_timeout(), &never)
    }

    /// Remove the image, its stored records and its inventory cache.
    /// Waits for any run on the same image to finish first.
    pub fn delete_image(&self, id: &ImageId) -> Result<bool, PipelineError> {
        let _guard = self.lock_image(id)?;

        let result = self.store.delete_image(id);
        self.invalidate(id);
        let deleted = result?;
        self.inventory.purge(id)?;
        if deleted {
            tracing::info!(image_id = %id, "image deleted");
            self.events
                .emit_image_deleted(&ImageDeletedEvent { image_id: id.clone() });
        }
        Ok(deleted)
    }

    // ---- Gates ----

    // Gate evaluation holds the image's run lock so a result is never written
    // against facts a concurrent run or delete is replacing.

    pub fn evaluate_gate(&self, id: &ImageId, gate: &str, params: &str) -> Result<GateResult, PipelineError> {
        let _guard = self.lock_image(id)?;
        let result = self.gates.evaluate(id, gate, params)?;
        self.invalidate(id);
        Ok(result)
    }

    pub fn evaluate_all_gates(
        &self,
        id: &ImageId,
    ) -> Result<Vec<(String, Result<GateResult, GateError>)>, PipelineError> {
        let _guard = self.lock_image(id)?;
        let results = self.gates.evaluate_all(id)?;
        self.invalidate(id);
        Ok(results)
    }

    // ---- Export / import ----

    pub fn export(&self, ids: &[ImageId]) -> Result<Vec<ImageDocument>, StoreError> {
        export_images(self.store.as_ref(), ids)
    }

    pub fn export_json(&self, ids: &[ImageId]) -> Result<String, ImportError> {
        to_json(&self.export(ids)?)
    }

    pub fn import(&self, documents: &[ImageDocument], force: bool) -> Vec<ImportOutcome> {
        let outcomes = import_documents(self.store.as_ref(), documents, force);
        self.invalidate_all();

        let imported = outcomes.iter().filter(|o| o.is_imported()).count();
        let skipped = outcomes
            .iter()
            .filter(|o| matches!(o, ImportOutcome::Skipped { .. }))
            .count();
        self.events.emit_import_complete(&ImportCompleteEvent {
            imported,
            skipped,
            failed: outcomes.len() - imported - skipped,
        });
        outcomes
    }

    pub fn import_json(&self, json: &str, force: bool) -> Result<Vec<ImportOutcome>, ImportError> {
        let documents = parse_documents(json)?;
        Ok(self.import(&documents, force))
    }

    // ---- Queries ----

    pub fn image_context(&self, id: &ImageId) -> Result<Option<Arc<ImageContext>>, StoreError> {
        self.contexts.get_or_load(self.store.as_ref(), id)
    }

    pub fn summary(&self, id: &ImageId) -> Result<Option<ImageSummary>, StoreError> {
        ImageSummary::load(self.store.as_ref(), id)
    }

    pub fn listing(&self, full_ids: bool) -> Result<Vec<ImageListingRow>, StoreError> {
        listing_rows(self.store.as_ref(), full_ids)
    }

    pub fn analyzer_status_rows(&self, id: &ImageId) -> Result<Vec<AnalyzerStatusRow>, StoreError> {
        analyzer_status_rows(self.store.as_ref(), id)
    }
}
