//! `Pipeline::run_all`: one analysis run for one image.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use imgscan_core::config::PipelineConfig;
use imgscan_core::errors::{ImgscanErrorCode, PipelineError, StageError};
use imgscan_core::events::{
    AnalysisCompleteEvent, AnalysisStartedEvent, ErrorEvent, InventoryReadyEvent,
    StageCompletedEvent, StageFailedEvent, StageSkippedEvent,
};
use imgscan_core::traits::{Cancellable, ImageStore};
use imgscan_core::types::{
    AnalyzerStatus, FactMap, FactSet, FxHashMap, ImageId, ImageRecord, StageStatus,
};
use imgscan_core::EventDispatcher;

use super::analyzer::{Analyzer, StageContext, StageOutput};
use super::checksum::stage_checksum;
use super::locks::ImageLocks;
use super::registry::AnalyzerRegistry;
use crate::inventory::{FileInventory, InventoryCache};

/// Result code recorded when a stage panics.
pub const PANIC_RESULT_CODE: i32 = 101;

/// What the materializer hands to the pipeline.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub image_id: ImageId,
    pub root: PathBuf,
    pub dockerfile: Option<String>,
    /// The root was unpacked again since the last run; any cached
    /// inventory is stale.
    pub rematerialized: bool,
    /// Run every stage even when its checksum matches.
    pub force: bool,
}

impl RunRequest {
    pub fn new(image_id: ImageId, root: impl Into<PathBuf>) -> Self {
        Self {
            image_id,
            root: root.into(),
            dockerfile: None,
            rematerialized: false,
            force: false,
        }
    }

    pub fn with_dockerfile(mut self, dockerfile: impl Into<String>) -> Self {
        self.dockerfile = Some(dockerfile.into());
        self
    }

    pub fn rematerialized(mut self) -> Self {
        self.rematerialized = true;
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    /// Some stages failed; the rest ran.
    Partial { failed: Vec<String> },
    /// Cancelled between stages. `pending` never started.
    Cancelled { pending: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub image_id: ImageId,
    /// Status of every enabled stage that ran or was skipped, in run order.
    pub statuses: Vec<AnalyzerStatus>,
    pub executed: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
    pub inventory_reused: bool,
    pub outcome: RunOutcome,
    pub duration_ms: u64,
}

impl PipelineReport {
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Success
    }

    pub fn status_of(&self, stage: &str) -> Option<&AnalyzerStatus> {
        self.statuses.iter().find(|s| s.stage == stage)
    }
}

pub struct Pipeline {
    store: Arc<dyn ImageStore>,
    registry: AnalyzerRegistry,
    inventory: Arc<InventoryCache>,
    config: PipelineConfig,
    locks: ImageLocks,
    events: EventDispatcher,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn ImageStore>,
        registry: AnalyzerRegistry,
        inventory: Arc<InventoryCache>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            registry,
            inventory,
            config,
            locks: ImageLocks::new(),
            events: EventDispatcher::new(),
        }
    }

    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    pub fn registry(&self) -> &AnalyzerRegistry {
        &self.registry
    }

    pub fn locks(&self) -> &ImageLocks {
        &self.locks
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.config.effective_lock_timeout_ms())
    }

    /// Registered stages not disabled by configuration, in run order.
    pub fn enabled_stages(&self) -> impl Iterator<Item = &Arc<dyn Analyzer>> {
        self.registry
            .stages()
            .iter()
            .filter(|s| self.config.is_stage_enabled(s.name()))
    }

    /// Run every enabled stage against `request.root`.
    ///
    /// Stage failures are recorded and reported; only lock, inventory and
    /// store errors abort the run.
    pub fn run_all(
        &self,
        request: &RunRequest,
        cancel: &dyn Cancellable,
    ) -> Result<PipelineReport, PipelineError> {
        let start = Instant::now();
        let id = &request.image_id;
        let _guard = self.locks.acquire(id, self.lock_timeout(), cancel)?;

        let ensured = match self.inventory.ensure(id, &request.root, request.rematerialized) {
            Ok(e) => e,
            Err(e) => {
                self.events.emit_error(&ErrorEvent {
                    message: e.to_string(),
                    error_code: e.error_code().to_string(),
                });
                return Err(e.into());
            }
        };
        if !self.store.exists(id)? {
            self.store.save_image(&ImageRecord::new(id.clone()))?;
        }
        self.events.emit_inventory_ready(&InventoryReadyEvent {
            image_id: id.clone(),
            entries: ensured.inventory.len(),
            reused: ensured.reused,
            duration_ms: ensured.duration_ms,
        });

        let stages: Vec<Arc<dyn Analyzer>> = self.enabled_stages().cloned().collect();
        self.events.emit_analysis_started(&AnalysisStartedEvent {
            image_id: id.clone(),
            stage_count: stages.len(),
            force: request.force,
        });

        let prior: FxHashMap<String, AnalyzerStatus> = self
            .store
            .load_analyzer_statuses(id)?
            .into_iter()
            .map(|s| (s.stage.clone(), s))
            .collect();

        let mut report = PipelineReport {
            image_id: id.clone(),
            statuses: Vec::with_capacity(stages.len()),
            executed: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            inventory_reused: ensured.reused,
            outcome: RunOutcome::Success,
            duration_ms: 0,
        };
        let mut pending = Vec::new();

        for (idx, stage) in stages.iter().enumerate() {
            if cancel.is_cancelled() {
                pending = stages[idx..].iter().map(|s| s.name().to_string()).collect();
                tracing::info!(image_id = %id, pending = pending.len(), "analysis cancelled");
                break;
            }

            let name = stage.name();
            let params = self.config.stage_params(name);
            let checksum = stage_checksum(stage.definition(), &params);

            if let Some(previous) = prior.get(name) {
                if !request.force && previous.is_skip_eligible(&checksum) {
                    tracing::debug!(image_id = %id, stage = name, "stage unchanged, skipping");
                    report.skipped.push(name.to_string());
                    report.statuses.push(previous.clone());
                    self.events.emit_stage_skipped(&StageSkippedEvent {
                        image_id: id.clone(),
                        stage: name.to_string(),
                    });
                    continue;
                }
            }

            let mut inputs = FactMap::new();
            for category in stage.depends_on() {
                if let Some(set) = self.store.load_category(id, &category)? {
                    inputs.insert(category, set);
                }
            }

            let stage_start = Instant::now();
            let result =
                self.execute_stage(&**stage, request, &ensured.inventory, &inputs, &params);
            let duration_ms = stage_start.elapsed().as_millis() as u64;

            let mut status = AnalyzerStatus {
                stage: name.to_string(),
                priority: stage.priority(),
                status: StageStatus::Succeeded,
                result_code: 0,
                checksum,
                last_run_at: crate::now_secs(),
            };

            match result {
                Ok(outputs) => {
                    let records: usize = outputs.values().map(FactSet::len).sum();
                    self.store.commit_stage(id, &outputs, &status)?;
                    tracing::info!(image_id = %id, stage = name, records, duration_ms, "stage completed");
                    report.executed.push(name.to_string());
                    self.events.emit_stage_completed(&StageCompletedEvent {
                        image_id: id.clone(),
                        stage: name.to_string(),
                        records,
                        duration_ms,
                    });
                }
                Err(err) => {
                    status.status = StageStatus::Failed;
                    status.result_code = err.result_code();
                    self.store.save_analyzer_status(id, &status)?;
                    tracing::warn!(
                        image_id = %id,
                        stage = name,
                        result_code = status.result_code,
                        error = %err,
                        "stage failed"
                    );
                    report.executed.push(name.to_string());
                    report.failed.push(name.to_string());
                    self.events.emit_stage_failed(&StageFailedEvent {
                        image_id: id.clone(),
                        stage: name.to_string(),
                        result_code: status.result_code,
                        message: err.to_string(),
                    });
                }
            }
            report.statuses.push(status);
        }

        report.outcome = if !pending.is_empty() {
            RunOutcome::Cancelled { pending }
        } else if !report.failed.is_empty() {
            RunOutcome::Partial {
                failed: report.failed.clone(),
            }
        } else {
            RunOutcome::Success
        };
        report.duration_ms = start.elapsed().as_millis() as u64;

        self.events.emit_analysis_complete(&AnalysisCompleteEvent {
            image_id: id.clone(),
            executed: report.executed.len(),
            skipped: report.skipped.len(),
            failed: report.failed.len(),
            cancelled: matches!(report.outcome, RunOutcome::Cancelled { .. }),
            duration_ms: report.duration_ms,
        });
        Ok(report)
    }

    fn execute_stage(
        &self,
        stage: &dyn Analyzer,
        request: &RunRequest,
        inventory: &FileInventory,
        inputs: &FactMap,
        params: &BTreeMap<String, String>,
    ) -> Result<StageOutput, StageError> {
        let work_dir = self.prepare_work_dir(&request.image_id, stage.name())?;
        let ctx = StageContext {
            image_id: &request.image_id,
            root: &request.root,
            inventory,
            inputs,
            params,
            dockerfile: request.dockerfile.as_deref(),
            work_dir: &work_dir,
        };

        let outputs = match panic::catch_unwind(AssertUnwindSafe(|| stage.execute(&ctx))) {
            Ok(result) => result?,
            Err(_) => {
                return Err(StageError::Failed {
                    stage: stage.name().to_string(),
                    code: PANIC_RESULT_CODE,
                })
            }
        };
        validate_outputs(stage, outputs)
    }

    fn prepare_work_dir(&self, id: &ImageId, stage: &str) -> Result<PathBuf, StageError> {
        let dir = stage_work_dir(&self.inventory.image_dir(id), stage);
        let io = |source| StageError::Io {
            stage: stage.to_string(),
            source,
        };
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io(e)),
        }
        std::fs::create_dir_all(&dir).map_err(io)?;
        Ok(dir)
    }
}

fn stage_work_dir(image_dir: &Path, stage: &str) -> PathBuf {
    image_dir.join("stages").join(stage)
}

/// Undeclared categories fail the stage; declared categories the stage did
/// not return are committed empty, which removes stale records.
fn validate_outputs(stage: &dyn Analyzer, mut outputs: StageOutput) -> Result<StageOutput, StageError> {
    let declared = stage.outputs();
    if let Some(extra) = outputs.keys().find(|k| !declared.contains(*k)) {
        return Err(StageError::InvalidOutput {
            stage: stage.name().to_string(),
            category: extra.clone(),
            message: "category not declared by the stage".to_string(),
        });
    }
    for category in declared {
        outputs.entry(category).or_default();
    }
    Ok(outputs)
}
