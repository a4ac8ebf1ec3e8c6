//! Analyzer registry: stages kept sorted by (priority, name).

use std::path::Path;
use std::sync::Arc;

use imgscan_core::errors::{ConfigError, PipelineError};

use super::analyzer::Analyzer;
use super::builtin::{AnalyzerMeta, FileSuids, GemPackageList};
use super::script::{is_executable, ScriptAnalyzer};

#[derive(Default, Clone)]
pub struct AnalyzerRegistry {
    stages: Vec<Arc<dyn Analyzer>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `analyzer_meta`, `gem_package_list` and `file_suids`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins: [Arc<dyn Analyzer>; 3] = [
            Arc::new(AnalyzerMeta),
            Arc::new(GemPackageList),
            Arc::new(FileSuids),
        ];
        for stage in builtins {
            registry.insert_sorted(stage);
        }
        registry
    }

    pub fn register(&mut self, stage: Arc<dyn Analyzer>) -> Result<(), PipelineError> {
        if self.get(stage.name()).is_some() {
            return Err(PipelineError::DuplicateStage {
                name: stage.name().to_string(),
            });
        }
        self.insert_sorted(stage);
        Ok(())
    }

    fn insert_sorted(&mut self, stage: Arc<dyn Analyzer>) {
        let key = (stage.priority(), stage.name().to_string());
        let pos = self
            .stages
            .partition_point(|s| (s.priority(), s.name()) < (key.0, key.1.as_str()));
        self.stages.insert(pos, stage);
    }

    /// Register every executable `NN_name` file in `dir` as a script stage.
    ///
    /// Files that do not follow the naming scheme are ignored. Returns the
    /// number of stages added.
    pub fn discover_scripts(&mut self, dir: &Path) -> Result<usize, PipelineError> {
        let read_dir = std::fs::read_dir(dir).map_err(|e| ConfigError::ValidationFailed {
            field: "pipeline.script_dir".to_string(),
            message: format!("{}: {e}", dir.display()),
        })?;

        let mut paths: Vec<_> = read_dir
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        let mut added = 0;
        for path in paths {
            if ScriptAnalyzer::parse_file_name(&path).is_none() {
                tracing::debug!(path = %path.display(), "ignoring non-stage file in script dir");
                continue;
            }
            if !is_executable(&path) {
                tracing::warn!(path = %path.display(), "script stage is not executable, skipping");
                continue;
            }
            let stage = ScriptAnalyzer::from_path(&path)?;
            tracing::debug!(stage = stage.name(), priority = stage.priority(), "discovered script stage");
            self.register(Arc::new(stage))?;
            added += 1;
        }
        Ok(added)
    }

    /// Stages in execution order.
    pub fn stages(&self) -> &[Arc<dyn Analyzer>] {
        &self.stages
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Analyzer>> {
        self.stages.iter().find(|s| s.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
