//! Analyzer pipeline: skip logic, failure isolation, cancellation, locking,
//! and the built-in stages end to end.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use imgscan_analysis::gates::{GateEngine, GateRegistry};
use imgscan_analysis::inventory::InventoryCache;
use imgscan_analysis::pipeline::{
    Analyzer, AnalyzerRegistry, Pipeline, RunOutcome, RunRequest, StageContext, StageOutput,
};
use imgscan_core::config::{GateConfig, InventoryConfig, PipelineConfig};
use imgscan_core::errors::{PipelineError, StageError};
use imgscan_core::events::{StageCompletedEvent, StageSkippedEvent};
use imgscan_core::types::*;
use imgscan_core::{Cancellable, CancellationToken, EventDispatcher, ImgscanEventHandler, ImageStore};
use imgscan_storage::{MemoryImageStore, SqliteImageStore};

type Body = Box<dyn Fn(&StageContext<'_>) -> Result<StageOutput, StageError> + Send + Sync>;

struct TestStage {
    name: &'static str,
    priority: u32,
    outputs: Vec<String>,
    depends: Vec<String>,
    runs: AtomicUsize,
    body: Body,
}

impl TestStage {
    fn new(
        name: &'static str,
        priority: u32,
        outputs: &[&str],
        body: impl Fn(&StageContext<'_>) -> Result<StageOutput, StageError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            priority,
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            depends: Vec::new(),
            runs: AtomicUsize::new(0),
            body: Box::new(body),
        })
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl Analyzer for TestStage {
    fn name(&self) -> &str {
        self.name
    }
    fn priority(&self) -> u32 {
        self.priority
    }
    fn outputs(&self) -> Vec<String> {
        self.outputs.clone()
    }
    fn depends_on(&self) -> Vec<String> {
        self.depends.clone()
    }
    fn definition(&self) -> &[u8] {
        self.name.as_bytes()
    }
    fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutput, StageError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        (self.body)(ctx)
    }
}

fn facts(category: &str, pairs: &[(&str, &str)]) -> StageOutput {
    let set: FactSet = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    BTreeMap::from([(category.to_string(), set)])
}

fn image() -> ImageId {
    ImageId::parse(&"d".repeat(64)).unwrap()
}

struct Fixture {
    _tmp: tempfile::TempDir,
    root: PathBuf,
    store: Arc<dyn ImageStore>,
    inventory: Arc<InventoryCache>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_store(Arc::new(MemoryImageStore::new()))
    }

    fn with_store(store: Arc<dyn ImageStore>) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("rootfs");
        write(&root, "etc/os-release", "ID=\"debian\"\nVERSION_ID=\"12\"\n");
        write(
            &root,
            "usr/lib/ruby/gems/3.1.0/specifications/rake-13.0.6.gemspec",
            "Gem::Specification.new do |s|\n  s.name = \"rake\".freeze\n  s.version = \"13.0.6\"\n  s.licenses = [\"MIT\".freeze]\nend\n",
        );
        write(&root, "usr/bin/su", "elf");
        let inventory = Arc::new(InventoryCache::new(&InventoryConfig {
            cache_dir: Some(tmp.path().join("cache")),
            ..Default::default()
        }));
        Self {
            _tmp: tmp,
            root,
            store,
            inventory,
        }
    }

    fn pipeline(&self, registry: AnalyzerRegistry, config: PipelineConfig) -> Pipeline {
        Pipeline::new(Arc::clone(&self.store), registry, Arc::clone(&self.inventory), config)
    }

    fn request(&self) -> RunRequest {
        RunRequest::new(image(), &self.root)
    }
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn registry(stages: &[Arc<TestStage>]) -> AnalyzerRegistry {
    let mut registry = AnalyzerRegistry::new();
    for stage in stages {
        registry.register(stage.clone()).unwrap();
    }
    registry
}

#[test]
fn rerun_without_changes_executes_nothing_and_keeps_facts() {
    let fx = Fixture::with_store(Arc::new(SqliteImageStore::open_in_memory().unwrap()));
    let pipeline = fx.pipeline(AnalyzerRegistry::with_builtins(), PipelineConfig::default());
    let never = CancellationToken::new();

    let first = pipeline.run_all(&fx.request(), &never).unwrap();
    assert_eq!(first.executed, vec!["analyzer_meta", "gem_package_list", "file_suids"]);
    assert!(first.is_success());
    let facts_before = fx.store.load_facts(&image()).unwrap();
    let statuses_before = fx.store.load_analyzer_statuses(&image()).unwrap();

    let second = pipeline.run_all(&fx.request(), &never).unwrap();
    assert!(second.executed.is_empty());
    assert_eq!(second.skipped.len(), 3);
    assert!(second.inventory_reused);
    assert_eq!(second.outcome, RunOutcome::Success);
    assert_eq!(fx.store.load_facts(&image()).unwrap(), facts_before);
    assert_eq!(fx.store.load_analyzer_statuses(&image()).unwrap(), statuses_before);
}

#[test]
fn changed_parameters_rerun_exactly_that_stage() {
    let fx = Fixture::new();
    let never = CancellationToken::new();
    fx.pipeline(AnalyzerRegistry::with_builtins(), PipelineConfig::default())
        .run_all(&fx.request(), &never)
        .unwrap();

    let mut config = PipelineConfig::default();
    config.params.insert(
        "gem_package_list".to_string(),
        BTreeMap::from([("MODE".to_string(), "full".to_string())]),
    );
    let report = fx
        .pipeline(AnalyzerRegistry::with_builtins(), config)
        .run_all(&fx.request(), &never)
        .unwrap();
    assert_eq!(report.executed, vec!["gem_package_list"]);
    assert_eq!(report.skipped, vec!["analyzer_meta", "file_suids"]);
}

#[test]
fn force_reruns_every_stage() {
    let fx = Fixture::new();
    let pipeline = fx.pipeline(AnalyzerRegistry::with_builtins(), PipelineConfig::default());
    let never = CancellationToken::new();
    pipeline.run_all(&fx.request(), &never).unwrap();
    let report = pipeline.run_all(&fx.request().forced(), &never).unwrap();
    assert_eq!(report.executed.len(), 3);
    assert!(report.skipped.is_empty());
}

#[test]
fn failing_stage_does_not_stop_later_stages() {
    let fx = Fixture::new();
    let first = TestStage::new("first", 1, &["a"], |_| Ok(facts("a", &[("k", "v")])));
    let broken = TestStage::new("broken", 2, &["b"], |_| {
        Err(StageError::Failed {
            stage: "broken".into(),
            code: 3,
        })
    });
    let last = TestStage::new("last", 3, &["c"], |_| Ok(facts("c", &[("k", "v")])));
    let pipeline = fx.pipeline(
        registry(&[first.clone(), broken.clone(), last.clone()]),
        PipelineConfig::default(),
    );
    let never = CancellationToken::new();

    let report = pipeline.run_all(&fx.request(), &never).unwrap();
    assert_eq!(
        report.outcome,
        RunOutcome::Partial {
            failed: vec!["broken".to_string()]
        }
    );
    assert_eq!(last.runs(), 1);
    let status = report.status_of("broken").unwrap();
    assert_eq!(status.status, StageStatus::Failed);
    assert_eq!(status.result_code, 3);
    assert!(fx.store.load_category(&image(), "c").unwrap().is_some());
    assert!(fx.store.load_category(&image(), "b").unwrap().is_none());

    // Failed stages are never skip-eligible.
    let again = pipeline.run_all(&fx.request(), &never).unwrap();
    assert_eq!(again.executed, vec!["broken"]);
    assert_eq!(broken.runs(), 2);
    assert_eq!(first.runs(), 1);
}

#[test]
fn panicking_stage_is_recorded_as_failed() {
    let fx = Fixture::new();
    let boom = TestStage::new("boom", 1, &["x"], |_| panic!("stage bug"));
    let after = TestStage::new("after", 2, &["y"], |_| Ok(StageOutput::new()));
    let pipeline = fx.pipeline(registry(&[boom, after.clone()]), PipelineConfig::default());

    let report = pipeline.run_all(&fx.request(), &CancellationToken::new()).unwrap();
    assert_eq!(report.failed, vec!["boom"]);
    assert_eq!(report.status_of("boom").unwrap().result_code, 101);
    assert_eq!(after.runs(), 1);
}

#[test]
fn undeclared_output_fails_the_stage() {
    let fx = Fixture::new();
    let sneaky = TestStage::new("sneaky", 1, &["declared"], |_| {
        Ok(facts("other", &[("k", "v")]))
    });
    let pipeline = fx.pipeline(registry(&[sneaky]), PipelineConfig::default());

    let report = pipeline.run_all(&fx.request(), &CancellationToken::new()).unwrap();
    assert_eq!(report.failed, vec!["sneaky"]);
    assert_eq!(report.status_of("sneaky").unwrap().result_code, 2);
    assert!(fx.store.load_category(&image(), "other").unwrap().is_none());
}

#[test]
fn missing_declared_output_clears_stale_records() {
    let fx = Fixture::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let flaky = TestStage::new("flaky", 1, &["pkgs.test"], move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(facts("pkgs.test", &[("pkg", "1.0")]))
        } else {
            Ok(StageOutput::new())
        }
    });
    let pipeline = fx.pipeline(registry(&[flaky]), PipelineConfig::default());
    let never = CancellationToken::new();

    pipeline.run_all(&fx.request(), &never).unwrap();
    assert!(fx.store.load_category(&image(), "pkgs.test").unwrap().is_some());
    pipeline.run_all(&fx.request().forced(), &never).unwrap();
    assert!(fx.store.load_category(&image(), "pkgs.test").unwrap().is_none());
}

#[test]
fn cancellation_between_stages_leaves_the_rest_pending() {
    let fx = Fixture::new();
    let token = CancellationToken::new();
    let inner = token.clone();
    let canceller = TestStage::new("canceller", 1, &["a"], move |_| {
        inner.cancel();
        Ok(facts("a", &[("k", "v")]))
    });
    let second = TestStage::new("second", 2, &["b"], |_| Ok(StageOutput::new()));
    let third = TestStage::new("third", 3, &["c"], |_| Ok(StageOutput::new()));
    let pipeline = fx.pipeline(
        registry(&[canceller, second.clone(), third]),
        PipelineConfig::default(),
    );

    let report = pipeline.run_all(&fx.request(), &token).unwrap();
    assert_eq!(report.executed, vec!["canceller"]);
    assert_eq!(
        report.outcome,
        RunOutcome::Cancelled {
            pending: vec!["second".to_string(), "third".to_string()]
        }
    );
    assert_eq!(second.runs(), 0);
    // The stage that was running finished and committed.
    assert!(fx.store.load_category(&image(), "a").unwrap().is_some());
}

#[test]
fn cancelled_before_start_is_an_error() {
    let fx = Fixture::new();
    let pipeline = fx.pipeline(AnalyzerRegistry::with_builtins(), PipelineConfig::default());
    let token = CancellationToken::new();
    token.cancel();
    let err = pipeline.run_all(&fx.request(), &token).unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));
}

#[test]
fn held_lock_times_out() {
    let fx = Fixture::new();
    let config = PipelineConfig {
        lock_timeout_ms: Some(30),
        ..Default::default()
    };
    let pipeline = fx.pipeline(AnalyzerRegistry::with_builtins(), config);
    let never = CancellationToken::new();

    let _held = pipeline
        .locks()
        .acquire(&image(), Duration::from_millis(10), &never)
        .unwrap();
    let err = pipeline.run_all(&fx.request(), &never).unwrap_err();
    assert!(matches!(err, PipelineError::LockTimeout { .. }));
}

#[test]
fn same_image_runs_serialize() {
    let fx = Fixture::new();
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));
    let (flight, max) = (Arc::clone(&in_flight), Arc::clone(&max_seen));
    let slow = TestStage::new("slow", 1, &["s"], move |_| {
        let now = flight.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(40));
        flight.fetch_sub(1, Ordering::SeqCst);
        Ok(StageOutput::new())
    });
    let pipeline = fx.pipeline(registry(&[slow.clone()]), PipelineConfig::default());
    let request = fx.request().forced();

    std::thread::scope(|scope| {
        for _ in 0..3 {
            scope.spawn(|| pipeline.run_all(&request, &CancellationToken::new()).unwrap());
        }
    });
    assert_eq!(slow.runs(), 3);
    assert_eq!(max_seen.load(Ordering::SeqCst), 1);
}

#[test]
fn disabled_stages_are_neither_run_nor_reported() {
    let fx = Fixture::new();
    let config = PipelineConfig {
        disabled_stages: vec!["gem_package_list".to_string()],
        ..Default::default()
    };
    let report = fx
        .pipeline(AnalyzerRegistry::with_builtins(), config)
        .run_all(&fx.request(), &CancellationToken::new())
        .unwrap();
    assert!(report.status_of("gem_package_list").is_none());
    assert_eq!(report.statuses.len(), 2);
    assert!(fx.store.load_category(&image(), "pkgs.gems").unwrap().is_none());
}

#[test]
fn declared_dependencies_are_passed_as_inputs() {
    let fx = Fixture::new();
    let producer = TestStage::new("producer", 1, &["pkgs.base"], |_| {
        Ok(facts("pkgs.base", &[("libc", "2.36"), ("zlib", "1.2")]))
    });
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    let consumer = Arc::new(TestStage {
        name: "consumer",
        priority: 2,
        outputs: vec!["pkgs.count".to_string()],
        depends: vec!["pkgs.base".to_string()],
        runs: AtomicUsize::new(0),
        body: Box::new(move |ctx: &StageContext<'_>| {
            *sink.lock().unwrap() = Some(ctx.inputs.clone());
            Ok(StageOutput::new())
        }),
    });
    let pipeline = fx.pipeline(registry(&[producer, consumer]), PipelineConfig::default());
    pipeline.run_all(&fx.request(), &CancellationToken::new()).unwrap();

    let inputs = seen.lock().unwrap().clone().unwrap();
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs["pkgs.base"].len(), 2);
}

#[test]
fn duplicate_stage_names_are_rejected() {
    let mut registry = AnalyzerRegistry::with_builtins();
    let dup = TestStage::new("file_suids", 5, &["x"], |_| Ok(StageOutput::new()));
    let err = registry.register(dup).unwrap_err();
    assert!(matches!(err, PipelineError::DuplicateStage { .. }));
}

#[test]
fn stages_run_in_priority_then_name_order() {
    let b = TestStage::new("b", 5, &["b"], |_| Ok(StageOutput::new()));
    let a = TestStage::new("a", 5, &["a"], |_| Ok(StageOutput::new()));
    let z = TestStage::new("z", 1, &["z"], |_| Ok(StageOutput::new()));
    assert_eq!(registry(&[b, a, z]).names(), vec!["z", "a", "b"]);
}

#[derive(Default)]
struct Counting {
    completed: AtomicUsize,
    skipped: AtomicUsize,
}

impl ImgscanEventHandler for Counting {
    fn on_stage_completed(&self, _event: &StageCompletedEvent) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_stage_skipped(&self, _event: &StageSkippedEvent) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn events_report_completed_and_skipped_stages() {
    let fx = Fixture::new();
    let counting = Arc::new(Counting::default());
    let mut events = EventDispatcher::new();
    events.register(counting.clone());
    let pipeline = fx
        .pipeline(AnalyzerRegistry::with_builtins(), PipelineConfig::default())
        .with_events(events);
    let never = CancellationToken::new();

    pipeline.run_all(&fx.request(), &never).unwrap();
    pipeline.run_all(&fx.request(), &never).unwrap();
    assert_eq!(counting.completed.load(Ordering::SeqCst), 3);
    assert_eq!(counting.skipped.load(Ordering::SeqCst), 3);
}

#[test]
fn dockerfile_is_stored_with_the_metadata() {
    let fx = Fixture::new();
    let pipeline = fx.pipeline(AnalyzerRegistry::with_builtins(), PipelineConfig::default());
    let request = fx.request().with_dockerfile("FROM debian:12\nRUN true\n");
    pipeline.run_all(&request, &CancellationToken::new()).unwrap();

    assert_eq!(
        fx.store.get_record(&image(), "dockerfile", "Dockerfile").unwrap().as_deref(),
        Some("FROM debian:12\nRUN true\n")
    );
    assert_eq!(
        fx.store.get_record(&image(), "analyzer_meta", "DISTRO").unwrap().as_deref(),
        Some("debian")
    );
}

#[cfg(unix)]
#[test]
fn three_stage_example_ends_in_suid_finding() {
    use std::os::unix::fs::PermissionsExt;

    let fx = Fixture::new();
    fs::set_permissions(fx.root.join("usr/bin/su"), fs::Permissions::from_mode(0o4755)).unwrap();
    let pipeline = fx.pipeline(AnalyzerRegistry::with_builtins(), PipelineConfig::default());
    let report = pipeline.run_all(&fx.request(), &CancellationToken::new()).unwrap();
    assert!(report.is_success());

    let meta = fx.store.load_category(&image(), "analyzer_meta").unwrap().unwrap();
    assert_eq!(meta["DISTRO"], "debian");
    assert_eq!(meta["DISTROVERS"], "12");
    assert_eq!(meta["LIKEDISTRO"], "debian");

    let gems = fx.store.load_category(&image(), "pkgs.gems").unwrap().unwrap();
    let (path, json) = gems.iter().next().unwrap();
    assert!(path.ends_with("specifications/rake-13.0.6.gemspec"));
    let record: serde_json::Value = serde_json::from_str(json).unwrap();
    assert_eq!(record["name"], "rake");
    assert_eq!(record["latest"], "13.0.6");
    assert_eq!(record["lics"][0], "MIT");

    let suids = fx.store.load_category(&image(), "files.suids").unwrap().unwrap();
    assert_eq!(suids.len(), 1);
    assert_eq!(suids["/usr/bin/su"], "04755");

    let engine = GateEngine::new(
        Arc::clone(&fx.store),
        GateRegistry::with_builtins(),
        GateConfig::default(),
    );
    let result = engine.evaluate(&image(), "SUIDCHECK", "").unwrap();
    assert_eq!(result.findings.len(), 1);
    assert_eq!(result.findings[0].trigger, "SUID_FOUND");
    assert!(result.findings[0].detail.contains("/usr/bin/su"));
}

#[test]
fn unwalkable_root_aborts_without_creating_the_image() {
    let fx = Fixture::new();
    let pipeline = fx.pipeline(AnalyzerRegistry::with_builtins(), PipelineConfig::default());
    let request = RunRequest::new(image(), fx.root.join("missing"));
    let err = pipeline.run_all(&request, &CancellationToken::new()).unwrap_err();
    assert!(matches!(err, PipelineError::Inventory(_)));
    assert!(!fx.store.exists(&image()).unwrap());
}
