//! Executable gates: header discovery, invocation contract, failures.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use imgscan_analysis::gates::{GateEngine, GateRegistry};
use imgscan_analysis::Runtime;
use imgscan_core::config::GateConfig;
use imgscan_core::errors::{GateError, PipelineError};
use imgscan_core::types::*;
use imgscan_core::{ImageStore, ImgscanConfig};
use imgscan_storage::MemoryImageStore;

fn image() -> ImageId {
    ImageId::parse(&"9".repeat(64)).unwrap()
}

fn script(dir: &Path, name: &str, body: &str, mode: u32) {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
}

// Denied files are printed before the summary line on purpose.
const SUIDLIST: &str = r#"#!/bin/sh
# imgscan-gate: Checks setuid files against a denylist
# imgscan-trigger: SUID_ANY triggers if any setuid file exists
# imgscan-trigger: SUID_DENIED triggers for every denylisted setuid file
# imgscan-param: SUID_DENIED DENY required comma-separated paths
set -e
[ "$2" = "SUIDLIST" ] || exit 3
suids="$3/files.suids"
[ -s "$suids" ] || exit 0
if [ -n "$IMGSCAN_PARAM_DENY" ]; then
  while read -r path mode; do
    case ",$IMGSCAN_PARAM_DENY," in
      *",$path,"*) echo "SUID_DENIED $path ($mode)" ;;
    esac
  done < "$suids"
fi
echo "SUID_ANY image $1 has setuid files"
"#;

struct Setup {
    _tmp: tempfile::TempDir,
    gates: PathBuf,
    store: Arc<MemoryImageStore>,
}

fn setup() -> Setup {
    let tmp = tempfile::tempdir().unwrap();
    let gates = tmp.path().join("gates");
    fs::create_dir_all(&gates).unwrap();
    let store = Arc::new(MemoryImageStore::new());
    store.put_record(&image(), "files.suids", "/bin/su", "04755").unwrap();
    store.put_record(&image(), "files.suids", "/bin/mount", "04755").unwrap();
    Setup {
        _tmp: tmp,
        gates,
        store,
    }
}

impl Setup {
    fn engine(&self) -> GateEngine {
        let mut registry = GateRegistry::with_builtins();
        registry.discover_scripts(&self.gates).unwrap();
        GateEngine::new(self.store.clone(), registry, GateConfig::default())
    }
}

#[test]
fn discovery_reads_triggers_from_the_header() {
    let s = setup();
    script(&s.gates, "SUIDLIST", SUIDLIST, 0o755);
    script(&s.gates, "README", "# imgscan-trigger: T x\n", 0o644);
    script(&s.gates, ".hidden", "#!/bin/sh\n", 0o755);

    let mut registry = GateRegistry::with_builtins();
    let builtins = registry.len();
    assert_eq!(registry.discover_scripts(&s.gates).unwrap(), 1);
    assert_eq!(registry.len(), builtins + 1);

    let gate = registry.get("SUIDLIST").unwrap();
    assert_eq!(gate.description(), "Checks setuid files against a denylist");
    assert!(gate.script().is_some());
    let triggers: Vec<&str> = gate.triggers().map(|t| t.name()).collect();
    assert_eq!(triggers, vec!["SUID_ANY", "SUID_DENIED"]);
    assert!(registry.get("README").is_none());
}

#[test]
fn script_reads_facts_and_params_and_reports_in_declaration_order() {
    let s = setup();
    script(&s.gates, "SUIDLIST", SUIDLIST, 0o755);

    let result = s.engine().evaluate(&image(), "SUIDLIST", "deny=/bin/su").unwrap();
    let triggers: Vec<&str> = result.findings.iter().map(|f| f.trigger.as_str()).collect();
    assert_eq!(triggers, vec!["SUID_ANY", "SUID_DENIED"]);
    assert!(result.findings[0].detail.contains(image().as_str()));
    assert_eq!(result.findings[1].detail, "/bin/su (04755)");

    let stored = s.store.load_gate_result(&image(), "SUIDLIST").unwrap().unwrap();
    assert_eq!(stored.findings, result.findings);
}

#[test]
fn trigger_missing_its_required_param_reports_nothing() {
    let s = setup();
    // Reports both triggers no matter what it is given.
    script(
        &s.gates,
        "LOUD",
        "#!/bin/sh\n\
         # imgscan-trigger: ALWAYS always fires\n\
         # imgscan-trigger: KEYED fires when KEY is set\n\
         # imgscan-param: KEYED KEY required any value\n\
         echo 'KEYED unexpected'\n\
         echo 'ALWAYS fired'\n",
        0o755,
    );

    let result = s.engine().evaluate(&image(), "LOUD", "").unwrap();
    assert_eq!(result.findings, vec![Finding::new("ALWAYS", "fired")]);

    let keyed = s.engine().evaluate(&image(), "LOUD", "KEY=1").unwrap();
    assert_eq!(keyed.findings.len(), 2);
}

#[test]
fn failing_or_misreporting_scripts_are_gate_errors() {
    let s = setup();
    script(&s.gates, "BROKEN", "#!/bin/sh\n# imgscan-trigger: T x\nexit 4\n", 0o755);
    script(
        &s.gates,
        "ROGUE",
        "#!/bin/sh\n# imgscan-trigger: T x\necho 'OTHER surprise'\n",
        0o755,
    );
    let engine = s.engine();

    match engine.evaluate(&image(), "BROKEN", "") {
        Err(GateError::ScriptFailed { gate, message }) => {
            assert_eq!(gate, "BROKEN");
            assert!(message.contains('4'), "{message}");
        }
        other => panic!("expected ScriptFailed, got {other:?}"),
    }
    match engine.evaluate(&image(), "ROGUE", "") {
        Err(GateError::ScriptFailed { message, .. }) => assert!(message.contains("OTHER")),
        other => panic!("expected ScriptFailed, got {other:?}"),
    }
    assert!(s.store.load_gate_results(&image()).unwrap().is_empty());

    // The other gates still evaluate.
    let all = engine.evaluate_all(&image()).unwrap();
    let broken = all.iter().find(|(name, _)| name == "BROKEN").unwrap();
    assert!(broken.1.is_err());
    let suid = all.iter().find(|(name, _)| name == "SUIDCHECK").unwrap();
    assert!(suid.1.as_ref().unwrap().is_triggered());
}

#[test]
fn runtime_loads_gates_from_the_configured_dir() {
    let s = setup();
    script(&s.gates, "SUIDLIST", SUIDLIST, 0o755);
    let mut config = ImgscanConfig::default();
    config.store.backend = Some("memory".to_string());
    config.inventory.cache_dir = Some(s.gates.with_file_name("cache"));
    config.gates.script_dir = Some(s.gates.clone());
    let runtime = Runtime::open(config).unwrap();

    runtime
        .store()
        .put_record(&image(), "files.suids", "/usr/bin/passwd", "04755")
        .unwrap();
    let result = runtime
        .evaluate_gate(&image(), "SUIDLIST", "DENY=/usr/bin/passwd")
        .unwrap();
    let triggers: Vec<&str> = result.findings.iter().map(|f| f.trigger.as_str()).collect();
    assert_eq!(triggers, vec!["SUID_ANY", "SUID_DENIED"]);

    let mut missing = ImgscanConfig::default();
    missing.store.backend = Some("memory".to_string());
    missing.gates.script_dir = Some(s.gates.join("absent"));
    assert!(matches!(Runtime::open(missing), Err(PipelineError::Config(_))));
}
