//! The `ImageStore` contract, run against every built-in backend.

use std::sync::Arc;

use imgscan_core::errors::StoreError;
use imgscan_core::types::*;
use imgscan_core::{list_images, ImageState, ImageStore};
use imgscan_storage::{MemoryImageStore, SqliteImageStore};
use tempfile::TempDir;

fn id(c: char) -> ImageId {
    ImageId::parse(&c.to_string().repeat(64)).unwrap()
}

fn facts(pairs: &[(&str, &str)]) -> FactSet {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn status(stage: &str, priority: u32, checksum: &str, ts: i64) -> AnalyzerStatus {
    AnalyzerStatus {
        stage: stage.to_string(),
        priority,
        status: StageStatus::Succeeded,
        result_code: 0,
        checksum: checksum.to_string(),
        last_run_at: ts,
    }
}

/// Each backend under test. The TempDir keeps the file database alive.
fn backends() -> Vec<(Arc<dyn ImageStore>, Option<TempDir>)> {
    let dir = TempDir::new().unwrap();
    let file = SqliteImageStore::open(&dir.path().join("images.db"), 2).unwrap();
    vec![
        (Arc::new(MemoryImageStore::new()), None),
        (Arc::new(SqliteImageStore::open_in_memory().unwrap()), None),
        (Arc::new(file), Some(dir)),
    ]
}

// ---- Fact records ----

#[test]
fn read_your_writes_on_every_backend() {
    for (store, _dir) in backends() {
        let a = id('a');
        store.put_record(&a, "files.suids", "/usr/bin/su", "04755").unwrap();
        assert_eq!(
            store.get_record(&a, "files.suids", "/usr/bin/su").unwrap().as_deref(),
            Some("04755"),
            "backend {}",
            store.backend_name()
        );
        // Last write wins.
        store.put_record(&a, "files.suids", "/usr/bin/su", "04711").unwrap();
        assert_eq!(
            store.get_record(&a, "files.suids", "/usr/bin/su").unwrap().as_deref(),
            Some("04711")
        );
        assert_eq!(store.get_record(&a, "files.suids", "/nope").unwrap(), None);
        assert_eq!(store.get_record(&id('b'), "files.suids", "/usr/bin/su").unwrap(), None);
    }
}

#[test]
fn put_record_creates_placeholder_image() {
    for (store, _dir) in backends() {
        let a = id('a');
        assert_eq!(store.image_state(&a).unwrap(), ImageState::Absent);
        store.put_record(&a, "analyzer_meta", "DISTRO", "alpine").unwrap();
        assert_eq!(store.image_state(&a).unwrap(), ImageState::Present);
        let record = store.load_image(&a).unwrap().unwrap();
        assert_eq!(record.manifest.short_id, a.short_id());
        assert!(record.current_tags.is_empty());
    }
}

#[test]
fn replace_category_overwrites_wholesale_and_empty_removes() {
    for (store, _dir) in backends() {
        let a = id('a');
        store
            .replace_category(&a, "pkgs.gems", &facts(&[("x", "1"), ("y", "2")]))
            .unwrap();
        store
            .replace_category(&a, "pkgs.gems", &facts(&[("z", "3")]))
            .unwrap();
        assert_eq!(
            store.load_category(&a, "pkgs.gems").unwrap(),
            Some(facts(&[("z", "3")]))
        );

        store.replace_category(&a, "pkgs.gems", &FactSet::new()).unwrap();
        assert_eq!(store.load_category(&a, "pkgs.gems").unwrap(), None);
        assert!(store.list_categories(&a).unwrap().is_empty());
    }
}

#[test]
fn load_facts_groups_by_category() {
    for (store, _dir) in backends() {
        let a = id('a');
        store.put_record(&a, "files.suids", "/bin/su", "04755").unwrap();
        store.put_record(&a, "analyzer_meta", "DISTRO", "debian").unwrap();
        let all = store.load_facts(&a).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["analyzer_meta"]["DISTRO"], "debian");
        assert_eq!(
            store.list_categories(&a).unwrap(),
            vec!["analyzer_meta".to_string(), "files.suids".to_string()]
        );
        assert!(store.load_facts(&id('b')).unwrap().is_empty());
    }
}

// ---- Image records ----

#[test]
fn save_load_and_update_image_record() {
    for (store, _dir) in backends() {
        let a = id('a');
        let mut record = ImageRecord::new(a.clone());
        record.manifest.human_name = Some("library/alpine:3.19".into());
        record.manifest.size_bytes = 7_340_032;
        record.current_tags = vec!["library/alpine:3.19".into()];
        record.all_tags = record.current_tags.clone();
        store.save_image(&record).unwrap();
        assert_eq!(store.load_image(&a).unwrap(), Some(record.clone()));

        let current = vec!["alpine:latest".to_string()];
        let all = vec!["library/alpine:3.19".to_string(), "alpine:latest".to_string()];
        store.update_tags(&a, &current, &all).unwrap();
        store
            .update_family_tree(&a, &["b".repeat(64), a.to_string()])
            .unwrap();

        let loaded = store.load_image(&a).unwrap().unwrap();
        assert_eq!(loaded.current_tags, current);
        assert_eq!(loaded.all_tags, all);
        assert_eq!(loaded.base_id(), "b".repeat(64));
        assert_eq!(loaded.manifest.size_bytes, 7_340_032);
    }
}

#[test]
fn updating_an_absent_image_is_not_found() {
    for (store, _dir) in backends() {
        let err = store.update_tags(&id('c'), &[], &[]).unwrap_err();
        assert!(matches!(err, imgscan_core::errors::StoreError::NotFound { .. }));
        assert!(store.update_family_tree(&id('c'), &[]).is_err());
    }
}

#[test]
fn list_images_yields_sorted_manifests() {
    for (store, _dir) in backends() {
        for c in ['c', 'a', 'b'] {
            store.save_image(&ImageRecord::new(id(c))).unwrap();
        }
        let ids: Vec<ImageId> = list_images(store.as_ref())
            .unwrap()
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(ids, vec![id('a'), id('b'), id('c')]);
    }
}

// ---- Analyzer status + stage commits ----

#[test]
fn statuses_are_ordered_by_priority_then_name() {
    for (store, _dir) in backends() {
        let a = id('a');
        store.save_analyzer_status(&a, &status("file_suids", 40, "c1", 10)).unwrap();
        store.save_analyzer_status(&a, &status("analyzer_meta", 1, "c2", 11)).unwrap();
        store.save_analyzer_status(&a, &status("aaa_extra", 40, "c3", 12)).unwrap();
        let names: Vec<String> = store
            .load_analyzer_statuses(&a)
            .unwrap()
            .into_iter()
            .map(|s| s.stage)
            .collect();
        assert_eq!(names, vec!["analyzer_meta", "aaa_extra", "file_suids"]);
    }
}

#[test]
fn commit_stage_replaces_outputs_and_status_together() {
    for (store, _dir) in backends() {
        let a = id('a');
        store
            .replace_category(&a, "files.suids", &facts(&[("/old", "04755")]))
            .unwrap();

        let mut outputs = FactMap::new();
        outputs.insert("files.suids".into(), facts(&[("/usr/bin/su", "04755")]));
        outputs.insert("unused".into(), FactSet::new());
        store
            .commit_stage(&a, &outputs, &status("file_suids", 40, "sum", 100))
            .unwrap();

        assert_eq!(
            store.load_category(&a, "files.suids").unwrap(),
            Some(facts(&[("/usr/bin/su", "04755")]))
        );
        assert_eq!(store.load_category(&a, "unused").unwrap(), None);
        let statuses = store.load_analyzer_statuses(&a).unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].checksum, "sum");
    }
}

// ---- Gate results ----

#[test]
fn gate_results_keep_finding_order_and_overwrite() {
    for (store, _dir) in backends() {
        let a = id('a');
        store.save_image(&ImageRecord::new(a.clone())).unwrap();
        let first = GateResult {
            gate: "SUIDCHECK".into(),
            findings: vec![
                Finding::new("SUID_FOUND", "/usr/bin/su"),
                Finding::new("SUID_FOUND", "/bin/mount"),
            ],
            evaluated_at: 5,
        };
        store.save_gate_result(&a, &first).unwrap();
        assert_eq!(store.load_gate_result(&a, "SUIDCHECK").unwrap(), Some(first));

        let second = GateResult {
            gate: "SUIDCHECK".into(),
            findings: vec![],
            evaluated_at: 6,
        };
        store.save_gate_result(&a, &second).unwrap();
        let other = GateResult {
            gate: "GEMCHECK".into(),
            findings: vec![Finding::new("GEM_FOUND", "3 gems")],
            evaluated_at: 6,
        };
        store.save_gate_result(&a, &other).unwrap();

        let all = store.load_gate_results(&a).unwrap();
        assert_eq!(all, vec![other, second]);
        assert_eq!(store.load_gate_result(&a, "NOPE").unwrap(), None);
    }
}

#[test]
fn gate_result_for_absent_image_is_not_found() {
    for (store, _dir) in backends() {
        let a = id('a');
        let result = GateResult {
            gate: "SUIDCHECK".into(),
            findings: vec![Finding::new("SUID_FOUND", "/usr/bin/su")],
            evaluated_at: 1,
        };
        assert!(matches!(
            store.save_gate_result(&a, &result),
            Err(StoreError::NotFound { .. })
        ));
        assert!(store.list_image_ids().unwrap().is_empty());

        store.put_record(&a, "files.suids", "/usr/bin/su", "04755").unwrap();
        assert!(store.delete_image(&a).unwrap());
        assert!(store.save_gate_result(&a, &result).is_err());
        assert_eq!(store.image_state(&a).unwrap(), ImageState::Absent);
    }
}

// ---- Delete ----

#[test]
fn delete_removes_everything_and_is_idempotent() {
    for (store, _dir) in backends() {
        let a = id('a');
        let b = id('b');
        store.save_image(&ImageRecord::new(a.clone())).unwrap();
        store.save_image(&ImageRecord::new(b.clone())).unwrap();
        store.put_record(&a, "files.suids", "/usr/bin/su", "04755").unwrap();
        store.save_analyzer_status(&a, &status("file_suids", 40, "c", 1)).unwrap();
        store
            .save_gate_result(
                &a,
                &GateResult {
                    gate: "SUIDCHECK".into(),
                    findings: vec![Finding::new("SUID_FOUND", "/usr/bin/su")],
                    evaluated_at: 1,
                },
            )
            .unwrap();

        assert!(store.delete_image(&a).unwrap());
        assert_eq!(store.list_image_ids().unwrap(), vec![b.clone()]);
        assert_eq!(store.get_record(&a, "files.suids", "/usr/bin/su").unwrap(), None);
        assert!(store.load_image(&a).unwrap().is_none());
        assert!(store.load_analyzer_statuses(&a).unwrap().is_empty());
        assert!(store.load_gate_results(&a).unwrap().is_empty());
        assert_eq!(store.image_state(&a).unwrap(), ImageState::Absent);

        assert!(!store.delete_image(&a).unwrap());
        assert!(store.exists(&b).unwrap());
    }
}
