//! Tests for identifiers, records and the store iterator.

use std::sync::Mutex;

use imgscan_core::errors::StoreError;
use imgscan_core::traits::store::list_images;
use imgscan_core::types::facts::{parse_kv, render_kv};
use imgscan_core::types::*;
use imgscan_core::{ImageState, ImageStore};
use proptest::prelude::*;

fn id(c: char) -> ImageId {
    ImageId::parse(&c.to_string().repeat(64)).unwrap()
}

// ---- ImageRecord ----

#[test]
fn base_id_defaults_to_self() {
    let mut record = ImageRecord::new(id('a'));
    assert_eq!(record.base_id(), "a".repeat(64));
    record.family_tree = vec!["b".repeat(64), "a".repeat(64)];
    assert_eq!(record.base_id(), "b".repeat(64));
    assert_eq!(record.manifest.short_id, "aaaaaaaaaaaa");
}

#[test]
fn distro_meta_round_trip_and_unknown_fallback() {
    let distro = Distro {
        name: "alpine".into(),
        version: "3.19.1".into(),
        like: "alpine".into(),
    };
    assert_eq!(Distro::from_meta(&distro.to_meta()), distro);
    let unknown = Distro::from_meta(&FactSet::new());
    assert!(unknown.is_unknown());
    assert_eq!(unknown.version, "0");
}

#[test]
fn skip_eligibility_needs_success_and_same_checksum() {
    let status = AnalyzerStatus {
        stage: "file_suids".into(),
        priority: 40,
        status: StageStatus::Succeeded,
        result_code: 0,
        checksum: "abc".into(),
        last_run_at: 1,
    };
    assert!(status.is_skip_eligible("abc"));
    assert!(!status.is_skip_eligible("abd"));
    let failed = AnalyzerStatus {
        status: StageStatus::Failed,
        ..status
    };
    assert!(!failed.is_skip_eligible("abc"));
}

#[test]
fn gate_result_filters_by_trigger() {
    let result = GateResult {
        gate: "SUIDCHECK".into(),
        findings: vec![
            Finding::new("SUID_FOUND", "/usr/bin/su"),
            Finding::new("OTHER", "x"),
            Finding::new("SUID_FOUND", "/bin/ping"),
        ],
        evaluated_at: 0,
    };
    let details: Vec<&str> = result
        .findings_for("SUID_FOUND")
        .map(|f| f.detail.as_str())
        .collect();
    assert_eq!(details, vec!["/usr/bin/su", "/bin/ping"]);
    assert!(result.is_triggered());
}

// ---- list_images ----

/// Minimal store: only image records, with interior mutability for deletes.
struct RecordsOnly {
    records: Mutex<Vec<ImageRecord>>,
}

impl ImageStore for RecordsOnly {
    fn backend_name(&self) -> &'static str {
        "records-only"
    }
    fn put_record(&self, _: &ImageId, _: &str, _: &str, _: &str) -> Result<(), StoreError> {
        Ok(())
    }
    fn get_record(&self, _: &ImageId, _: &str, _: &str) -> Result<Option<String>, StoreError> {
        Ok(None)
    }
    fn replace_category(&self, _: &ImageId, _: &str, _: &FactSet) -> Result<(), StoreError> {
        Ok(())
    }
    fn load_category(&self, _: &ImageId, _: &str) -> Result<Option<FactSet>, StoreError> {
        Ok(None)
    }
    fn load_facts(&self, _: &ImageId) -> Result<FactMap, StoreError> {
        Ok(FactMap::new())
    }
    fn list_categories(&self, _: &ImageId) -> Result<Vec<String>, StoreError> {
        Ok(Vec::new())
    }
    fn save_image(&self, record: &ImageRecord) -> Result<(), StoreError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
    fn load_image(&self, id: &ImageId) -> Result<Option<ImageRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| &r.image_id == id)
            .cloned())
    }
    fn update_tags(&self, _: &ImageId, _: &[String], _: &[String]) -> Result<(), StoreError> {
        Ok(())
    }
    fn update_family_tree(&self, _: &ImageId, _: &[String]) -> Result<(), StoreError> {
        Ok(())
    }
    fn list_image_ids(&self) -> Result<Vec<ImageId>, StoreError> {
        let mut ids: Vec<ImageId> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.image_id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
    fn delete_image(&self, id: &ImageId) -> Result<bool, StoreError> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| &r.image_id != id);
        Ok(records.len() != before)
    }
    fn image_state(&self, id: &ImageId) -> Result<ImageState, StoreError> {
        Ok(if self.load_image(id)?.is_some() {
            ImageState::Present
        } else {
            ImageState::Absent
        })
    }
    fn save_analyzer_status(&self, _: &ImageId, _: &AnalyzerStatus) -> Result<(), StoreError> {
        Ok(())
    }
    fn load_analyzer_statuses(&self, _: &ImageId) -> Result<Vec<AnalyzerStatus>, StoreError> {
        Ok(Vec::new())
    }
    fn commit_stage(&self, _: &ImageId, _: &FactMap, _: &AnalyzerStatus) -> Result<(), StoreError> {
        Ok(())
    }
    fn save_gate_result(&self, _: &ImageId, _: &GateResult) -> Result<(), StoreError> {
        Ok(())
    }
    fn load_gate_result(&self, _: &ImageId, _: &str) -> Result<Option<GateResult>, StoreError> {
        Ok(None)
    }
    fn load_gate_results(&self, _: &ImageId) -> Result<Vec<GateResult>, StoreError> {
        Ok(Vec::new())
    }
}

#[test]
fn list_images_is_lazy_restartable_and_skips_deleted() {
    let store = RecordsOnly {
        records: Mutex::new(Vec::new()),
    };
    for c in ['c', 'a', 'b'] {
        store.save_image(&ImageRecord::new(id(c))).unwrap();
    }

    let mut iter = list_images(&store).unwrap();
    let (first, _) = iter.next().unwrap().unwrap();
    assert_eq!(first, id('a'));

    // Deleted after the snapshot: skipped, not an error.
    store.delete_image(&id('b')).unwrap();
    let rest: Vec<ImageId> = iter.clone().map(|r| r.unwrap().0).collect();
    assert_eq!(rest, vec![id('c')]);

    iter.restart();
    assert_eq!(iter.count(), 2);
    assert!(store.exists(&id('a')).unwrap());
    assert!(!store.exists(&id('b')).unwrap());
}

// ---- Properties ----

proptest! {
    #[test]
    fn any_64_hex_string_parses_to_lowercase(s in "[0-9a-fA-F]{64}") {
        let parsed = ImageId::parse(&s).unwrap();
        prop_assert_eq!(parsed.as_str(), s.to_ascii_lowercase());
        prop_assert_eq!(parsed.short_id().len(), 12);
    }

    #[test]
    fn wrong_length_never_parses(s in "[0-9a-f]{0,63}") {
        prop_assert!(ImageId::parse(&s).is_err());
    }

    #[test]
    fn kv_render_then_parse_preserves_simple_facts(
        facts in proptest::collection::btree_map("[a-z/._]{1,20}", "[0-9a-z ]{0,12}", 0..8)
    ) {
        let parsed = parse_kv(&render_kv(&facts)).unwrap();
        prop_assert_eq!(parsed, facts);
    }
}
