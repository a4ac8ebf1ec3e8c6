//! Listing rows, summaries and analyzer status rows.

use imgscan_core::types::*;
use imgscan_core::ImageStore;
use imgscan_storage::listing::{analyzer_status_rows, listing_rows, size_mb, split_repo_tag};
use imgscan_storage::{ImageSummary, MemoryImageStore};
use proptest::prelude::*;

fn id(c: char) -> ImageId {
    ImageId::parse(&c.to_string().repeat(64)).unwrap()
}

fn status(stage: &str, ts: i64) -> AnalyzerStatus {
    AnalyzerStatus {
        stage: stage.into(),
        priority: 1,
        status: StageStatus::Succeeded,
        result_code: 0,
        checksum: "c".into(),
        last_run_at: ts,
    }
}

#[test]
fn listing_rows_split_names_and_report_latest_run() {
    let store = MemoryImageStore::new();
    let mut record = ImageRecord::new(id('a'));
    record.manifest.human_name = Some("registry:5000/app:1.2".into());
    record.manifest.size_bytes = 5 * 1024 * 1024 + 123_456;
    store.save_image(&record).unwrap();
    store
        .replace_category(
            &id('a'),
            "analyzer_meta",
            &Distro {
                name: "alpine".into(),
                version: "3.19".into(),
                like: "alpine".into(),
            }
            .to_meta(),
        )
        .unwrap();
    store.save_analyzer_status(&id('a'), &status("analyzer_meta", 100)).unwrap();
    store.save_analyzer_status(&id('a'), &status("file_suids", 250)).unwrap();

    store.save_image(&ImageRecord::new(id('b'))).unwrap();

    let rows = listing_rows(&store, false).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].repository, "registry:5000/app");
    assert_eq!(rows[0].tag, "1.2");
    assert_eq!(rows[0].image_id, "aaaaaaaaaaaa");
    assert_eq!(rows[0].distro, "alpine/3.19");
    assert_eq!(rows[0].last_analyzed, Some(250));
    assert_eq!(rows[0].size_mb, 5.12);

    assert_eq!(rows[1].repository, "<none>");
    assert_eq!(rows[1].tag, "<none>");
    assert_eq!(rows[1].distro, "Unknown/0");
    assert_eq!(rows[1].last_analyzed, None);

    let full = listing_rows(&store, true).unwrap();
    assert_eq!(full[1].image_id, "b".repeat(64));
}

#[test]
fn summary_reports_base_and_tags() {
    let store = MemoryImageStore::new();
    assert!(ImageSummary::load(&store, &id('a')).unwrap().is_none());

    let mut record = ImageRecord::new(id('a'));
    record.current_tags = vec!["app:1".into(), "app:latest".into()];
    record.family_tree = vec!["c".repeat(64), "a".repeat(64)];
    record.manifest.user_type = Some("base".into());
    store.save_image(&record).unwrap();

    let summary = ImageSummary::load(&store, &id('a')).unwrap().unwrap();
    assert_eq!(summary.repo_tags, record.current_tags);
    assert_eq!(summary.base_id, "c".repeat(64));
    assert_eq!(summary.distro, "Unknown");
    assert_eq!(summary.image_type.as_deref(), Some("base"));
    assert_eq!(summary.short_id, "aaaaaaaaaaaa");
}

#[test]
fn status_rows_follow_stage_order() {
    let store = MemoryImageStore::new();
    let mut failed = status("gem_package_list", 7);
    failed.priority = 12;
    failed.status = StageStatus::Failed;
    failed.result_code = 3;
    store.save_analyzer_status(&id('a'), &failed).unwrap();
    store.save_analyzer_status(&id('a'), &status("analyzer_meta", 5)).unwrap();

    let rows = analyzer_status_rows(&store, &id('a')).unwrap();
    assert_eq!(rows[0].stage, "analyzer_meta");
    assert_eq!(rows[1].status, StageStatus::Failed);
    assert_eq!(rows[1].result_code, 3);
}

#[test]
fn size_rounds_to_two_decimals() {
    assert_eq!(size_mb(0), 0.0);
    assert_eq!(size_mb(1024 * 1024), 1.0);
    assert_eq!(size_mb(1_572_864), 1.5);
}

proptest! {
    #[test]
    fn split_takes_text_after_last_colon_as_tag(
        repo in "[a-z0-9./:-]{1,30}",
        tag in "[a-zA-Z0-9._-]{1,20}",
    ) {
        let (r, t) = split_repo_tag(Some(&format!("{repo}:{tag}")));
        prop_assert_eq!(r, repo);
        prop_assert_eq!(t, tag);
    }
}
