//! Read-only views over the store used by listing and summary output.

use serde::Serialize;

use imgscan_core::constants::CATEGORY_ANALYZER_META;
use imgscan_core::errors::StoreError;
use imgscan_core::types::{Distro, ImageId, StageStatus};
use imgscan_core::{list_images, ImageStore};

/// Placeholder for values an image does not have.
pub const NONE_LABEL: &str = "<none>";

/// Summary of one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSummary {
    pub image_id: ImageId,
    pub repo_tags: Vec<String>,
    pub distro: String,
    pub distro_version: String,
    pub human_name: Option<String>,
    pub short_id: String,
    pub parent_id: Option<String>,
    pub base_id: String,
    pub image_type: Option<String>,
}

impl ImageSummary {
    pub fn load(store: &dyn ImageStore, id: &ImageId) -> Result<Option<Self>, StoreError> {
        let Some(record) = store.load_image(id)? else {
            return Ok(None);
        };
        let distro = load_distro(store, id)?;
        Ok(Some(Self {
            image_id: record.image_id.clone(),
            repo_tags: record.current_tags.clone(),
            distro: distro.name,
            distro_version: distro.version,
            human_name: record.manifest.human_name.clone(),
            short_id: record.manifest.short_id.clone(),
            parent_id: record.manifest.parent_id.clone(),
            base_id: record.base_id().to_string(),
            image_type: record.manifest.user_type.clone(),
        }))
    }
}

/// One row of the image listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageListingRow {
    pub repository: String,
    pub tag: String,
    /// Short id, or the full id when untruncated output was asked for.
    pub image_id: String,
    /// `distro/version`
    pub distro: String,
    /// Latest analyzer run; `None` means never analyzed.
    pub last_analyzed: Option<i64>,
    pub size_mb: f64,
}

/// Split `repo:tag` at the last colon. A name without one has neither part.
pub fn split_repo_tag(human_name: Option<&str>) -> (String, String) {
    match human_name.and_then(|n| n.rsplit_once(':')) {
        Some((repo, tag)) => (repo.to_string(), tag.to_string()),
        None => (NONE_LABEL.to_string(), NONE_LABEL.to_string()),
    }
}

/// Bytes to megabytes, rounded to two decimals.
pub fn size_mb(bytes: u64) -> f64 {
    (bytes as f64 / 1024.0 / 1024.0 * 100.0).round() / 100.0
}

/// One listing row per image, in id order.
pub fn listing_rows(store: &dyn ImageStore, full_ids: bool) -> Result<Vec<ImageListingRow>, StoreError> {
    let mut rows = Vec::new();
    for item in list_images(store)? {
        let (id, manifest) = item?;
        let (repository, tag) = split_repo_tag(manifest.human_name.as_deref());
        let distro = load_distro(store, &id)?;
        let last_analyzed = store
            .load_analyzer_statuses(&id)?
            .iter()
            .map(|s| s.last_run_at)
            .filter(|ts| *ts > 0)
            .max();
        rows.push(ImageListingRow {
            repository,
            tag,
            image_id: if full_ids {
                id.to_string()
            } else {
                manifest.short_id.clone()
            },
            distro: format!("{}/{}", distro.name, distro.version),
            last_analyzed,
            size_mb: size_mb(manifest.size_bytes),
        });
    }
    Ok(rows)
}

/// One row per analyzer stage recorded for an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyzerStatusRow {
    pub stage: String,
    pub status: StageStatus,
    pub last_run_at: i64,
    pub result_code: i32,
    pub checksum: String,
}

pub fn analyzer_status_rows(
    store: &dyn ImageStore,
    id: &ImageId,
) -> Result<Vec<AnalyzerStatusRow>, StoreError> {
    Ok(store
        .load_analyzer_statuses(id)?
        .into_iter()
        .map(|s| AnalyzerStatusRow {
            stage: s.stage,
            status: s.status,
            last_run_at: s.last_run_at,
            result_code: s.result_code,
            checksum: s.checksum,
        })
        .collect())
}

fn load_distro(store: &dyn ImageStore, id: &ImageId) -> Result<Distro, StoreError> {
    Ok(store
        .load_category(id, CATEGORY_ANALYZER_META)?
        .map(|meta| Distro::from_meta(&meta))
        .unwrap_or_else(Distro::unknown))
}
