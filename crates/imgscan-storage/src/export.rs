//! Whole-image export and import as JSON documents.
//!
//! One document carries everything keyed under an image: the record, every
//! fact category, analyzer status rows and gate results.

use serde::{Deserialize, Serialize};

use imgscan_core::errors::{ImportError, StoreError};
use imgscan_core::types::{AnalyzerStatus, FactMap, GateResult, ImageId, ImageRecord};
use imgscan_core::ImageStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDocument {
    pub image_id: ImageId,
    pub record: ImageRecord,
    #[serde(default)]
    pub facts: FactMap,
    #[serde(default)]
    pub analyzer_status: Vec<AnalyzerStatus>,
    #[serde(default)]
    pub gate_results: Vec<GateResult>,
}

/// Per-document result of [`import_documents`].
#[derive(Debug)]
pub enum ImportOutcome {
    Imported { image_id: ImageId },
    /// Not written; the image already existed and `force` was off.
    Skipped { image_id: ImageId, reason: ImportError },
    /// Rejected as inconsistent, or written partially and rolled back.
    Failed { image_id: ImageId, error: ImportError },
}

impl ImportOutcome {
    pub fn image_id(&self) -> &ImageId {
        match self {
            Self::Imported { image_id }
            | Self::Skipped { image_id, .. }
            | Self::Failed { image_id, .. } => image_id,
        }
    }

    pub fn is_imported(&self) -> bool {
        matches!(self, Self::Imported { .. })
    }
}

pub fn export_image(store: &dyn ImageStore, id: &ImageId) -> Result<ImageDocument, StoreError> {
    let record = store.load_image(id)?.ok_or_else(|| StoreError::NotFound {
        image_id: id.to_string(),
    })?;
    Ok(ImageDocument {
        image_id: id.clone(),
        record,
        facts: store.load_facts(id)?,
        analyzer_status: store.load_analyzer_statuses(id)?,
        gate_results: store.load_gate_results(id)?,
    })
}

/// Export each id in order. Any missing image fails the whole export.
pub fn export_images(
    store: &dyn ImageStore,
    ids: &[ImageId],
) -> Result<Vec<ImageDocument>, StoreError> {
    ids.iter().map(|id| export_image(store, id)).collect()
}

pub fn export_all(store: &dyn ImageStore) -> Result<Vec<ImageDocument>, StoreError> {
    export_images(store, &store.list_image_ids()?)
}

pub fn to_json(documents: &[ImageDocument]) -> Result<String, ImportError> {
    Ok(serde_json::to_string_pretty(documents)?)
}

/// Parse an export file: either an array of documents or a single document.
pub fn parse_documents(json: &str) -> Result<Vec<ImageDocument>, ImportError> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<ImageDocument>),
        One(Box<ImageDocument>),
    }
    let documents = match serde_json::from_str::<OneOrMany>(json)? {
        OneOrMany::Many(docs) => docs,
        OneOrMany::One(doc) => vec![*doc],
    };
    for doc in &documents {
        check_document(doc)?;
    }
    Ok(documents)
}

/// A document's record must describe the image it is keyed under.
fn check_document(doc: &ImageDocument) -> Result<(), ImportError> {
    if doc.record.image_id != doc.image_id {
        return Err(ImportError::Serialization {
            message: format!(
                "document {} carries a record for {}",
                doc.image_id, doc.record.image_id
            ),
        });
    }
    Ok(())
}

/// Import one document. Existing images are refused unless `force` is set,
/// in which case they are replaced wholesale. A failed write deletes whatever
/// part of the image was written. A document whose record names another
/// image is rejected before anything is touched.
pub fn import_document(
    store: &dyn ImageStore,
    doc: &ImageDocument,
    force: bool,
) -> Result<(), ImportError> {
    check_document(doc)?;
    let id = &doc.image_id;
    if store.exists(id)? {
        if !force {
            return Err(ImportError::ImportConflict {
                image_id: id.to_string(),
            });
        }
        store.delete_image(id)?;
    }

    if let Err(source) = write_document(store, doc) {
        tracing::warn!(image_id = %id, error = %source, "import failed, rolling back");
        if let Err(rollback) = store.delete_image(id) {
            tracing::error!(image_id = %id, error = %rollback, "rollback failed");
        }
        return Err(ImportError::RolledBack {
            image_id: id.to_string(),
            source,
        });
    }
    Ok(())
}

fn write_document(store: &dyn ImageStore, doc: &ImageDocument) -> Result<(), StoreError> {
    let id = &doc.image_id;
    store.save_image(&doc.record)?;
    for (category, facts) in &doc.facts {
        store.replace_category(id, category, facts)?;
    }
    for status in &doc.analyzer_status {
        store.save_analyzer_status(id, status)?;
    }
    for result in &doc.gate_results {
        store.save_gate_result(id, result)?;
    }
    Ok(())
}

/// Import every document, reporting each outcome. One failure does not stop
/// the rest.
pub fn import_documents(
    store: &dyn ImageStore,
    documents: &[ImageDocument],
    force: bool,
) -> Vec<ImportOutcome> {
    documents
        .iter()
        .map(|doc| {
            let image_id = doc.image_id.clone();
            match import_document(store, doc, force) {
                Ok(()) => {
                    tracing::info!(image_id = %image_id, "image imported");
                    ImportOutcome::Imported { image_id }
                }
                Err(reason @ ImportError::ImportConflict { .. }) => {
                    tracing::info!(image_id = %image_id, "image exists, skipped");
                    ImportOutcome::Skipped { image_id, reason }
                }
                Err(error) => ImportOutcome::Failed { image_id, error },
            }
        })
        .collect()
}
