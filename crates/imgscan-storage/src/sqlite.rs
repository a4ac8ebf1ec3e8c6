//! SQLite-backed `ImageStore`.

use std::path::Path;

use imgscan_core::config::StoreConfig;
use imgscan_core::errors::StoreError;
use imgscan_core::types::{AnalyzerStatus, FactMap, FactSet, GateResult, ImageId, ImageRecord};
use imgscan_core::{ImageState, ImageStore};

use crate::connection::writer::with_immediate_transaction;
use crate::connection::DatabaseManager;
use crate::now_secs;
use crate::queries::{facts, gates, images, status};

pub struct SqliteImageStore {
    db: DatabaseManager,
}

impl SqliteImageStore {
    pub fn open(path: &Path, read_pool_size: usize) -> Result<Self, StoreError> {
        Ok(Self {
            db: DatabaseManager::open(path, read_pool_size)?,
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            db: DatabaseManager::open_in_memory()?,
        })
    }

    /// File database when `config.path` is set, in-memory otherwise.
    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        match &config.path {
            Some(path) => Self::open(path, config.effective_read_pool_size()),
            None => Self::open_in_memory(),
        }
    }

    /// Direct access to the connection manager.
    pub fn database(&self) -> &DatabaseManager {
        &self.db
    }
}

impl ImageStore for SqliteImageStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn put_record(
        &self,
        id: &ImageId,
        category: &str,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        self.db.with_writer(|conn| {
            with_immediate_transaction(conn, |tx| {
                images::ensure_image(tx, id, now_secs())?;
                facts::put_fact(tx, id, category, key, value)
            })
        })
    }

    fn get_record(
        &self,
        id: &ImageId,
        category: &str,
        key: &str,
    ) -> Result<Option<String>, StoreError> {
        self.db
            .with_reader(|conn| facts::get_fact(conn, id, category, key))
    }

    fn replace_category(
        &self,
        id: &ImageId,
        category: &str,
        facts_in: &FactSet,
    ) -> Result<(), StoreError> {
        self.db.with_writer(|conn| {
            with_immediate_transaction(conn, |tx| {
                images::ensure_image(tx, id, now_secs())?;
                facts::replace_category(tx, id, category, facts_in)
            })
        })
    }

    fn load_category(&self, id: &ImageId, category: &str) -> Result<Option<FactSet>, StoreError> {
        let set = self
            .db
            .with_reader(|conn| facts::load_category(conn, id, category))?;
        Ok(if set.is_empty() { None } else { Some(set) })
    }

    fn load_facts(&self, id: &ImageId) -> Result<FactMap, StoreError> {
        self.db.with_reader(|conn| facts::load_all(conn, id))
    }

    fn list_categories(&self, id: &ImageId) -> Result<Vec<String>, StoreError> {
        self.db.with_reader(|conn| facts::list_categories(conn, id))
    }

    fn save_image(&self, record: &ImageRecord) -> Result<(), StoreError> {
        self.db.with_writer(|conn| {
            with_immediate_transaction(conn, |tx| images::upsert_image(tx, record, now_secs()))
        })
    }

    fn load_image(&self, id: &ImageId) -> Result<Option<ImageRecord>, StoreError> {
        self.db.with_reader(|conn| images::load_image(conn, id))
    }

    fn update_tags(
        &self,
        id: &ImageId,
        current: &[String],
        all: &[String],
    ) -> Result<(), StoreError> {
        let changed = self
            .db
            .with_writer(|conn| images::set_tags(conn, id, current, all, now_secs()))?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                image_id: id.to_string(),
            });
        }
        Ok(())
    }

    fn update_family_tree(&self, id: &ImageId, tree: &[String]) -> Result<(), StoreError> {
        let changed = self
            .db
            .with_writer(|conn| images::set_family_tree(conn, id, tree, now_secs()))?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                image_id: id.to_string(),
            });
        }
        Ok(())
    }

    fn list_image_ids(&self) -> Result<Vec<ImageId>, StoreError> {
        self.db.with_reader(images::list_image_ids)
    }

    fn delete_image(&self, id: &ImageId) -> Result<bool, StoreError> {
        self.db.with_writer(|conn| {
            // Mark first, in its own commit, so an interrupted delete is visible.
            let marked = images::mark_deleting(conn, id, now_secs())?;
            if marked == 0 {
                return Ok(false);
            }
            with_immediate_transaction(conn, |tx| images::delete_image_rows(tx, id)).map_err(
                |e| {
                    tracing::error!(image_id = %id, error = %e, "delete did not complete");
                    StoreError::PartialDelete {
                        image_id: id.to_string(),
                        message: e.to_string(),
                    }
                },
            )?;
            tracing::info!(image_id = %id, "image deleted");
            Ok(true)
        })
    }

    fn image_state(&self, id: &ImageId) -> Result<ImageState, StoreError> {
        let state = self.db.with_reader(|conn| images::image_state(conn, id))?;
        Ok(match state.as_deref() {
            None => ImageState::Absent,
            Some(images::STATE_DELETING) => ImageState::Corrupt,
            Some(_) => ImageState::Present,
        })
    }

    fn save_analyzer_status(
        &self,
        id: &ImageId,
        analyzer_status: &AnalyzerStatus,
    ) -> Result<(), StoreError> {
        self.db.with_writer(|conn| {
            with_immediate_transaction(conn, |tx| {
                images::ensure_image(tx, id, now_secs())?;
                status::upsert_status(tx, id, analyzer_status)
            })
        })
    }

    fn load_analyzer_statuses(&self, id: &ImageId) -> Result<Vec<AnalyzerStatus>, StoreError> {
        self.db.with_reader(|conn| status::load_statuses(conn, id))
    }

    fn commit_stage(
        &self,
        id: &ImageId,
        outputs: &FactMap,
        analyzer_status: &AnalyzerStatus,
    ) -> Result<(), StoreError> {
        self.db.with_writer(|conn| {
            with_immediate_transaction(conn, |tx| {
                images::ensure_image(tx, id, now_secs())?;
                for (category, set) in outputs {
                    facts::replace_category(tx, id, category, set)?;
                }
                status::upsert_status(tx, id, analyzer_status)
            })
        })
    }

    fn save_gate_result(&self, id: &ImageId, result: &GateResult) -> Result<(), StoreError> {
        self.db.with_writer(|conn| {
            with_immediate_transaction(conn, |tx| {
                if images::image_state(tx, id)?.is_none() {
                    return Err(StoreError::NotFound {
                        image_id: id.to_string(),
                    });
                }
                gates::save_gate_result(tx, id, result)
            })
        })
    }

    fn load_gate_result(&self, id: &ImageId, gate: &str) -> Result<Option<GateResult>, StoreError> {
        self.db
            .with_reader(|conn| gates::load_gate_result(conn, id, gate))
    }

    fn load_gate_results(&self, id: &ImageId) -> Result<Vec<GateResult>, StoreError> {
        self.db.with_reader(|conn| gates::load_gate_results(conn, id))
    }
}
