//! Per-image on-disk inventory cache.
//!
//! Layout: `<cache_dir>/<image id>/inventory.json`. An inventory is built at
//! most once per materialization and never patched: re-materializing the
//! root invalidates it.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use imgscan_core::config::InventoryConfig;
use imgscan_core::errors::InventoryError;
use imgscan_core::types::ImageId;

use super::types::FileInventory;
use super::walker::walk_root;

const INVENTORY_FILE: &str = "inventory.json";

/// Result of [`InventoryCache::ensure`].
#[derive(Debug, Clone)]
pub struct EnsuredInventory {
    pub inventory: Arc<FileInventory>,
    /// The cached copy was used and no walk happened.
    pub reused: bool,
    pub duration_ms: u64,
}

pub struct InventoryCache {
    cache_dir: PathBuf,
    compute_hashes: bool,
    threads: usize,
}

impl InventoryCache {
    pub fn new(config: &InventoryConfig) -> Self {
        Self {
            cache_dir: config.effective_cache_dir(),
            compute_hashes: config.effective_compute_hashes(),
            threads: config.effective_threads(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Directory holding everything cached for one image.
    pub fn image_dir(&self, id: &ImageId) -> PathBuf {
        self.cache_dir.join(id.as_str())
    }

    fn inventory_path(&self, id: &ImageId) -> PathBuf {
        self.image_dir(id).join(INVENTORY_FILE)
    }

    /// Walk `root`, hashing regular files when enabled.
    pub fn build(&self, root: &Path) -> Result<FileInventory, InventoryError> {
        let entries = walk_root(root, self.threads, self.compute_hashes)?;
        Ok(FileInventory {
            root: root.to_path_buf(),
            built_at: crate::now_secs(),
            entries,
        })
    }

    /// The cached inventory for `id`, if one exists for this `root`.
    ///
    /// A cache file recorded for another root, or one that no longer
    /// parses, counts as missing.
    pub fn load(&self, id: &ImageId, root: &Path) -> Result<Option<FileInventory>, InventoryError> {
        let path = self.inventory_path(id);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(InventoryError::Io { path, source }),
        };
        let inventory: FileInventory = match serde_json::from_str(&content) {
            Ok(inv) => inv,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "discarding unreadable inventory cache");
                return Ok(None);
            }
        };
        if inventory.root != root {
            tracing::debug!(
                image_id = %id,
                cached_root = %inventory.root.display(),
                root = %root.display(),
                "inventory cached for a different root"
            );
            return Ok(None);
        }
        Ok(Some(inventory))
    }

    /// Write through a temp file and rename, so readers never see a partial file.
    pub fn store(&self, id: &ImageId, inventory: &FileInventory) -> Result<(), InventoryError> {
        let dir = self.image_dir(id);
        fs::create_dir_all(&dir).map_err(|source| InventoryError::Io {
            path: dir.clone(),
            source,
        })?;
        let final_path = dir.join(INVENTORY_FILE);
        let tmp_path = dir.join(format!("{INVENTORY_FILE}.tmp"));

        let json = serde_json::to_vec(inventory).map_err(|e| InventoryError::Serialization {
            path: final_path.clone(),
            message: e.to_string(),
        })?;
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| InventoryError::Io { path, source }
        };
        let mut file = fs::File::create(&tmp_path).map_err(io_err(&tmp_path))?;
        file.write_all(&json).map_err(io_err(&tmp_path))?;
        file.sync_all().map_err(io_err(&tmp_path))?;
        fs::rename(&tmp_path, &final_path).map_err(io_err(&final_path))?;
        Ok(())
    }

    /// Reuse the cached inventory or build and store a new one.
    ///
    /// `rematerialized` drops any cached copy first. A failed build caches
    /// nothing.
    pub fn ensure(
        &self,
        id: &ImageId,
        root: &Path,
        rematerialized: bool,
    ) -> Result<EnsuredInventory, InventoryError> {
        let start = Instant::now();
        if rematerialized {
            self.invalidate(id)?;
        } else if let Some(inventory) = self.load(id, root)? {
            return Ok(EnsuredInventory {
                inventory: Arc::new(inventory),
                reused: true,
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        let inventory = self.build(root)?;
        self.store(id, &inventory)?;
        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            image_id = %id,
            entries = inventory.len(),
            duration_ms,
            "inventory built"
        );
        Ok(EnsuredInventory {
            inventory: Arc::new(inventory),
            reused: false,
            duration_ms,
        })
    }

    /// Remove the cached inventory. Returns whether one existed.
    pub fn invalidate(&self, id: &ImageId) -> Result<bool, InventoryError> {
        let path = self.inventory_path(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(InventoryError::Io { path, source }),
        }
    }

    /// Remove every cached artifact for the image, stage work dirs included.
    pub fn purge(&self, id: &ImageId) -> Result<(), InventoryError> {
        let dir = self.image_dir(id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(InventoryError::Io { path: dir, source }),
        }
    }
}
