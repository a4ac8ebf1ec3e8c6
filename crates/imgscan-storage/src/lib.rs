//! # imgscan-storage
//!
//! Backends for the `ImageStore` contract plus the data-only helpers built on
//! top of it: export/import documents and listing rows.

pub mod connection;
pub mod export;
pub mod listing;
pub mod memory;
pub mod migrations;
pub mod queries;
pub mod registry;
pub mod sqlite;

pub use connection::DatabaseManager;
pub use export::{export_images, import_documents, ImageDocument, ImportOutcome};
pub use listing::{AnalyzerStatusRow, ImageListingRow, ImageSummary};
pub use memory::MemoryImageStore;
pub use registry::{BackendConstructor, BackendRegistry};
pub use sqlite::SqliteImageStore;

/// Current unix time in seconds.
pub(crate) fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
