//! File inventory: one full walk of an unpacked root, memoized on disk per image.

pub mod cache;
pub mod hasher;
pub mod types;
pub mod walker;

pub use cache::{EnsuredInventory, InventoryCache};
pub use types::{EntryKind, FileInventory, FileInventoryEntry};
