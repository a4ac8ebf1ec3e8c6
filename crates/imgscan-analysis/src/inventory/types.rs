//! Inventory entry types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Set-user-id permission bit.
pub const S_ISUID: u32 = 0o4000;

/// Permission bits including setuid, setgid and sticky.
pub const S_IMODE_MASK: u32 = 0o7777;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    BlockDevice,
    CharDevice,
    Fifo,
    Socket,
}

/// One filesystem entry, path rooted at `/` inside the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInventoryEntry {
    pub path: String,
    /// Full `st_mode`, file type bits included.
    pub mode: u32,
    pub size: u64,
    pub uid: u32,
    pub gid: u32,
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_target: Option<String>,
    /// xxh3 of the contents as 16 hex digits; regular files only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl FileInventoryEntry {
    pub fn is_setuid(&self) -> bool {
        self.mode & S_ISUID != 0
    }

    /// Permission bits in octal with a leading zero, e.g. `04755`.
    pub fn permission_string(&self) -> String {
        format!("0{:o}", self.mode & S_IMODE_MASK)
    }
}

/// Snapshot of every entry under a root, sorted by path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInventory {
    pub root: PathBuf,
    pub built_at: i64,
    pub entries: Vec<FileInventoryEntry>,
}

impl FileInventory {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&FileInventoryEntry> {
        self.entries
            .binary_search_by(|e| e.path.as_str().cmp(path))
            .ok()
            .map(|idx| &self.entries[idx])
    }

    pub fn files(&self) -> impl Iterator<Item = &FileInventoryEntry> {
        self.entries.iter().filter(|e| e.kind == EntryKind::File)
    }
}
