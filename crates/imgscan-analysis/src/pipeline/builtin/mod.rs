//! Built-in stages.

mod gems;
mod meta;
mod suids;

pub use gems::{parse_gemspec, GemPackageList, GemRecord};
pub use meta::{detect_distro, AnalyzerMeta};
pub use suids::FileSuids;

use std::path::{Path, PathBuf};

use crate::inventory::{EntryKind, FileInventory};

const MAX_SYMLINK_HOPS: usize = 16;

/// Read a file by its image path, resolving symlinks inside the image
/// instead of on the host. `None` when it does not exist or is not a
/// regular file.
pub(crate) fn read_image_file(root: &Path, inventory: &FileInventory, path: &str) -> Option<Vec<u8>> {
    let resolved = resolve_in_image(inventory, path)?;
    std::fs::read(host_path(root, &resolved)).ok()
}

pub(crate) fn host_path(root: &Path, image_path: &str) -> PathBuf {
    root.join(image_path.trim_start_matches('/'))
}

fn resolve_in_image(inventory: &FileInventory, path: &str) -> Option<String> {
    let mut current = normalize(path)?;
    for _ in 0..MAX_SYMLINK_HOPS {
        let entry = inventory.get(&current)?;
        match entry.kind {
            EntryKind::File => return Some(current),
            EntryKind::Symlink => {
                let target = entry.link_target.as_deref()?;
                let joined = if target.starts_with('/') {
                    target.to_string()
                } else {
                    let parent = current.rsplit_once('/').map(|(p, _)| p).unwrap_or("");
                    format!("{parent}/{target}")
                };
                current = normalize(&joined)?;
            }
            _ => return None,
        }
    }
    None
}

/// Collapse `.` and `..` without ever leaving the image root.
fn normalize(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(format!("/{}", parts.join("/")))
}
