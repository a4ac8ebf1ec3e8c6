//! Parallel walk of an unpacked image root using the `ignore` crate's
//! `WalkParallel`, with every filter disabled so nothing is skipped.
//!
//! Regular files are hashed on the walker threads from the host path the
//! walk produced. Image paths are for display and lookup only: a name that
//! is not valid UTF-8 is rendered lossily and cannot be mapped back.

use std::fs::{FileType, Metadata};
use std::path::{Component, Path, PathBuf};

use crossbeam_channel as channel;
use imgscan_core::errors::InventoryError;

use super::hasher::hash_hex;
use super::types::{EntryKind, FileInventoryEntry};

type WalkItem = Result<FileInventoryEntry, (PathBuf, String)>;

/// Walk `root` and return one entry per filesystem object below it, sorted
/// by image path. Symlinks are recorded, not followed. With `hash_files`
/// every regular file gets its content hash. The first entry-level error
/// fails the walk.
pub fn walk_root(
    root: &Path,
    threads: usize,
    hash_files: bool,
) -> Result<Vec<FileInventoryEntry>, InventoryError> {
    let root_meta = std::fs::metadata(root).map_err(|e| InventoryError::WalkFailed {
        root: root.to_path_buf(),
        path: root.to_path_buf(),
        message: e.to_string(),
    })?;
    if !root_meta.is_dir() {
        return Err(InventoryError::WalkFailed {
            root: root.to_path_buf(),
            path: root.to_path_buf(),
            message: "not a directory".to_string(),
        });
    }

    let (tx, rx) = channel::unbounded::<WalkItem>();

    let mut builder = ignore::WalkBuilder::new(root);
    builder
        .standard_filters(false)
        .hidden(false)
        .follow_links(false)
        .same_file_system(false);
    if threads > 0 {
        builder.threads(threads);
    }

    builder.build_parallel().run(|| {
        let tx = tx.clone();
        Box::new(move |entry| {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    let path = error_path(&err).unwrap_or_else(|| root.to_path_buf());
                    let _ = tx.send(Err((path, err.to_string())));
                    return ignore::WalkState::Quit;
                }
            };
            if entry.depth() == 0 {
                return ignore::WalkState::Continue;
            }
            let item = describe(root, entry.path(), hash_files);
            let failed = item.is_err();
            let _ = tx.send(item);
            if failed {
                ignore::WalkState::Quit
            } else {
                ignore::WalkState::Continue
            }
        })
    });

    drop(tx);
    let mut entries = Vec::new();
    for item in rx {
        match item {
            Ok(entry) => entries.push(entry),
            Err((path, message)) => {
                return Err(InventoryError::WalkFailed {
                    root: root.to_path_buf(),
                    path,
                    message,
                });
            }
        }
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

fn describe(root: &Path, path: &Path, hash_files: bool) -> WalkItem {
    let fail = |message: String| (path.to_path_buf(), message);
    let meta = std::fs::symlink_metadata(path).map_err(|e| fail(e.to_string()))?;
    let kind = entry_kind(&meta.file_type());
    let link_target = if kind == EntryKind::Symlink {
        let target = std::fs::read_link(path).map_err(|e| fail(e.to_string()))?;
        Some(target.to_string_lossy().into_owned())
    } else {
        None
    };
    let hash = if hash_files && meta.is_file() {
        let bytes = std::fs::read(path).map_err(|e| fail(e.to_string()))?;
        Some(hash_hex(&bytes))
    } else {
        None
    };
    let (mode, uid, gid) = ownership(&meta);
    Ok(FileInventoryEntry {
        path: image_path(root, path).ok_or_else(|| fail("outside root".to_string()))?,
        mode,
        size: meta.len(),
        uid,
        gid,
        kind,
        link_target,
        hash,
    })
}

/// `/`-rooted path of `path` inside the image.
pub fn image_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut out = String::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                out.push('/');
                out.push_str(&part.to_string_lossy());
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    if out.is_empty() {
        out.push('/');
    }
    Some(out)
}

fn error_path(err: &ignore::Error) -> Option<PathBuf> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.clone()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        ignore::Error::Loop { child, .. } => Some(child.clone()),
        _ => None,
    }
}

fn entry_kind(ft: &FileType) -> EntryKind {
    if ft.is_symlink() {
        return EntryKind::Symlink;
    }
    if ft.is_dir() {
        return EntryKind::Dir;
    }
    if ft.is_file() {
        return EntryKind::File;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        if ft.is_block_device() {
            return EntryKind::BlockDevice;
        }
        if ft.is_char_device() {
            return EntryKind::CharDevice;
        }
        if ft.is_fifo() {
            return EntryKind::Fifo;
        }
        if ft.is_socket() {
            return EntryKind::Socket;
        }
    }
    EntryKind::File
}

#[cfg(unix)]
fn ownership(meta: &Metadata) -> (u32, u32, u32) {
    use std::os::unix::fs::MetadataExt;
    (meta.mode(), meta.uid(), meta.gid())
}

#[cfg(not(unix))]
fn ownership(meta: &Metadata) -> (u32, u32, u32) {
    let mode = if meta.is_dir() {
        0o040755
    } else if meta.permissions().readonly() {
        0o100444
    } else {
        0o100644
    };
    (mode, 0, 0)
}
