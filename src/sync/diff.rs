//! Local/remote diffing.
//!
//! Pairs every node of a [`ResourceTree`] with the local directory it maps
//! to and decides, file by file, whether a download is needed. The only
//! "already synced" signal is an equal byte size: content is never hashed,
//! so a remote edit that keeps the size unchanged goes unnoticed.
//!
//! Two remote entries whose names sanitize to the same local path would
//! write one file twice; only the first one in walk order is kept.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::crawl::ResourceTree;
use crate::listing::FileEntry;

/// One file that must be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DownloadTask {
    /// Absolute remote URL.
    pub remote_url: String,
    /// Destination path.
    pub local_path: PathBuf,
}

impl DownloadTask {
    /// Creates a task.
    #[must_use]
    pub fn new(remote_url: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            remote_url: remote_url.into(),
            local_path: local_path.into(),
        }
    }

    /// File-name component of the destination, lossily converted.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Walks `tree` depth-first against `local_root` and returns the files that
/// need downloading, in visitation order (a node's files, then its children
/// in page order).
///
/// The root node's label is the first directory below `local_root`.
#[must_use]
pub fn diff(tree: &ResourceTree, local_root: &Path) -> Vec<DownloadTask> {
    let mut tasks = Vec::new();
    let mut claimed = HashSet::new();
    walk(tree, &local_root.join(&tree.label), &mut claimed, &mut tasks);
    debug!(
        root = %local_root.display(),
        label = %tree.label,
        tasks = tasks.len(),
        "diff complete"
    );
    tasks
}

fn walk(
    node: &ResourceTree,
    local_dir: &Path,
    claimed: &mut HashSet<PathBuf>,
    tasks: &mut Vec<DownloadTask>,
) {
    for file in &node.files {
        let local_path = local_dir.join(&file.name);
        if !claimed.insert(local_path.clone()) {
            warn!(
                url = %file.url,
                path = %local_path.display(),
                "skipping file that maps to an already claimed local path"
            );
            continue;
        }
        if needs_download(file, &local_path) {
            tasks.push(DownloadTask::new(file.url.clone(), local_path));
        } else {
            trace!(path = %local_path.display(), "up to date");
        }
    }
    for child in &node.children {
        walk(child, &local_dir.join(&child.label), claimed, tasks);
    }
}

/// A file is needed when it is missing locally, is not a regular file, or
/// its size differs from the remote size. An unknown remote size always
/// counts as differing.
#[must_use]
pub fn needs_download(file: &FileEntry, local_path: &Path) -> bool {
    let Some(remote_size) = file.size else {
        return true;
    };
    match std::fs::metadata(local_path) {
        Ok(meta) if meta.is_file() => meta.len() != remote_size,
        _ => true,
    }
}
