//! Trash collaborator and container disposal
//!
//! Containers left empty by a delete or move are handed to a [`Trash`]
//! instead of being unlinked, so users can recover them. Disposal also takes
//! the container's preview images and, when it ends up empty, the folder that
//! held it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::defaults::CATALOG_FILENAME;
use crate::error::{Error, Result};

/// Preview image extensions disposed of together with a container.
pub const THUMBNAIL_EXTENSIONS: &[&str] = &["png", "webp", "jpg", "jpeg"];

/// Something that takes files and folders out of the library recoverably.
pub trait Trash: Send + Sync {
    /// Take `path` (a file or a directory). Returns where it went.
    fn dispose(&self, path: &Path) -> Result<PathBuf>;
}

/// Trash implemented as a plain directory.
///
/// Each item is moved to `<root>/<timestamp>_<name>`; a numeric suffix keeps
/// names unique. Across filesystems the item is copied, then removed.
#[derive(Debug, Clone)]
pub struct TrashDir {
    root: PathBuf,
}

impl TrashDir {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn slot_for(&self, path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "item".to_string());
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        let mut candidate = self.root.join(format!("{}_{}", stamp, name));
        let mut counter = 1;
        while candidate.exists() {
            candidate = self.root.join(format!("{}_{}_{}", stamp, counter, name));
            counter += 1;
        }
        candidate
    }
}

impl Trash for TrashDir {
    fn dispose(&self, path: &Path) -> Result<PathBuf> {
        let trash_error = |e: io::Error| Error::Trash {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        fs::create_dir_all(&self.root).map_err(trash_error)?;
        let slot = self.slot_for(path);
        match fs::rename(path, &slot) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                copy_tree(path, &slot).map_err(trash_error)?;
                if path.is_dir() {
                    fs::remove_dir_all(path).map_err(trash_error)?;
                } else {
                    fs::remove_file(path).map_err(trash_error)?;
                }
            }
            Err(e) => return Err(trash_error(e)),
        }
        debug!("Trashed {} -> {}", path.display(), slot.display());
        Ok(slot)
    }
}

fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    if from.is_file() {
        fs::copy(from, to)?;
        return Ok(());
    }
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry.path().strip_prefix(from).map_err(io::Error::other)?;
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// What a disposal took.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisposalReport {
    pub container: PathBuf,
    pub thumbnails: Vec<PathBuf>,
    /// The containing folder, if it was left empty and trashed as well
    pub folder: Option<PathBuf>,
}

/// Preview images next to a container: `<stem>.png` and friends.
pub fn companion_thumbnails(container: &Path) -> Vec<PathBuf> {
    let Some(stem) = container.file_stem() else {
        return Vec::new();
    };
    let stem = stem.to_string_lossy();
    THUMBNAIL_EXTENSIONS
        .iter()
        .map(|ext| container.with_file_name(format!("{}.{}", stem, ext)))
        .filter(|path| path.is_file())
        .collect()
}

/// Trash a container, its thumbnails and its folder if left empty.
///
/// Failing to trash the container itself is an error. Thumbnails and the
/// folder are best effort and only logged. Folders that are one of
/// `protected_roots` or that hold a catalog definition file are never taken.
pub fn dispose_container(
    trash: &dyn Trash,
    container: &Path,
    protected_roots: &[PathBuf],
) -> Result<DisposalReport> {
    let thumbnails = companion_thumbnails(container);
    trash.dispose(container)?;
    info!("Moved {} to trash", container.display());

    let mut report = DisposalReport {
        container: container.to_path_buf(),
        ..Default::default()
    };
    for thumbnail in thumbnails {
        match trash.dispose(&thumbnail) {
            Ok(_) => report.thumbnails.push(thumbnail),
            Err(e) => warn!("Could not trash preview {}: {}", thumbnail.display(), e),
        }
    }

    if let Some(folder) = container.parent() {
        if is_disposable_folder(folder, protected_roots) {
            match trash.dispose(folder) {
                Ok(_) => {
                    info!("Moved empty folder {} to trash", folder.display());
                    report.folder = Some(folder.to_path_buf());
                }
                Err(e) => warn!("Could not trash empty folder {}: {}", folder.display(), e),
            }
        }
    }
    Ok(report)
}

/// A folder is disposable when it holds nothing but hidden files.
fn is_disposable_folder(folder: &Path, protected_roots: &[PathBuf]) -> bool {
    if folder.as_os_str().is_empty() || protected_roots.iter().any(|root| same_path(root, folder)) {
        return false;
    }
    if folder.join(CATALOG_FILENAME).exists() {
        return false;
    }
    match fs::read_dir(folder) {
        Ok(entries) => entries.filter_map(|entry| entry.ok()).all(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with('.') && entry.file_type().is_ok_and(|t| t.is_file())
        }),
        Err(_) => false,
    }
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
