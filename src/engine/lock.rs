//! Advisory per-container write lock
//!
//! Every writer takes an exclusive OS lock on a hidden sidecar file
//! `.<container file name>.lock` next to the container before reading the
//! state it rewrites. The sidecar is never removed: deleting it would let a
//! second writer lock a fresh inode while the first still holds the old one.
//! The one exception is a folder created just to hold a lock: when the plan
//! fails before anything lands there, [`discard_all`] removes it again.
//! Readers take no lock.

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use log::debug;

use crate::error::{Error, Result};

/// Sidecar lock path for a container.
pub fn lock_path_for(container: &Path) -> PathBuf {
    let name = container
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    container.with_file_name(format!(".{}.lock", name))
}

/// A held container lock, released on drop.
#[derive(Debug)]
pub struct ContainerLock {
    file: File,
    container: PathBuf,
    /// Outermost folder created for the sidecar
    created: Option<PathBuf>,
}

impl ContainerLock {
    /// Take the lock without waiting.
    ///
    /// Fails with `ContainerLocked` while another writer holds it. The parent
    /// directory is created if needed so new destinations can be locked too.
    pub fn acquire(container: &Path) -> Result<Self> {
        let lock_path = lock_path_for(container);
        let created = match lock_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => create_missing_dirs(parent)?,
            _ => None,
        };
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if let Err(e) = file.try_lock_exclusive() {
            debug!("Lock {} is held elsewhere: {}", lock_path.display(), e);
            return Err(Error::ContainerLocked {
                path: container.to_path_buf(),
            });
        }

        // Holder pid, for humans inspecting a stuck lock.
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(file, "{}", std::process::id())?;

        debug!("Locked {}", container.display());
        Ok(Self {
            file,
            container: container.to_path_buf(),
            created,
        })
    }

    pub fn container(&self) -> &Path {
        &self.container
    }
}

impl Drop for ContainerLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Create `dir` with its missing ancestors.
///
/// Returns the outermost folder that did not exist before.
fn create_missing_dirs(dir: &Path) -> Result<Option<PathBuf>> {
    let outermost = dir
        .ancestors()
        .take_while(|ancestor| !ancestor.as_os_str().is_empty() && !ancestor.exists())
        .last()
        .map(Path::to_path_buf);
    if outermost.is_some() {
        fs::create_dir_all(dir)?;
    }
    Ok(outermost)
}

/// Locks for several containers, taken in sorted order.
///
/// Either all locks are acquired or none are held on return.
pub fn acquire_all(paths: &[PathBuf]) -> Result<Vec<ContainerLock>> {
    let mut sorted: Vec<&PathBuf> = paths.iter().collect();
    sorted.sort();
    sorted.dedup();
    let mut locks = Vec::with_capacity(sorted.len());
    for path in sorted {
        match ContainerLock::acquire(path) {
            Ok(lock) => locks.push(lock),
            Err(e) => {
                discard_all(locks);
                return Err(e);
            }
        }
    }
    Ok(locks)
}

/// Release locks after a failed plan.
///
/// Folders the locks created are removed again together with the sidecars
/// inside them, as long as no container was written there.
pub fn discard_all(locks: Vec<ContainerLock>) {
    let created: Vec<PathBuf> = locks.iter().filter_map(|l| l.created.clone()).collect();
    if created.is_empty() {
        return;
    }

    let mut emptied = Vec::new();
    for lock in locks {
        let sidecar = lock_path_for(&lock.container);
        let fresh = !lock.container.exists() && created.iter().any(|dir| sidecar.starts_with(dir));
        drop(lock);
        if !fresh {
            continue;
        }
        match fs::remove_file(&sidecar) {
            Ok(()) => emptied.extend(sidecar.parent().map(Path::to_path_buf)),
            Err(e) => debug!("Could not remove {}: {}", sidecar.display(), e),
        }
    }

    for leaf in emptied {
        for dir in leaf.ancestors() {
            let Some(outermost) = created.iter().find(|c| dir.starts_with(c)) else {
                break;
            };
            if fs::remove_dir(dir).is_err() {
                break;
            }
            debug!("Removed unused folder {}", dir.display());
            if dir == outermost.as_path() {
                break;
            }
        }
    }
}
