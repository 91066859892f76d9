//! Atomic Writer
//!
//! Applies a [`MutationPlan`] so that every container on disk is either fully
//! in its old state or fully in its new state.
//!
//! ## Process
//!
//! 1.  **Lock**: Take the advisory lock of every container the plan touches.
//!
//! 2.  **Stage**: For each container write, re-read the current file under
//!     the lock, apply the edits, and write the result to a hidden `.tmp_`
//!     file in the same directory. The temp file is flushed, synced and then
//!     re-opened to verify that it parses and matches the intended records.
//!     Nothing visible has changed yet; any failure here drops the temp files
//!     and leaves every original untouched.
//!
//! 3.  **Commit**: Atomically rename each staged file over its target,
//!     destination before source, then run relocations and disposals. A
//!     failure once something was committed is reported as
//!     `WriteFailedPartial`.

use std::collections::{HashMap, VecDeque};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tempfile::NamedTempFile;

use super::lock;
use super::plan::{ContainerWrite, Edit, InsertSource, MutationPlan, PlanStep};
use super::trash::{companion_thumbnails, dispose_container, DisposalReport, Trash};
use crate::container::format::{self, FORMAT_VERSION};
use crate::container::{self, AssetMetadata, Container, PayloadSlot, Record};
use crate::error::{Error, Result};

/// Prefix of in-flight temporary files.
pub const TEMP_PREFIX: &str = ".tmp_";

/// Collaborators the writer needs beyond the plan itself.
pub struct WriteContext<'a> {
    pub trash: &'a dyn Trash,
    /// Folders that are never disposed of, typically library roots
    pub protected_roots: Vec<PathBuf>,
}

/// What was changed on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub written: Vec<PathBuf>,
    pub relocated: Vec<(PathBuf, PathBuf)>,
    pub disposed: Vec<DisposalReport>,
}

/// Where a record's payload bytes are copied from.
#[derive(Debug, Clone)]
enum PayloadSource {
    /// Byte range of an existing container file
    Slot { file: PathBuf, offset: u64, len: u64 },
    Bytes(Vec<u8>),
    File { path: PathBuf, len: u64 },
    /// No bytes; the record keeps its external slot
    Link,
}

impl PayloadSource {
    fn len(&self) -> Option<u64> {
        match self {
            PayloadSource::Slot { len, .. } | PayloadSource::File { len, .. } => Some(*len),
            PayloadSource::Bytes(bytes) => Some(bytes.len() as u64),
            PayloadSource::Link => None,
        }
    }
}

#[derive(Debug)]
struct PendingRecord {
    record: Record,
    source: PayloadSource,
}

/// A fully written and verified replacement, not yet visible.
///
/// Dropping it without [`commit`](Self::commit) deletes the temp file and
/// leaves the target exactly as it was.
#[derive(Debug)]
pub struct StagedContainer {
    target: PathBuf,
    temp: NamedTempFile,
    records: Vec<Record>,
}

impl StagedContainer {
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Records the replacement holds, with their final payload slots.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Atomically replace the target with the staged file.
    pub fn commit(self) -> Result<PathBuf> {
        persist(self.temp, &self.target)?;
        debug!("Committed {}", self.target.display());
        Ok(self.target)
    }
}

/// Stage one container write.
///
/// The caller must hold the container's lock. The current file is re-read
/// here, so edits always apply to the latest on-disk state. Edits that would
/// leave a reference pointing at a missing record are rejected with
/// `InvalidOperation` before anything is written.
pub fn stage(write: &ContainerWrite) -> Result<StagedContainer> {
    let target = &write.container;
    if write.create && !write.replace && target.exists() {
        return Err(Error::ConflictUnresolved {
            destination: target.clone(),
            message: "the destination appeared after conflicts were resolved".to_string(),
        });
    }

    let pending = apply_edits(write)?;
    check_references(target, &pending)?;
    let (records, sources) = layout(pending);

    let dir = parent_dir(target);
    fs::create_dir_all(dir)
        .map_err(|e| Error::write_failed(target, format!("cannot create folder: {}", e)))?;
    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(".shelf")
        .tempfile_in(dir)
        .map_err(|e| Error::write_failed(target, format!("cannot create temporary file: {}", e)))?;

    write_contents(target, temp.as_file_mut(), &records, &sources)?;
    temp.as_file()
        .sync_all()
        .map_err(|e| Error::write_failed(target, format!("sync failed: {}", e)))?;

    verify(target, temp.path(), &records)?;
    preserve_permissions(target, temp.as_file());

    debug!(
        "Staged {} record(s) for {} at {}",
        records.len(),
        target.display(),
        temp.path().display()
    );
    Ok(StagedContainer {
        target: target.clone(),
        temp,
        records,
    })
}

/// Apply a plan.
///
/// All container writes are staged before anything is committed, so a
/// failure while staging leaves every file as found.
pub fn apply(plan: &MutationPlan, ctx: &WriteContext<'_>) -> Result<ApplyReport> {
    if plan.is_empty() {
        return Ok(ApplyReport::default());
    }
    let locks = lock::acquire_all(&plan.touched_paths())?;
    let result = stage_and_commit(plan, ctx);
    if result.is_err() {
        lock::discard_all(locks);
    }
    result
}

fn stage_and_commit(plan: &MutationPlan, ctx: &WriteContext<'_>) -> Result<ApplyReport> {
    let mut report = ApplyReport::default();
    let mut staged = VecDeque::new();
    for step in plan.steps() {
        match step {
            PlanStep::Write(write) => staged.push_back(stage(write)?),
            PlanStep::Relocate { to, replace: false, .. } if to.exists() => {
                return Err(Error::ConflictUnresolved {
                    destination: to.clone(),
                    message: "the destination appeared after conflicts were resolved".to_string(),
                });
            }
            _ => {}
        }
    }

    let mut committed = 0usize;
    for step in plan.steps() {
        let result = match step {
            PlanStep::Write(write) => match staged.pop_front() {
                Some(staged) => staged.commit().map(|path| report.written.push(path)),
                None => Err(Error::write_failed(&write.container, "write was not staged")),
            },
            PlanStep::Relocate { from, to, .. } => {
                relocate(from, to).map(|()| report.relocated.push((from.clone(), to.clone())))
            }
            PlanStep::Dispose { container } => {
                dispose_container(ctx.trash, container, &ctx.protected_roots)
                    .map(|d| report.disposed.push(d))
            }
        };
        if let Err(e) = result {
            if committed == 0 || e.is_partial() {
                return Err(e);
            }
            let path = match step {
                PlanStep::Write(write) => write.container.clone(),
                PlanStep::Relocate { from, .. } => from.clone(),
                PlanStep::Dispose { container } => container.clone(),
            };
            return Err(Error::WriteFailedPartial {
                path,
                message: format!("{} earlier step(s) were already committed: {}", committed, e),
                recovery: None,
            });
        }
        committed += 1;
    }

    info!(
        "Applied plan: {} written, {} relocated, {} disposed",
        report.written.len(),
        report.relocated.len(),
        report.disposed.len()
    );
    Ok(report)
}

/// Atomically replace an arbitrary file with `bytes`.
pub fn replace_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = parent_dir(path);
    fs::create_dir_all(dir)
        .map_err(|e| Error::write_failed(path, format!("cannot create folder: {}", e)))?;
    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)
        .map_err(|e| Error::write_failed(path, format!("cannot create temporary file: {}", e)))?;
    temp.write_all(bytes)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|e| Error::write_failed(path, e.to_string()))?;
    preserve_permissions(path, temp.as_file());
    persist(temp, path)
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn persist(temp: NamedTempFile, target: &Path) -> Result<()> {
    match temp.persist(target) {
        Ok(_) => {
            sync_dir(parent_dir(target));
            Ok(())
        }
        Err(e) => {
            let recovery = e.file.keep().ok().map(|(_, path)| path);
            Err(Error::WriteFailedPartial {
                path: target.to_path_buf(),
                message: format!("replacing the original failed: {}", e.error),
                recovery,
            })
        }
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        debug!("Could not sync directory {}: {}", dir.display(), e);
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

/// Give the temp file the original's permissions, or regular file
/// permissions when there is no original (temp files start out as 0600).
fn preserve_permissions(original: &Path, temp: &File) {
    let permissions = match fs::metadata(original) {
        Ok(metadata) => metadata.permissions(),
        Err(_) => match new_file_permissions() {
            Some(permissions) => permissions,
            None => return,
        },
    };
    if let Err(e) = temp.set_permissions(permissions) {
        warn!("Could not set permissions for {}: {}", original.display(), e);
    }
}

#[cfg(unix)]
fn new_file_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<fs::Permissions> {
    None
}

fn apply_edits(write: &ContainerWrite) -> Result<Vec<PendingRecord>> {
    let mut pending: Vec<PendingRecord> = if write.create {
        Vec::new()
    } else {
        let current = container::open(&write.container)?;
        current
            .records()
            .iter()
            .map(|record| PendingRecord {
                source: existing_source(&current, record),
                record: record.clone(),
            })
            .collect()
    };
    let mut origins: HashMap<PathBuf, Container> = HashMap::new();

    for edit in &write.edits {
        match edit {
            Edit::SetDisplayName { record, name } => {
                asset_meta(write, &mut pending, record.as_str())?.display_name = name.clone();
            }
            Edit::SetTags { record, tags } => {
                asset_meta(write, &mut pending, record.as_str())?.tags = tags.clone();
            }
            Edit::SetCatalog { record, catalog } => {
                asset_meta(write, &mut pending, record.as_str())?.catalog_id = *catalog;
            }
            Edit::SetMetadata { record, patch } => {
                patch.apply(asset_meta(write, &mut pending, record.as_str())?);
            }
            Edit::Remove { record } => {
                let position = find(write, &pending, record.as_str())?;
                pending.remove(position);
            }
            Edit::Insert { record, source } => {
                if pending.iter().any(|p| p.record.id == record.id) {
                    return Err(Error::invalid(format!(
                        "record '{}' already exists in {}",
                        record.id,
                        write.container.display()
                    )));
                }
                let mut record = record.clone();
                let source = insert_source(&write.container, &mut origins, &mut record, source)?;
                pending.push(PendingRecord { record, source });
            }
        }
    }
    Ok(pending)
}

fn existing_source(container: &Container, record: &Record) -> PayloadSource {
    match record.payload {
        PayloadSlot::Embedded { offset, len } => PayloadSource::Slot {
            file: container.path().to_path_buf(),
            offset: container.payload_base() + offset,
            len,
        },
        PayloadSlot::External { .. } => PayloadSource::Link,
    }
}

fn insert_source(
    target: &Path,
    origins: &mut HashMap<PathBuf, Container>,
    record: &mut Record,
    source: &InsertSource,
) -> Result<PayloadSource> {
    match source {
        InsertSource::Container { path, id } => {
            if !origins.contains_key(path) {
                origins.insert(path.clone(), container::open(path)?);
            }
            let origin = origins
                .get(path)
                .ok_or_else(|| Error::ContainerNotFound { path: path.clone() })?;
            let original = origin.require(id.as_str())?;
            match &original.payload {
                PayloadSlot::Embedded { .. } => Ok(existing_source(origin, original)),
                PayloadSlot::External { path: link } => {
                    embed_file(target, &origin.resolve_external(link))
                }
            }
        }
        InsertSource::Bytes(bytes) => Ok(PayloadSource::Bytes(bytes.clone())),
        InsertSource::EmbedFile(path) => embed_file(target, path),
        InsertSource::Link(path) => {
            record.payload = PayloadSlot::External { path: path.clone() };
            Ok(PayloadSource::Link)
        }
    }
}

fn embed_file(target: &Path, path: &Path) -> Result<PayloadSource> {
    let metadata = fs::metadata(path).map_err(|e| {
        Error::write_failed(
            target,
            format!("external payload {} cannot be embedded: {}", path.display(), e),
        )
    })?;
    Ok(PayloadSource::File {
        path: path.to_path_buf(),
        len: metadata.len(),
    })
}

fn find(write: &ContainerWrite, pending: &[PendingRecord], id: &str) -> Result<usize> {
    pending
        .iter()
        .position(|p| p.record.id.as_str() == id)
        .ok_or_else(|| Error::RecordNotFound {
            container: write.container.clone(),
            id: id.to_string(),
        })
}

fn asset_meta<'a>(
    write: &ContainerWrite,
    pending: &'a mut [PendingRecord],
    id: &str,
) -> Result<&'a mut AssetMetadata> {
    let position = find(write, pending, id)?;
    pending[position]
        .record
        .asset
        .as_mut()
        .ok_or_else(|| Error::invalid(format!("record '{}' is not an asset", id)))
}

fn check_references(target: &Path, pending: &[PendingRecord]) -> Result<()> {
    let ids: std::collections::HashSet<&str> =
        pending.iter().map(|p| p.record.id.as_str()).collect();
    for p in pending {
        if let Some(missing) = p.record.refs.iter().find(|r| !ids.contains(r.as_str())) {
            return Err(Error::invalid(format!(
                "writing {} would leave '{}' referencing missing record '{}'",
                target.display(),
                p.record.id,
                missing
            )));
        }
    }
    Ok(())
}

/// Assign payload slots in table order.
fn layout(pending: Vec<PendingRecord>) -> (Vec<Record>, Vec<PayloadSource>) {
    let mut offset = 0u64;
    pending
        .into_iter()
        .map(|PendingRecord { mut record, source }| {
            if let Some(len) = source.len() {
                record.payload = PayloadSlot::Embedded { offset, len };
                offset += len;
            }
            (record, source)
        })
        .unzip()
}

fn write_contents(
    target: &Path,
    file: &mut File,
    records: &[Record],
    sources: &[PayloadSource],
) -> Result<()> {
    let io_error = |e: io::Error| Error::write_failed(target, e.to_string());
    let mut out = BufWriter::new(file);
    out.write_all(format::header_line(FORMAT_VERSION).as_bytes())
        .map_err(io_error)?;
    out.write_all(format::table_line(records)?.as_bytes())
        .map_err(io_error)?;

    let mut handles: HashMap<PathBuf, File> = HashMap::new();
    for (record, source) in records.iter().zip(sources) {
        let copied = match source {
            PayloadSource::Link => continue,
            PayloadSource::Bytes(bytes) => {
                out.write_all(bytes).map_err(io_error)?;
                bytes.len() as u64
            }
            PayloadSource::Slot { file, offset, len } => {
                if !handles.contains_key(file) {
                    let handle = File::open(file).map_err(io_error)?;
                    handles.insert(file.clone(), handle);
                }
                let handle = handles
                    .get_mut(file)
                    .ok_or_else(|| Error::write_failed(target, "source file handle missing"))?;
                handle.seek(SeekFrom::Start(*offset)).map_err(io_error)?;
                io::copy(&mut Read::by_ref(handle).take(*len), &mut out).map_err(io_error)?
            }
            PayloadSource::File { path, len } => {
                let handle = File::open(path).map_err(io_error)?;
                io::copy(&mut handle.take(*len), &mut out).map_err(io_error)?
            }
        };
        if Some(copied) != source.len() {
            return Err(Error::write_failed(
                target,
                format!("payload of '{}' is shorter than expected", record.id),
            ));
        }
    }
    out.flush().map_err(io_error)?;
    Ok(())
}

fn verify(target: &Path, temp: &Path, expected: &[Record]) -> Result<()> {
    let reread = container::open(temp)
        .map_err(|e| Error::write_failed(target, format!("verification failed: {}", e)))?;
    if reread.records() != expected {
        return Err(Error::write_failed(
            target,
            "verification failed: record table differs from what was written",
        ));
    }
    Ok(())
}

/// Rename a container in place, taking its preview images along.
fn relocate(from: &Path, to: &Path) -> Result<()> {
    let thumbnails = companion_thumbnails(from);
    fs::rename(from, to).map_err(|e| {
        Error::write_failed(from, format!("cannot rename to {}: {}", to.display(), e))
    })?;
    sync_dir(parent_dir(to));
    info!("Renamed {} to {}", from.display(), to.display());

    let Some(stem) = to.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
        return Ok(());
    };
    for thumbnail in thumbnails {
        let Some(ext) = thumbnail.extension().map(|e| e.to_string_lossy().into_owned()) else {
            continue;
        };
        let renamed = to.with_file_name(format!("{}.{}", stem, ext));
        if renamed.exists() {
            warn!("Leaving preview {} in place: {} exists", thumbnail.display(), renamed.display());
            continue;
        }
        if let Err(e) = fs::rename(&thumbnail, &renamed) {
            warn!("Could not rename preview {}: {}", thumbnail.display(), e);
        }
    }
    Ok(())
}
