//! Mutation Planner
//!
//! Turns a requested operation, a container snapshot and a classification into
//! an ordered [`MutationPlan`]. Planning is pure: it reads nothing from disk
//! and writes nothing. Conflicts and catalog identifiers are resolved by the
//! caller beforehand and handed in.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::graph::Classification;
use crate::container::{AssetMetadata, Container, Record, RecordId};
use crate::error::{Error, Result};
use crate::naming::dotted_increment;

/// Partial update of the free-form asset metadata fields.
///
/// `None` leaves a field untouched; `Some("")` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataPatch {
    pub description: Option<String>,
    pub author: Option<String>,
    pub license: Option<String>,
    pub copyright: Option<String>,
}

impl MetadataPatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.author.is_none()
            && self.license.is_none()
            && self.copyright.is_none()
    }

    /// Apply to `meta`, returning whether anything changed.
    pub fn apply(&self, meta: &mut AssetMetadata) -> bool {
        let mut changed = false;
        for (value, field) in [
            (&self.description, &mut meta.description),
            (&self.author, &mut meta.author),
            (&self.license, &mut meta.license),
            (&self.copyright, &mut meta.copyright),
        ] {
            if let Some(value) = value {
                let value = value.trim();
                if field.as_str() != value {
                    *field = value.to_string();
                    changed = true;
                }
            }
        }
        changed
    }
}

/// Parse tags: split on commas, trim, drop empties and duplicates.
///
/// First occurrence wins, so order is preserved.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    tags.into_iter()
        .flat_map(|tag| {
            tag.as_ref()
                .split(',')
                .map(|t| t.trim().to_string())
                .collect::<Vec<_>>()
        })
        .filter(|tag| !tag.is_empty() && seen.insert(tag.clone()))
        .collect()
}

/// Where an inserted record's payload comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertSource {
    /// Copy the payload of a record in another container; external links are
    /// embedded
    Container { path: PathBuf, id: RecordId },
    /// In-memory bytes
    Bytes(Vec<u8>),
    /// Read and embed a file
    EmbedFile(PathBuf),
    /// Keep an external link as given
    Link(PathBuf),
}

/// One change applied to a container's record table.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    SetDisplayName { record: RecordId, name: String },
    SetTags { record: RecordId, tags: Vec<String> },
    SetCatalog { record: RecordId, catalog: Option<Uuid> },
    SetMetadata { record: RecordId, patch: MetadataPatch },
    Remove { record: RecordId },
    /// Append a record; its payload slot is assigned on write
    Insert { record: Record, source: InsertSource },
}

impl fmt::Display for Edit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edit::SetDisplayName { record, name } => write!(f, "rename {} to '{}'", record, name),
            Edit::SetTags { record, tags } => {
                write!(f, "set tags of {} to [{}]", record, tags.join(", "))
            }
            Edit::SetCatalog {
                record,
                catalog: Some(id),
            } => write!(f, "file {} under catalog {}", record, id),
            Edit::SetCatalog {
                record,
                catalog: None,
            } => write!(f, "unassign catalog of {}", record),
            Edit::SetMetadata { record, .. } => write!(f, "update metadata of {}", record),
            Edit::Remove { record } => write!(f, "remove {}", record),
            Edit::Insert {
                record,
                source: InsertSource::Container { id, .. },
            } if &record.id != id => {
                write!(f, "insert {} (from {})", record.id, id)
            }
            Edit::Insert { record, .. } => write!(f, "insert {}", record.id),
        }
    }
}

/// Edits targeting one container file.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerWrite {
    pub container: PathBuf,
    /// Start from an empty record table instead of the current file
    pub create: bool,
    /// With `create`, an existing file at the path may be replaced
    pub replace: bool,
    pub edits: Vec<Edit>,
}

/// One step of a plan, executed in order.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    Write(ContainerWrite),
    /// Rename a container file in place
    Relocate { from: PathBuf, to: PathBuf, replace: bool },
    /// Hand a container that would be left empty to the trash
    Dispose { container: PathBuf },
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStep::Write(write) => {
                let verb = match (write.create, write.replace) {
                    (true, true) => "replace",
                    (true, false) => "create",
                    _ => "rewrite",
                };
                write!(f, "{} {}", verb, write.container.display())?;
                for edit in &write.edits {
                    write!(f, "\n    {}", edit)?;
                }
                Ok(())
            }
            PlanStep::Relocate { from, to, replace } => {
                write!(f, "move {} to {}", from.display(), to.display())?;
                if *replace {
                    f.write_str(" (replacing existing file)")?;
                }
                Ok(())
            }
            PlanStep::Dispose { container } => write!(f, "move {} to trash", container.display()),
        }
    }
}

/// Ordered, side-effect free description of a mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationPlan {
    steps: Vec<PlanStep>,
}

impl MutationPlan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Every container path the plan reads or writes, sorted and deduplicated.
    pub fn touched_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = Vec::new();
        for step in &self.steps {
            match step {
                PlanStep::Write(write) => {
                    paths.push(write.container.clone());
                    for edit in &write.edits {
                        if let Edit::Insert {
                            source: InsertSource::Container { path, .. },
                            ..
                        } = edit
                        {
                            paths.push(path.clone());
                        }
                    }
                }
                PlanStep::Relocate { from, to, .. } => {
                    paths.push(from.clone());
                    paths.push(to.clone());
                }
                PlanStep::Dispose { container } => paths.push(container.clone()),
            }
        }
        paths.sort();
        paths.dedup();
        paths
    }
}

impl fmt::Display for MutationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("nothing to do");
        }
        for (number, step) in self.steps.iter().enumerate() {
            if number > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}. {}", number + 1, step)?;
        }
        Ok(())
    }
}

fn target_meta<'a>(
    container: &'a Container,
    classification: &Classification,
) -> Result<&'a AssetMetadata> {
    let record = container.require_asset(classification.target().as_str())?;
    record
        .asset
        .as_ref()
        .ok_or_else(|| Error::invalid(format!("record '{}' is not an asset", record.id)))
}

fn single_write(container: &Container, edit: Edit) -> MutationPlan {
    MutationPlan::new(vec![PlanStep::Write(ContainerWrite {
        container: container.path().to_path_buf(),
        create: false,
        replace: false,
        edits: vec![edit],
    })])
}

/// Change the target's display name.
///
/// With `relocate_to` the container file is renamed as well; the payload
/// datum's own name is never touched. An unchanged name yields an empty plan.
pub fn rename(
    container: &Container,
    classification: &Classification,
    new_name: &str,
    relocate_to: Option<(&Path, bool)>,
) -> Result<MutationPlan> {
    let new_name = new_name.trim();
    if new_name.is_empty() {
        return Err(Error::invalid("asset name cannot be empty"));
    }
    let meta = target_meta(container, classification)?;
    if meta.display_name == new_name {
        return Ok(MutationPlan::default());
    }

    let mut plan = single_write(
        container,
        Edit::SetDisplayName {
            record: classification.target().clone(),
            name: new_name.to_string(),
        },
    );
    if let Some((to, replace)) = relocate_to {
        if to != container.path() {
            plan.steps.push(PlanStep::Relocate {
                from: container.path().to_path_buf(),
                to: to.to_path_buf(),
                replace,
            });
        }
    }
    Ok(plan)
}

/// Replace the target's tag list with the normalized `tags`.
pub fn retag(
    container: &Container,
    classification: &Classification,
    tags: &[String],
) -> Result<MutationPlan> {
    let meta = target_meta(container, classification)?;
    let tags = normalize_tags(tags);
    if meta.tags == tags {
        return Ok(MutationPlan::default());
    }
    Ok(single_write(
        container,
        Edit::SetTags {
            record: classification.target().clone(),
            tags,
        },
    ))
}

/// Point the target at another catalog without moving any file.
pub fn recatalog(
    container: &Container,
    classification: &Classification,
    catalog: Option<Uuid>,
) -> Result<MutationPlan> {
    let meta = target_meta(container, classification)?;
    if meta.catalog_id == catalog {
        return Ok(MutationPlan::default());
    }
    Ok(single_write(
        container,
        Edit::SetCatalog {
            record: classification.target().clone(),
            catalog,
        },
    ))
}

/// Update description, author, license or copyright.
pub fn edit_metadata(
    container: &Container,
    classification: &Classification,
    patch: &MetadataPatch,
) -> Result<MutationPlan> {
    if patch.is_empty() {
        return Err(Error::invalid("no metadata fields to change"));
    }
    let meta = target_meta(container, classification)?;
    if !patch.apply(&mut meta.clone()) {
        return Ok(MutationPlan::default());
    }
    Ok(single_write(
        container,
        Edit::SetMetadata {
            record: classification.target().clone(),
            patch: patch.clone(),
        },
    ))
}

fn ensure_target_removable(
    container: &Container,
    classification: &Classification,
    action: &str,
) -> Result<()> {
    if classification.is_target_shared() {
        return Err(Error::invalid(format!(
            "cannot {} '{}': another asset in {} depends on it",
            action,
            classification.target(),
            container.path().display()
        )));
    }
    Ok(())
}

/// Step removing the exclusive records from the source, or disposing of the
/// whole file when nothing would remain.
fn removal_step(container: &Container, classification: &Classification) -> PlanStep {
    let removed: Vec<RecordId> = classification.exclusive().cloned().collect();
    if removed.len() == container.len() {
        return PlanStep::Dispose {
            container: container.path().to_path_buf(),
        };
    }
    PlanStep::Write(ContainerWrite {
        container: container.path().to_path_buf(),
        create: false,
        replace: false,
        edits: removed.into_iter().map(|record| Edit::Remove { record }).collect(),
    })
}

/// Remove the target and its exclusive dependencies.
///
/// Shared dependencies stay. When no record would remain the container file
/// is disposed of instead of being rewritten empty.
pub fn delete(container: &Container, classification: &Classification) -> Result<MutationPlan> {
    ensure_target_removable(container, classification, "delete")?;
    Ok(MutationPlan::new(vec![removal_step(container, classification)]))
}

/// Ids and payload names already present in a destination container.
#[derive(Debug, Default)]
struct Occupancy {
    ids: HashSet<String>,
    names: HashSet<(String, String)>,
}

impl Occupancy {
    fn extend<'a>(&mut self, records: impl IntoIterator<Item = &'a Record>) {
        for record in records {
            self.ids.insert(record.id.to_string());
            self.names.insert((record.kind.to_string(), record.name.clone()));
        }
    }

    /// Reserve an id and payload name for `record`, suffixing `.001`,
    /// `.002`, ... on collision. Renames the payload in place and returns
    /// the new id.
    fn claim(&mut self, record: &mut Record) -> RecordId {
        let id = dotted_increment(record.id.as_str(), |candidate| self.ids.contains(candidate));
        self.ids.insert(id.clone());

        let kind = record.kind.to_string();
        let name = dotted_increment(&record.name, |candidate| {
            self.names.contains(&(kind.clone(), candidate.to_string()))
        });
        self.names.insert((kind, name.clone()));
        record.name = name;
        RecordId::new(id)
    }
}

/// Insert edits copying `ids` out of `container` with reference edges
/// remapped.
///
/// `remap` holds the ids already copied from this container; those records
/// are not copied a second time.
fn copy_closure<'a>(
    container: &Container,
    ids: impl IntoIterator<Item = &'a RecordId>,
    occupancy: &mut Occupancy,
    remap: &mut HashMap<RecordId, RecordId>,
) -> Result<Vec<Edit>> {
    let mut copies = Vec::new();
    for id in ids {
        if remap.contains_key(id) {
            continue;
        }
        let mut record = container.require(id.as_str())?.clone();
        let new_id = occupancy.claim(&mut record);
        remap.insert(id.clone(), new_id);
        copies.push(record);
    }

    let renamed = |id: &RecordId| remap.get(id).cloned().unwrap_or_else(|| id.clone());
    Ok(copies
        .into_iter()
        .map(|mut record| {
            let source_id = record.id.clone();
            record.id = renamed(&source_id);
            record.refs = record.refs.iter().map(renamed).collect();
            Edit::Insert {
                record,
                source: InsertSource::Container {
                    path: container.path().to_path_buf(),
                    id: source_id,
                },
            }
        })
        .collect())
}

/// Destination of a transfer.
#[derive(Debug, Clone, Copy)]
pub enum TransferDestination<'a> {
    /// Create (or replace, when `replace` is set) the container at `path`
    New { path: &'a Path, replace: bool },
    /// Append to an existing container
    Existing(&'a Container),
}

/// Copy the target and its full closure into a destination container, then
/// remove the target and its exclusive dependencies from the source.
///
/// Shared dependencies are copied and also stay in the source. When records
/// collide with the destination's, the incoming ids and payload names get a
/// `.001`-style suffix and every reference edge is remapped.
pub fn transfer(
    container: &Container,
    classification: &Classification,
    destination: TransferDestination<'_>,
    catalog: Option<Uuid>,
) -> Result<MutationPlan> {
    ensure_target_removable(container, classification, "move")?;

    let (dest_path, replace, existing) = match destination {
        TransferDestination::New { path, replace } => (path.to_path_buf(), replace, None),
        TransferDestination::Existing(dest) => (dest.path().to_path_buf(), false, Some(dest)),
    };
    if dest_path == container.path() {
        return Err(Error::invalid(format!(
            "'{}' is already in {}",
            classification.target(),
            container.path().display()
        )));
    }

    let mut occupancy = Occupancy::default();
    if let Some(dest) = existing {
        occupancy.extend(dest.records());
    }
    let mut remap = HashMap::new();
    let edits = copy_closure(container, classification.reachable(), &mut occupancy, &mut remap)?
        .into_iter()
        .map(|mut edit| {
            if let Edit::Insert {
                record,
                source: InsertSource::Container { id, .. },
            } = &mut edit
            {
                if *id == *classification.target() {
                    if let Some(meta) = record.asset.as_mut() {
                        meta.catalog_id = catalog;
                    }
                }
            }
            edit
        })
        .collect();

    Ok(MutationPlan::new(vec![
        PlanStep::Write(ContainerWrite {
            container: dest_path,
            create: existing.is_none(),
            replace,
            edits,
        }),
        removal_step(container, classification),
    ]))
}

/// One asset to bundle, with its classification.
#[derive(Debug, Clone, Copy)]
pub struct BundleSource<'a> {
    pub container: &'a Container,
    pub classification: &'a Classification,
}

/// Copy several assets with their full closures into one new container.
///
/// Sources are left untouched. A record reachable from two bundled assets
/// of the same container is copied once; records from different containers
/// whose ids or payload names collide get a `.001`-style suffix.
pub fn bundle(sources: &[BundleSource<'_>], destination: &Path) -> Result<MutationPlan> {
    if sources.is_empty() {
        return Err(Error::invalid("no assets to bundle"));
    }
    if let Some(source) = sources.iter().find(|s| s.container.path() == destination) {
        return Err(Error::invalid(format!(
            "cannot bundle into the source container {}",
            source.container.path().display()
        )));
    }

    let mut occupancy = Occupancy::default();
    let mut remaps: HashMap<&Path, HashMap<RecordId, RecordId>> = HashMap::new();
    let mut edits = Vec::new();
    for source in sources {
        let remap = remaps.entry(source.container.path()).or_default();
        edits.extend(copy_closure(
            source.container,
            source.classification.reachable(),
            &mut occupancy,
            remap,
        )?);
    }

    Ok(MutationPlan::new(vec![PlanStep::Write(ContainerWrite {
        container: destination.to_path_buf(),
        create: true,
        replace: false,
        edits,
    })]))
}
