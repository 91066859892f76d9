//! Orchestrator for single-asset operations
//!
//! Coordinates reading, classification, conflict and catalog resolution,
//! planning, writing and catalog sync. [`Engine::prepare`] stops before the
//! first write, which is how dry runs are produced.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::conflict::{self, ConflictDecision, Resolution};
use super::graph::{self, Classification};
use super::plan::{self, MutationPlan, TransferDestination};
use super::sync::{self, CatalogResolution};
use super::trash::{Trash, TrashDir};
use super::write::{self, ApplyReport, WriteContext};
use super::{Operation, OperationKind, OperationReport, OperationRequest, Outcome};
use crate::config::{EngineConfig, NamingConfig};
use crate::container::{self, AssetMetadata, Container, RecordId};
use crate::defaults::default_trash_dir;
use crate::error::{Error, Result};
use crate::naming::{
    build_asset_filename_today, container_file_name, sanitize_name, MAX_NAME_LENGTH,
};

/// Entry point for mutations.
///
/// Holds the explicitly passed configuration and the trash collaborator; it
/// keeps no other state between operations.
pub struct Engine {
    config: EngineConfig,
    trash: Box<dyn Trash>,
}

impl Engine {
    pub fn new(config: EngineConfig, trash: Box<dyn Trash>) -> Self {
        Self { config, trash }
    }

    /// Engine using the configured trash folder, or the platform default.
    pub fn with_default_trash(config: EngineConfig) -> Self {
        let root = config.trash_dir.clone().unwrap_or_else(default_trash_dir);
        Self::new(config, Box::new(TrashDir::new(root)))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run an operation end to end.
    pub fn execute(&self, request: &OperationRequest) -> Result<Outcome> {
        let prepared = self.prepare(request)?;
        self.apply(prepared)
    }

    /// Plan an operation without changing anything on disk.
    pub fn prepare(&self, request: &OperationRequest) -> Result<PreparedOperation> {
        let container = container::open(std::path::absolute(&request.container)?)?;
        let target = container.resolve_asset(&request.target)?.id.clone();
        let classification = graph::classify(&container, target.as_str())?;
        debug!(
            "{} '{}': {} reachable, {} shared",
            request.operation.kind(),
            target,
            classification.reachable().count(),
            classification.shared().count()
        );

        let mut prepared = PreparedOperation::new(request.operation.kind(), &container, target);
        match &request.operation {
            Operation::Rename { new_name } => {
                self.prepare_rename(
                    &container,
                    &classification,
                    new_name,
                    request.conflict,
                    &mut prepared,
                )?
            }
            Operation::Retag { tags } => {
                prepared.plan = plan::retag(&container, &classification, tags)?
            }
            Operation::EditMetadata { patch } => {
                prepared.plan = plan::edit_metadata(&container, &classification, patch)?
            }
            Operation::Delete => {
                prepared.plan = plan::delete(&container, &classification)?;
                prepared.removed = classification.exclusive().cloned().collect();
            }
            Operation::Recatalog { catalog } => {
                let library = self.config.library_containing(container.path()).ok_or_else(|| {
                    Error::invalid(format!(
                        "{} is not inside any configured library",
                        container.path().display()
                    ))
                })?;
                let resolution = sync::resolve(&library, catalog)?;
                let misplaced = sync::misplaced(
                    &self.config,
                    &library,
                    container.path(),
                    resolution.catalog_path(),
                );
                match misplaced {
                    Some(dir) if container.asset_count() == 1 => {
                        debug!("Catalog folders are mirrored; moving to {}", dir.display());
                        self.prepare_transfer(
                            &container,
                            &classification,
                            &dir,
                            resolution,
                            request.conflict,
                            &mut prepared,
                        )?;
                    }
                    _ => {
                        prepared.plan =
                            plan::recatalog(&container, &classification, resolution.id())?;
                        prepared.catalog = Some(resolution);
                    }
                }
            }
            Operation::Move {
                library,
                catalog,
                into,
            } => {
                let library = self.config.library(library)?;
                match into {
                    Some(path) => {
                        let destination = container::open(std::path::absolute(path)?)?;
                        let containing = self.config.library_containing(destination.path());
                        if containing.as_ref().map(|l| l.name()) != Some(library.name()) {
                            return Err(Error::invalid(format!(
                                "{} is not inside library '{}'",
                                destination.path().display(),
                                library.name()
                            )));
                        }
                        let resolution = sync::resolve(&library, catalog)?;
                        prepared.plan = plan::transfer(
                            &container,
                            &classification,
                            TransferDestination::Existing(&destination),
                            resolution.id(),
                        )?;
                        prepared.location = destination.path().to_path_buf();
                        prepared.removed = classification.exclusive().cloned().collect();
                        prepared.copied = classification.reachable().cloned().collect();
                        prepared.catalog = Some(resolution);
                    }
                    None => {
                        let resolution = sync::resolve(&library, catalog)?;
                        let dir = sync::destination_dir(
                            &self.config,
                            &library,
                            resolution.catalog_path(),
                        );
                        self.prepare_transfer(
                            &container,
                            &classification,
                            &dir,
                            resolution,
                            request.conflict,
                            &mut prepared,
                        )?;
                    }
                }
            }
        }
        Ok(prepared)
    }

    /// Execute a prepared operation.
    pub fn apply(&self, prepared: PreparedOperation) -> Result<Outcome> {
        if let Some(destination) = prepared.skipped {
            info!("Skipped '{}': {} already exists", prepared.target, destination.display());
            return Ok(Outcome::Skipped {
                target: prepared.target,
                destination,
            });
        }
        if prepared.plan.is_empty() {
            debug!("'{}' already matches the request", prepared.target);
            return Ok(Outcome::Unchanged {
                target: prepared.target,
                container: prepared.source,
            });
        }

        let applied = write::apply(&prepared.plan, &self.write_context())?;
        let catalogs_created = commit_catalog(prepared.catalog)?;
        let needs_cleanup = flag_cleanup(&applied);

        let location = applied
            .relocated
            .iter()
            .find(|(from, _)| from == &prepared.location)
            .map(|(_, to)| to.clone())
            .unwrap_or(prepared.location);
        info!(
            "{} '{}' in {} done",
            prepared.kind,
            prepared.target,
            prepared.source.display()
        );
        Ok(Outcome::Applied(OperationReport {
            kind: prepared.kind,
            target: prepared.target,
            source: prepared.source,
            location,
            removed: prepared.removed,
            copied: prepared.copied,
            catalogs_created,
            disposed: applied.disposed,
            needs_cleanup,
        }))
    }

    pub(crate) fn write_context(&self) -> WriteContext<'_> {
        WriteContext {
            trash: self.trash.as_ref(),
            protected_roots: self
                .config
                .all_libraries()
                .iter()
                .map(|library| library.root().to_path_buf())
                .collect(),
        }
    }

    pub(crate) fn resolve_destination(
        &self,
        desired: &Path,
        decision: Option<ConflictDecision>,
    ) -> Result<Resolution> {
        let resolution = conflict::resolve(desired, self.config.conflict_policy, decision)?;
        if let Resolution::Use(path) = &resolution {
            if path != desired {
                info!("{} exists, using {}", desired.display(), path.display());
            }
        }
        Ok(resolution)
    }

    fn prepare_rename(
        &self,
        container: &Container,
        classification: &Classification,
        new_name: &str,
        decision: Option<ConflictDecision>,
        prepared: &mut PreparedOperation,
    ) -> Result<()> {
        let meta = target_meta(container, classification)?;
        let new_name = new_name.trim();
        let follows_name = self.config.sync_filenames
            && container.asset_count() == 1
            && filename_tracks_name(container.path(), &meta.display_name, &self.config.naming);

        let mut relocation = None;
        if follows_name && !new_name.is_empty() && new_name != meta.display_name {
            let stem = build_asset_filename_today(new_name, &self.config.naming);
            let desired = container.path().with_file_name(container_file_name(&stem));
            if desired != container.path() {
                match self.resolve_destination(&desired, decision)? {
                    Resolution::Skip => {
                        prepared.skipped = Some(desired);
                        return Ok(());
                    }
                    Resolution::Use(path) => relocation = Some((path, false)),
                    Resolution::Overwrite(path) => relocation = Some((path, true)),
                }
            }
        }

        prepared.plan = plan::rename(
            container,
            classification,
            new_name,
            relocation.as_ref().map(|(path, replace)| (path.as_path(), *replace)),
        )?;
        Ok(())
    }

    /// Move the target into a fresh container in `dir`, named after the asset.
    fn prepare_transfer(
        &self,
        container: &Container,
        classification: &Classification,
        dir: &Path,
        resolution: CatalogResolution,
        decision: Option<ConflictDecision>,
        prepared: &mut PreparedOperation,
    ) -> Result<()> {
        let meta = target_meta(container, classification)?;
        let stem = build_asset_filename_today(&meta.display_name, &self.config.naming);
        let desired = dir.join(container_file_name(&stem));

        if desired == container.path() {
            prepared.plan = plan::recatalog(container, classification, resolution.id())?;
            prepared.catalog = Some(resolution);
            return Ok(());
        }

        let (path, replace) = match self.resolve_destination(&desired, decision)? {
            Resolution::Skip => {
                prepared.skipped = Some(desired);
                return Ok(());
            }
            Resolution::Use(path) => (path, false),
            Resolution::Overwrite(path) => (path, true),
        };
        prepared.plan = plan::transfer(
            container,
            classification,
            TransferDestination::New { path: &path, replace },
            resolution.id(),
        )?;
        prepared.location = path;
        prepared.removed = classification.exclusive().cloned().collect();
        prepared.copied = classification.reachable().cloned().collect();
        prepared.catalog = Some(resolution);
        Ok(())
    }
}

/// A planned operation, ready to apply or to show as a dry run.
#[derive(Debug)]
pub struct PreparedOperation {
    kind: OperationKind,
    target: RecordId,
    source: PathBuf,
    location: PathBuf,
    plan: MutationPlan,
    catalog: Option<CatalogResolution>,
    removed: Vec<RecordId>,
    copied: Vec<RecordId>,
    skipped: Option<PathBuf>,
}

impl PreparedOperation {
    fn new(kind: OperationKind, container: &Container, target: RecordId) -> Self {
        Self {
            kind,
            target,
            source: container.path().to_path_buf(),
            location: container.path().to_path_buf(),
            plan: MutationPlan::default(),
            catalog: None,
            removed: Vec::new(),
            copied: Vec::new(),
            skipped: None,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn target(&self) -> &RecordId {
        &self.target
    }

    pub fn plan(&self) -> &MutationPlan {
        &self.plan
    }

    /// Destination the conflict policy chose to skip, if any.
    pub fn skipped(&self) -> Option<&Path> {
        self.skipped.as_deref()
    }

    /// Catalog paths that applying would create.
    pub fn pending_catalogs(&self) -> Vec<&str> {
        self.catalog
            .iter()
            .flat_map(|resolution| resolution.pending())
            .map(|entry| entry.path.as_str())
            .collect()
    }

    pub fn is_noop(&self) -> bool {
        self.skipped.is_some() || self.plan.is_empty()
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

/// True when the container file is named after the asset, by the naming
/// convention or plainly sanitized.
fn filename_tracks_name(path: &Path, display_name: &str, naming: &NamingConfig) -> bool {
    let Some(stem) = path.file_stem().map(|s| s.to_string_lossy()) else {
        return false;
    };
    stem == build_asset_filename_today(display_name, naming)
        || stem == sanitize_name(display_name, MAX_NAME_LENGTH)
}

/// Append queued catalog entries once the containers are written.
pub(crate) fn commit_catalog(
    resolution: Option<CatalogResolution>,
) -> Result<Vec<crate::catalog::CatalogEntry>> {
    let Some(resolution) = resolution else {
        return Ok(Vec::new());
    };
    let catalog_file = resolution.catalog_file().to_path_buf();
    resolution.commit().map_err(|e| Error::WriteFailedPartial {
        path: catalog_file,
        message: format!("containers were written but the catalog definition file was not: {}", e),
        recovery: None,
    })
}

/// Written containers that no longer hold any asset.
pub(crate) fn flag_cleanup(applied: &ApplyReport) -> Vec<PathBuf> {
    applied
        .written
        .iter()
        .map(|path| {
            applied
                .relocated
                .iter()
                .find(|(from, _)| from == path)
                .map_or(path, |(_, to)| to)
        })
        .filter(|path| match container::open(path) {
            Ok(container) => container.needs_cleanup(),
            Err(e) => {
                warn!("Could not re-read {}: {}", path.display(), e);
                false
            }
        })
        .inspect(|path| warn!("{} has no assets left and needs cleanup", path.display()))
        .cloned()
        .collect()
}
