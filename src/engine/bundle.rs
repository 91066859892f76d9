//! Bundling
//!
//! Collects assets from any number of containers into one new container
//! outside the libraries, for sharing. Sources are only read: every asset is
//! copied with its full dependency closure and nothing is removed.
//!
//! With `copy_catalog`, the catalog definition file of each library the
//! assets come from is copied next to the bundle so catalog assignments
//! survive the trip.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::graph::{self, Classification};
use super::orchestrator::Engine;
use super::plan::{self, BundleSource, MutationPlan};
use super::{conflict, write};
use crate::container::{self, Container, RecordId};
use crate::defaults::CATALOG_FILENAME;
use crate::error::{Error, Result};
use crate::library::Library;
use crate::naming::{
    bundle_stem, container_file_name, sanitize_name, DEFAULT_BUNDLE_NAME, MAX_NAME_LENGTH,
};

/// One asset to put into a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleItem {
    pub container: PathBuf,
    /// Record id, or the display name of exactly one asset
    pub target: String,
}

/// Request to bundle assets into a new container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleRequest {
    pub items: Vec<BundleItem>,
    pub output_dir: PathBuf,
    /// Bundle name before the date is appended; defaults to `AssetBundle`
    pub name: Option<String>,
    pub copy_catalog: bool,
}

/// A planned bundle, ready for [`Engine::apply_bundle`].
#[derive(Debug)]
pub struct PreparedBundle {
    pub destination: PathBuf,
    /// Bundled asset ids, in request order, as they are named in the source
    pub assets: Vec<RecordId>,
    pub plan: MutationPlan,
    name: String,
    catalog_sources: Vec<PathBuf>,
}

/// Result of a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleOutcome {
    pub path: PathBuf,
    pub assets: usize,
    /// Catalog definition files written next to the bundle
    pub catalog_files: Vec<PathBuf>,
}

impl Engine {
    /// Bundle assets end to end.
    pub fn bundle(&self, request: &BundleRequest) -> Result<BundleOutcome> {
        let prepared = self.prepare_bundle(request)?;
        self.apply_bundle(prepared)
    }

    /// Plan a bundle without changing anything on disk.
    pub fn prepare_bundle(&self, request: &BundleRequest) -> Result<PreparedBundle> {
        if request.items.is_empty() {
            return Err(Error::invalid("no assets selected for bundling"));
        }

        let mut containers: Vec<Container> = Vec::new();
        let mut index: HashMap<PathBuf, usize> = HashMap::new();
        let mut selected: Vec<(usize, Classification)> = Vec::new();
        for item in &request.items {
            let path = std::path::absolute(&item.container)?;
            let slot = match index.get(&path) {
                Some(&slot) => slot,
                None => {
                    containers.push(container::open(&path)?);
                    index.insert(path, containers.len() - 1);
                    containers.len() - 1
                }
            };
            let target = containers[slot].resolve_asset(&item.target)?.id.clone();
            let classification = graph::classify(&containers[slot], target.as_str())?;
            debug!(
                "Bundling '{}' from {}: {} records",
                target,
                containers[slot].path().display(),
                classification.reachable().count()
            );
            selected.push((slot, classification));
        }

        let output_dir = std::path::absolute(&request.output_dir)?;
        if let Some(library) = self.config().library_containing(&output_dir) {
            warn!(
                "Bundling into {} inside library '{}'; the bundle will be listed as a container",
                output_dir.display(),
                library.name()
            );
        }

        let name = request
            .name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(DEFAULT_BUNDLE_NAME);
        let today = chrono::Local::now().date_naive();
        let desired = output_dir.join(container_file_name(&bundle_stem(name, today)));
        let destination = if desired.exists() {
            conflict::increment_path(&desired)?
        } else {
            desired
        };

        let sources: Vec<BundleSource<'_>> = selected
            .iter()
            .map(|(slot, classification)| BundleSource {
                container: &containers[*slot],
                classification,
            })
            .collect();
        let plan = plan::bundle(&sources, &destination)?;

        let catalog_sources = if request.copy_catalog {
            self.catalog_sources(&containers)
        } else {
            Vec::new()
        };

        Ok(PreparedBundle {
            destination,
            assets: selected.iter().map(|(_, c)| c.target().clone()).collect(),
            plan,
            name: name.to_string(),
            catalog_sources,
        })
    }

    /// Write a prepared bundle and copy the catalog files.
    ///
    /// A catalog file that cannot be copied is logged and skipped; the bundle
    /// itself is already complete at that point.
    pub fn apply_bundle(&self, prepared: PreparedBundle) -> Result<BundleOutcome> {
        write::apply(&prepared.plan, &self.write_context())?;
        info!(
            "Bundled {} assets into {}",
            prepared.assets.len(),
            prepared.destination.display()
        );

        let dir = prepared.destination.parent().unwrap_or_else(|| Path::new(""));
        let mut catalog_files = Vec::new();
        for source in &prepared.catalog_sources {
            match copy_catalog_file(source, dir, &prepared.name) {
                Ok(path) => {
                    info!("Copied catalog file to {}", path.display());
                    catalog_files.push(path);
                }
                Err(e) => warn!("Could not copy catalog file {}: {}", source.display(), e),
            }
        }

        Ok(BundleOutcome {
            path: prepared.destination,
            assets: prepared.assets.len(),
            catalog_files,
        })
    }

    /// Existing catalog files of the libraries holding `containers`.
    fn catalog_sources(&self, containers: &[Container]) -> Vec<PathBuf> {
        let mut libraries: Vec<Library> = Vec::new();
        for container in containers {
            match self.config().library_containing(container.path()) {
                Some(library) if !libraries.contains(&library) => libraries.push(library),
                Some(_) => {}
                None => debug!("{} is outside every library", container.path().display()),
            }
        }
        libraries
            .iter()
            .map(Library::catalog_path)
            .filter(|path| path.is_file())
            .collect()
    }
}

/// Copy `source` to `<name>.asset_catalogs.txt` in `dir`, incrementing on
/// collision.
fn copy_catalog_file(source: &Path, dir: &Path, name: &str) -> Result<PathBuf> {
    let stem = sanitize_name(name, MAX_NAME_LENGTH);
    let desired = dir.join(format!("{}.{}", stem, CATALOG_FILENAME));
    let destination = if desired.exists() {
        conflict::increment_path(&desired)?
    } else {
        desired
    };
    fs::copy(source, &destination)?;
    Ok(destination)
}
