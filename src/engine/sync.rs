//! Catalog Sync
//!
//! Keeps asset catalog assignments consistent with the library's catalog
//! definition file. Resolution happens before planning and only queues new
//! entries in memory; the file is appended to after the container write has
//! succeeded, so a failed mutation never leaves new catalogs behind.

use std::path::{Path, PathBuf};

use log::{debug, info};
use uuid::Uuid;

use super::lock::ContainerLock;
use crate::catalog::{CatalogEntry, CatalogFile, CatalogRef};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::library::Library;
use crate::naming::catalog_subdirectory;

/// A catalog reference resolved against one library.
#[derive(Debug, Clone)]
pub struct CatalogResolution {
    catalog: CatalogFile,
    id: Option<Uuid>,
    path: Option<String>,
}

impl CatalogResolution {
    /// Catalog id to store on the asset; `None` is Unassigned.
    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    /// Hierarchical path of the resolved catalog.
    pub fn catalog_path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Entries that will be appended on commit.
    pub fn pending(&self) -> &[CatalogEntry] {
        self.catalog.pending()
    }

    pub fn catalog_file(&self) -> &Path {
        self.catalog.path()
    }

    /// Append pending entries to the definition file.
    ///
    /// The file is re-read under its lock, so lines written since resolution
    /// are kept. Ancestors that appeared in the meantime are not added twice;
    /// the resolved catalog itself is always added so the id stored on the
    /// asset stays defined. Returns the entries that were created.
    pub fn commit(self) -> Result<Vec<CatalogEntry>> {
        if self.catalog.pending().is_empty() {
            return Ok(Vec::new());
        }
        let path = self.catalog.path().to_path_buf();
        let _lock = ContainerLock::acquire(&path).map_err(|e| match e {
            Error::ContainerLocked { .. } => Error::Catalog {
                path: path.clone(),
                message: "locked by another writer".to_string(),
            },
            other => other,
        })?;

        let mut current = CatalogFile::load(&path)?;
        let mut created = Vec::new();
        for entry in self.catalog.pending() {
            if current.find_by_id(&entry.id).is_some() {
                continue;
            }
            if Some(entry.id) != self.id && current.find_by_path(&entry.path).is_some() {
                debug!("Catalog '{}' was added meanwhile", entry.path);
                continue;
            }
            current.queue(entry.clone());
            created.push(entry.clone());
        }
        current.save()?;
        for entry in &created {
            info!("Created catalog '{}' ({})", entry.path, entry.id);
        }
        Ok(created)
    }
}

/// Resolve `reference` against `library`'s catalog definition file.
///
/// Unknown identifiers are rejected with `InvalidOperation`; unknown paths are
/// queued for creation together with their missing ancestors.
pub fn resolve(library: &Library, reference: &CatalogRef) -> Result<CatalogResolution> {
    let mut catalog = library.catalog()?;
    let (id, path) = match reference {
        CatalogRef::Unassigned => (None, None),
        CatalogRef::Id(id) => {
            let entry = catalog.find_by_id(id).ok_or_else(|| {
                Error::invalid(format!(
                    "catalog {} is not defined in {}",
                    id,
                    catalog.path().display()
                ))
            })?;
            (Some(*id), Some(entry.path.clone()))
        }
        CatalogRef::Path(path) => {
            let id = catalog.ensure_path(path)?;
            let path = catalog.path_of(Some(&id)).map(str::to_string);
            (Some(id), path)
        }
    };
    debug!(
        "Resolved catalog {:?} in library '{}' to {:?}",
        reference,
        library.name(),
        id
    );
    Ok(CatalogResolution { catalog, id, path })
}

/// Folder that mirrors `catalog_path` below the library root.
pub fn mirrored_dir(library: &Library, catalog_path: Option<&str>) -> PathBuf {
    match catalog_path {
        Some(path) => library.root().join(catalog_subdirectory(path)),
        None => library.root().to_path_buf(),
    }
}

/// Folder new containers for `catalog_path` are placed in.
pub fn destination_dir(
    config: &EngineConfig,
    library: &Library,
    catalog_path: Option<&str>,
) -> PathBuf {
    if config.mirror_catalog_dirs {
        mirrored_dir(library, catalog_path)
    } else {
        library.root().to_path_buf()
    }
}

/// The folder a container should live in, if catalog mirroring is enabled and
/// it currently lives elsewhere.
pub fn misplaced(
    config: &EngineConfig,
    library: &Library,
    container: &Path,
    catalog_path: Option<&str>,
) -> Option<PathBuf> {
    if !config.mirror_catalog_dirs {
        return None;
    }
    let expected = mirrored_dir(library, catalog_path);
    (container.parent() != Some(expected.as_path())).then_some(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn library(dir: &TempDir) -> Library {
        Library::new("L1", dir.path())
    }

    #[test]
    fn test_resolve_path_queues_until_commit() {
        let dir = TempDir::new().unwrap();
        let lib = library(&dir);
        let resolution = resolve(&lib, &CatalogRef::Path("Furniture/Chairs".to_string())).unwrap();
        assert_eq!(resolution.pending().len(), 2);
        assert_eq!(resolution.catalog_path(), Some("Furniture/Chairs"));
        assert!(!lib.catalog_path().exists());

        let id = resolution.id();
        let created = resolution.commit().unwrap();
        assert_eq!(created.len(), 2);
        let reloaded = lib.catalog().unwrap();
        assert_eq!(reloaded.find_by_path("Furniture/Chairs").map(|e| e.id), id);
    }

    #[test]
    fn test_commit_keeps_lines_written_after_resolution() {
        let dir = TempDir::new().unwrap();
        let lib = library(&dir);
        let resolution = resolve(&lib, &CatalogRef::Path("Props/Small".to_string())).unwrap();

        let other = Uuid::new_v4();
        fs::write(
            lib.catalog_path(),
            format!("VERSION 1\n{}:Props:Props\n{}:Other:Other\n", Uuid::new_v4(), other),
        )
        .unwrap();

        let id = resolution.id();
        let created = resolution.commit().unwrap();
        let paths: Vec<_> = created.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["Props/Small"]);

        let written = fs::read_to_string(lib.catalog_path()).unwrap();
        assert!(written.contains(&format!("{}:Other:Other", other)));
        assert_eq!(written.matches(":Props:").count(), 1);
        let reloaded = lib.catalog().unwrap();
        assert_eq!(reloaded.find_by_path("Props/Small").map(|e| e.id), id);
    }

    #[test]
    fn test_commit_keeps_resolved_id_when_path_appeared() {
        let dir = TempDir::new().unwrap();
        let lib = library(&dir);
        let resolution = resolve(&lib, &CatalogRef::Path("Props".to_string())).unwrap();
        let id = resolution.id().unwrap();
        let text = format!("VERSION 1\n{}:Props:Props\n", Uuid::new_v4());
        fs::write(lib.catalog_path(), text).unwrap();

        resolution.commit().unwrap();
        assert!(lib.catalog().unwrap().find_by_id(&id).is_some());
    }

    #[test]
    fn test_resolve_unknown_id_is_invalid() {
        let dir = TempDir::new().unwrap();
        let result = resolve(&library(&dir), &CatalogRef::Id(Uuid::new_v4()));
        assert!(matches!(result, Err(Error::InvalidOperation { .. })));
    }

    #[test]
    fn test_resolve_known_id_and_unassigned() {
        let dir = TempDir::new().unwrap();
        let id = Uuid::new_v4();
        fs::write(
            dir.path().join(crate::defaults::CATALOG_FILENAME),
            format!("VERSION 1\n{}:Props:Props\n", id),
        )
        .unwrap();
        let lib = library(&dir);
        let known = resolve(&lib, &CatalogRef::Id(id)).unwrap();
        assert_eq!(known.catalog_path(), Some("Props"));
        assert!(known.pending().is_empty());

        let none = resolve(&lib, &CatalogRef::Unassigned).unwrap();
        assert_eq!(none.id(), None);
    }

    #[test]
    fn test_destination_and_misplaced_dirs() {
        let lib = Library::new("L1", Path::new("/assets"));
        let mut config = EngineConfig::default();
        assert_eq!(destination_dir(&config, &lib, Some("A/B")), PathBuf::from("/assets"));
        assert_eq!(misplaced(&config, &lib, Path::new("/assets/x.shelf"), Some("A")), None);

        config.mirror_catalog_dirs = true;
        assert_eq!(destination_dir(&config, &lib, Some("A/B")), PathBuf::from("/assets/A/B"));
        assert_eq!(
            misplaced(&config, &lib, Path::new("/assets/x.shelf"), Some("A")),
            Some(PathBuf::from("/assets/A"))
        );
        assert_eq!(misplaced(&config, &lib, Path::new("/assets/A/x.shelf"), Some("A")), None);
    }
}
