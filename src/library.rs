//! # Library Index
//!
//! A library is a configured name mapped to a root directory. The root holds
//! the catalog definition file and any number of `.shelf` containers, possibly
//! nested in catalog-named folders.
//!
//! The engine never discovers libraries on its own: they always come from the
//! explicitly passed [`EngineConfig`](crate::config::EngineConfig). This module
//! only resolves paths and enumerates containers.

use std::path::{Path, PathBuf};

use log::warn;
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::catalog::CatalogFile;
use crate::container::{self, Container};
use crate::defaults::CATALOG_FILENAME;
use crate::error::Result;
use crate::naming::is_container_path;

/// A resolved library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    name: String,
    root: PathBuf,
}

impl Library {
    pub fn new(name: &str, root: &Path) -> Self {
        Self {
            name: name.to_string(),
            root: root.to_path_buf(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the library's catalog definition file.
    pub fn catalog_path(&self) -> PathBuf {
        self.root.join(CATALOG_FILENAME)
    }

    /// Load the library's catalog definition file.
    pub fn catalog(&self) -> Result<CatalogFile> {
        CatalogFile::load(self.catalog_path())
    }

    /// True if `path` lies below the library root.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    /// Enumerate container files, sorted by path.
    ///
    /// Hidden files and directories (including in-flight `.tmp_` files and
    /// lock sidecars) are skipped. A missing root yields no containers.
    pub fn containers(&self) -> Vec<PathBuf> {
        if !self.root.is_dir() {
            return Vec::new();
        }
        let mut paths: Vec<PathBuf> = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", self.root.display(), e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && is_container_path(entry.path()))
            .map(|entry| entry.into_path())
            .collect();
        paths.sort();
        paths
    }

    /// Open every container concurrently.
    ///
    /// Each result is independent: a corrupt container is reported in place
    /// and does not prevent the others from being indexed.
    pub fn scan(&self) -> Vec<(PathBuf, Result<Container>)> {
        self.containers()
            .into_par_iter()
            .map(|path| {
                let result = container::open(&path);
                (path, result)
            })
            .collect()
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_containers_skips_hidden_and_foreign_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Furniture")).unwrap();
        fs::create_dir_all(root.join(".trash")).unwrap();
        fs::write(root.join("Chair.shelf"), "x").unwrap();
        fs::write(root.join("Furniture/Table.shelf"), "x").unwrap();
        fs::write(root.join(".tmp_Chair.shelf"), "x").unwrap();
        fs::write(root.join(".trash/Old.shelf"), "x").unwrap();
        fs::write(root.join("Chair.png"), "x").unwrap();

        let library = Library::new("L1", root);
        let found = library.containers();
        assert_eq!(
            found,
            vec![root.join("Chair.shelf"), root.join("Furniture/Table.shelf")]
        );
    }

    #[test]
    fn test_containers_missing_root() {
        let library = Library::new("gone", Path::new("/nonexistent/library"));
        assert!(library.containers().is_empty());
    }

    #[test]
    fn test_scan_reports_corrupt_containers_individually() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Bad.shelf"), "garbage").unwrap();
        let library = Library::new("L1", dir.path());
        let results = library.scan();
        assert_eq!(results.len(), 1);
        assert!(results[0].1.is_err());
    }

    #[test]
    fn test_contains_and_catalog_path() {
        let library = Library::new("L1", Path::new("/assets/l1"));
        assert!(library.contains(Path::new("/assets/l1/sub/x.shelf")));
        assert!(!library.contains(Path::new("/assets/l10/x.shelf")));
        assert_eq!(
            library.catalog_path(),
            PathBuf::from("/assets/l1").join(CATALOG_FILENAME)
        );
    }
}
