//! # Catalog Definition File
//!
//! Every library root holds one catalog definition file listing the catalogs
//! assets can be filed under. The file is line oriented:
//!
//! ```text
//! # Comments are preserved
//! VERSION 1
//!
//! 5f1c...-...:Furniture:Furniture
//! 9a0b...-...:Furniture/Chairs:Furniture-Chairs
//! ```
//!
//! Each entry is `identifier:hierarchical/path:display name`. The file is
//! library-level state with its own lifecycle: this module only ever appends
//! entries. Existing lines, including comments and lines it cannot parse, are
//! written back byte for byte.

use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::write::replace_file;
use crate::error::{Error, Result};

/// Version written into newly created catalog files.
pub const CATALOG_FORMAT_VERSION: u32 = 1;

/// One catalog definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: Uuid,
    /// Slash separated hierarchical path, e.g. `Furniture/Chairs`
    pub path: String,
    pub display_name: String,
}

impl CatalogEntry {
    /// Entry for a path with a fresh identifier.
    pub fn new(path: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.to_string(),
            display_name: path.replace('/', "-"),
        }
    }

    fn to_line(&self) -> String {
        format!("{}:{}:{}", self.id, self.path, self.display_name)
    }
}

/// How a request names a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogRef {
    /// No catalog
    Unassigned,
    /// An existing catalog identifier
    Id(Uuid),
    /// A hierarchical path, created if it does not exist yet
    Path(String),
}

/// Normalize a catalog path: trim components and drop empty ones.
///
/// Returns `None` for a path with no components.
pub fn normalize_path(path: &str) -> Option<String> {
    let parts: Vec<&str> = path
        .split('/')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// A loaded catalog definition file plus entries pending append.
#[derive(Debug, Clone)]
pub struct CatalogFile {
    path: PathBuf,
    /// Original file contents; `None` if the file does not exist yet
    original: Option<String>,
    entries: Vec<CatalogEntry>,
    appended: Vec<CatalogEntry>,
}

impl CatalogFile {
    /// Load a catalog definition file. A missing file yields an empty catalog.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let original = match std::fs::read_to_string(path) {
            Ok(text) => Some(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(Error::Catalog {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }
        };
        let entries = original
            .as_deref()
            .map(|text| parse_entries(path, text))
            .unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            original,
            entries,
            appended: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.original.is_some()
    }

    /// All entries, existing first, then pending ones.
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter().chain(self.appended.iter())
    }

    /// Entries added since loading that have not been saved.
    pub fn pending(&self) -> &[CatalogEntry] {
        &self.appended
    }

    pub fn find_by_id(&self, id: &Uuid) -> Option<&CatalogEntry> {
        self.entries().find(|entry| &entry.id == id)
    }

    pub fn find_by_path(&self, path: &str) -> Option<&CatalogEntry> {
        let wanted = normalize_path(path)?;
        self.entries()
            .find(|entry| normalize_path(&entry.path).as_deref() == Some(wanted.as_str()))
    }

    /// Catalog path for an asset's catalog id; `None` reads as Unassigned.
    pub fn path_of(&self, id: Option<&Uuid>) -> Option<&str> {
        id.and_then(|id| self.find_by_id(id))
            .map(|entry| entry.path.as_str())
    }

    /// Return the id for `path`, queuing it and any missing ancestors.
    pub fn ensure_path(&mut self, path: &str) -> Result<Uuid> {
        let normalized = normalize_path(path)
            .ok_or_else(|| Error::invalid(format!("'{}' is not a catalog path", path)))?;
        if normalized.contains(':') {
            return Err(Error::invalid(format!(
                "catalog path '{}' may not contain ':'",
                normalized
            )));
        }

        let mut prefix = String::new();
        let mut leaf = None;
        for part in normalized.split('/') {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(part);
            let id = match self.find_by_path(&prefix) {
                Some(entry) => entry.id,
                None => {
                    let entry = CatalogEntry::new(&prefix);
                    let id = entry.id;
                    self.appended.push(entry);
                    id
                }
            };
            leaf = Some(id);
        }
        leaf.ok_or_else(|| Error::invalid(format!("'{}' is not a catalog path", path)))
    }

    /// Queue an entry built elsewhere for the next [`save`](Self::save).
    pub fn queue(&mut self, entry: CatalogEntry) {
        self.appended.push(entry);
    }

    /// File contents with pending entries appended.
    pub fn render(&self) -> String {
        let mut text = match &self.original {
            Some(original) => original.clone(),
            None => format!(
                "# Asset catalog definition file.\n\
                 # Lines are: identifier:catalog/path:display name\n\
                 VERSION {}\n\n",
                CATALOG_FORMAT_VERSION
            ),
        };
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        for entry in &self.appended {
            text.push_str(&entry.to_line());
            text.push('\n');
        }
        text
    }

    /// Write pending entries to disk atomically. No-op when nothing is pending.
    pub fn save(&mut self) -> Result<()> {
        if self.appended.is_empty() {
            return Ok(());
        }
        let text = self.render();
        replace_file(&self.path, text.as_bytes()).map_err(|e| Error::Catalog {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        self.original = Some(text);
        self.entries.append(&mut self.appended);
        Ok(())
    }
}

fn parse_entries(path: &Path, text: &str) -> Vec<CatalogEntry> {
    let mut entries = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("VERSION") {
            continue;
        }
        let mut parts = line.splitn(3, ':');
        let (Some(id), Some(catalog_path)) = (parts.next(), parts.next()) else {
            warn!(
                "{}:{}: malformed catalog entry, expected identifier:path[:name]",
                path.display(),
                number + 1
            );
            continue;
        };
        let catalog_path = catalog_path.trim();
        if catalog_path.is_empty() {
            warn!("{}:{}: empty catalog path, skipping", path.display(), number + 1);
            continue;
        }
        let Ok(id) = Uuid::parse_str(id.trim()) else {
            warn!(
                "{}:{}: invalid catalog identifier '{}'",
                path.display(),
                number + 1,
                id.trim()
            );
            continue;
        };
        let display_name = parts
            .next()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| catalog_path.replace('/', "-"));
        entries.push(CatalogEntry {
            id,
            path: catalog_path.to_string(),
            display_name,
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SAMPLE: &str = "# This is a catalog file\n\
VERSION 1\n\
\n\
313ea471-7c68-4a97-a8bb-5d0aa8e4b2c3:Props:Props\n\
not-a-uuid:Broken:Broken\n\
a2d6c4f1-6b1a-4a4e-8a8a-0f1d0e8b7c61:Props/Small:Props-Small\n";

    fn sample(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("asset_catalogs.txt");
        fs::write(&path, SAMPLE).unwrap();
        path
    }

    #[test]
    fn test_load_skips_comments_and_invalid_lines() {
        let dir = TempDir::new().unwrap();
        let catalog = CatalogFile::load(sample(&dir)).unwrap();
        let paths: Vec<_> = catalog.entries().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["Props", "Props/Small"]);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let catalog = CatalogFile::load(dir.path().join("none.txt")).unwrap();
        assert!(!catalog.exists());
        assert_eq!(catalog.entries().count(), 0);
    }

    #[test]
    fn test_lookup_by_id_and_path() {
        let dir = TempDir::new().unwrap();
        let catalog = CatalogFile::load(sample(&dir)).unwrap();
        let id = Uuid::parse_str("a2d6c4f1-6b1a-4a4e-8a8a-0f1d0e8b7c61").unwrap();
        assert_eq!(catalog.path_of(Some(&id)), Some("Props/Small"));
        assert_eq!(catalog.find_by_path("/Props/ Small/").unwrap().id, id);
        assert_eq!(catalog.path_of(None), None);
        assert_eq!(catalog.path_of(Some(&Uuid::new_v4())), None);
    }

    #[test]
    fn test_ensure_existing_path_appends_nothing() {
        let dir = TempDir::new().unwrap();
        let mut catalog = CatalogFile::load(sample(&dir)).unwrap();
        catalog.ensure_path("Props").unwrap();
        assert!(catalog.pending().is_empty());
    }

    #[test]
    fn test_ensure_path_appends_missing_ancestors() {
        let dir = TempDir::new().unwrap();
        let mut catalog = CatalogFile::load(sample(&dir)).unwrap();
        let id = catalog.ensure_path("Furniture/Chairs").unwrap();
        let pending: Vec<_> = catalog.pending().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(pending, vec!["Furniture", "Furniture/Chairs"]);
        assert_eq!(catalog.find_by_path("Furniture/Chairs").unwrap().id, id);
    }

    #[test]
    fn test_ensure_path_rejects_colon_and_empty() {
        let dir = TempDir::new().unwrap();
        let mut catalog = CatalogFile::load(sample(&dir)).unwrap();
        assert!(catalog.ensure_path("a:b").is_err());
        assert!(catalog.ensure_path(" / ").is_err());
    }

    #[test]
    fn test_save_preserves_existing_lines() {
        let dir = TempDir::new().unwrap();
        let path = sample(&dir);
        let mut catalog = CatalogFile::load(&path).unwrap();
        catalog.ensure_path("Furniture").unwrap();
        catalog.save().unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with(SAMPLE));
        assert!(written.contains("not-a-uuid:Broken:Broken"));
        assert!(written.trim_end().ends_with(":Furniture:Furniture"));
        assert!(catalog.pending().is_empty());
    }

    #[test]
    fn test_save_creates_new_file_with_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("asset_catalogs.txt");
        let mut catalog = CatalogFile::load(&path).unwrap();
        let id = catalog.ensure_path("Materials").unwrap();
        catalog.save().unwrap();

        let reloaded = CatalogFile::load(&path).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("VERSION 1"));
        assert_eq!(reloaded.find_by_id(&id).unwrap().path, "Materials");
    }

    #[test]
    fn test_save_without_pending_does_not_touch_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("asset_catalogs.txt");
        let mut catalog = CatalogFile::load(&path).unwrap();
        catalog.save().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_save_adds_missing_trailing_newline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("asset_catalogs.txt");
        fs::write(&path, "VERSION 1").unwrap();
        let mut catalog = CatalogFile::load(&path).unwrap();
        catalog.ensure_path("X").unwrap();
        catalog.save().unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("VERSION 1\n"));
    }
}
