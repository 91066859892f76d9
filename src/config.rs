//! # Engine Configuration
//!
//! This module defines the `asset-shelf.yaml` configuration file and the
//! `EngineConfig` it parses into. The configuration is the only source of
//! library-wide settings: it is loaded once at the boundary and passed
//! explicitly into every pipeline stage, so no stage reads environment
//! variables or other ambient state.
//!
//! ## Format
//!
//! ```yaml
//! libraries:
//!   - name: Props
//!     path: /home/me/assets/props
//!   - name: Materials
//!     path: /home/me/assets/materials
//! conflict_policy: increment   # increment | overwrite | skip | prompt
//! mirror_catalog_dirs: false   # place containers in catalog-named folders
//! sync_filenames: true         # rename single-asset files with their asset
//! naming:
//!   prefix: ""
//!   suffix: ""
//!   include_date: false
//! trash_dir: /home/me/.local/share/asset-shelf/trash
//! ```
//!
//! Every field except `libraries` has a default.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::conflict::ConflictPolicy;
use crate::error::{Error, Result};
use crate::library::Library;

/// One configured library: a name mapped to a filesystem root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryEntry {
    /// Name the library is referred to by
    pub name: String,
    /// Root directory holding the library's containers and catalog file
    pub path: PathBuf,
}

/// Filename convention applied when a container name is derived from an asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Optional prefix joined with `_`
    #[serde(default)]
    pub prefix: Option<String>,
    /// Optional suffix joined with `_`
    #[serde(default)]
    pub suffix: Option<String>,
    /// Append the current date as `YYYY-MM-DD`
    #[serde(default)]
    pub include_date: bool,
}

/// Complete configuration threaded through the mutation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Library name to root mapping, in declaration order
    pub libraries: Vec<LibraryEntry>,
    /// What to do when a destination path is already occupied
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
    /// Mirror catalog paths as directories below the library root
    #[serde(default)]
    pub mirror_catalog_dirs: bool,
    /// Keep single-asset container filenames in step with the asset name
    #[serde(default = "default_true")]
    pub sync_filenames: bool,
    /// Filename convention for derived container names
    #[serde(default)]
    pub naming: NamingConfig,
    /// Directory receiving disposed containers
    #[serde(default)]
    pub trash_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            libraries: Vec::new(),
            conflict_policy: ConflictPolicy::default(),
            mirror_catalog_dirs: false,
            sync_filenames: true,
            naming: NamingConfig::default(),
            trash_dir: None,
        }
    }
}

impl EngineConfig {
    /// Configuration with the given libraries and defaults elsewhere.
    pub fn with_libraries<I, S, P>(libraries: I) -> Self
    where
        I: IntoIterator<Item = (S, P)>,
        S: Into<String>,
        P: Into<PathBuf>,
    {
        Self {
            libraries: libraries
                .into_iter()
                .map(|(name, path)| LibraryEntry {
                    name: name.into(),
                    path: path.into(),
                })
                .collect(),
            ..Self::default()
        }
    }

    /// Resolve a configured library by name.
    pub fn library(&self, name: &str) -> Result<Library> {
        self.libraries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| Library::new(&entry.name, &entry.path))
            .ok_or_else(|| Error::LibraryNotFound {
                name: name.to_string(),
            })
    }

    /// All configured libraries, in declaration order.
    pub fn all_libraries(&self) -> Vec<Library> {
        self.libraries
            .iter()
            .map(|entry| Library::new(&entry.name, &entry.path))
            .collect()
    }

    /// Find the library whose root contains `path`.
    ///
    /// When libraries are nested the deepest root wins.
    pub fn library_containing(&self, path: &Path) -> Option<Library> {
        self.all_libraries()
            .into_iter()
            .filter(|library| library.contains(path))
            .max_by_key(|library| library.root().components().count())
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.libraries {
            if entry.name.trim().is_empty() {
                return Err(Error::ConfigParse {
                    message: "library with an empty name".to_string(),
                    hint: Some("Every entry under 'libraries' needs a 'name'".to_string()),
                });
            }
            if entry.path.as_os_str().is_empty() {
                return Err(Error::ConfigParse {
                    message: format!("library '{}' has an empty path", entry.name),
                    hint: Some("Set 'path' to the library's root directory".to_string()),
                });
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(Error::ConfigParse {
                    message: format!("duplicate library '{}'", entry.name),
                    hint: Some("Give every library a unique name".to_string()),
                });
            }
        }
        Ok(())
    }
}

/// Parse a YAML configuration string.
pub fn parse(yaml_content: &str) -> Result<EngineConfig> {
    let config: EngineConfig = serde_yaml::from_str(yaml_content).map_err(|e| Error::ConfigParse {
        message: e.to_string(),
        hint: Some("Check the file against the documented asset-shelf.yaml layout".to_string()),
    })?;
    config.validate()?;
    Ok(config)
}

/// Load the configuration from a file.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<EngineConfig> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
libraries:
  - name: Props
    path: /assets/props
  - name: Materials
    path: /assets/materials
conflict_policy: skip
mirror_catalog_dirs: true
sync_filenames: false
naming:
  prefix: QA
  include_date: true
trash_dir: /tmp/trash
"#;
        let config = parse(yaml).unwrap();
        assert_eq!(config.libraries.len(), 2);
        assert_eq!(config.conflict_policy, ConflictPolicy::Skip);
        assert!(config.mirror_catalog_dirs);
        assert!(!config.sync_filenames);
        assert_eq!(config.naming.prefix.as_deref(), Some("QA"));
        assert!(config.naming.include_date);
        assert_eq!(config.trash_dir, Some(PathBuf::from("/tmp/trash")));
    }

    #[test]
    fn test_parse_defaults() {
        let config = parse("libraries:\n  - name: L1\n    path: /l1\n").unwrap();
        assert_eq!(config.conflict_policy, ConflictPolicy::Increment);
        assert!(!config.mirror_catalog_dirs);
        assert!(config.sync_filenames);
        assert_eq!(config.naming, NamingConfig::default());
        assert!(config.trash_dir.is_none());
    }

    #[test]
    fn test_parse_rejects_duplicate_libraries() {
        let yaml = r#"
libraries:
  - name: L1
    path: /a
  - name: L1
    path: /b
"#;
        let err = parse(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate library 'L1'"));
    }

    #[test]
    fn test_parse_rejects_unknown_policy() {
        let yaml = "libraries: []\nconflict_policy: explode\n";
        assert!(matches!(parse(yaml), Err(Error::ConfigParse { .. })));
    }

    #[test]
    fn test_library_lookup() {
        let config = EngineConfig::with_libraries([("L1", "/a"), ("L2", "/b")]);
        assert_eq!(config.library("L2").unwrap().root(), Path::new("/b"));
        assert!(matches!(
            config.library("L3"),
            Err(Error::LibraryNotFound { name }) if name == "L3"
        ));
    }

    #[test]
    fn test_library_containing_prefers_deepest_root() {
        let config =
            EngineConfig::with_libraries([("outer", "/assets"), ("inner", "/assets/props")]);
        let found = config
            .library_containing(Path::new("/assets/props/Chair.shelf"))
            .unwrap();
        assert_eq!(found.name(), "inner");
        assert!(config.library_containing(Path::new("/elsewhere/x.shelf")).is_none());
    }

    #[test]
    fn test_from_file_missing() {
        let result = from_file("/nonexistent/asset-shelf.yaml");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
