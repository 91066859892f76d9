//! Export handoff
//!
//! Hosts that produce new assets (for example by marking datablocks of an open
//! scene) hand the records and their payloads to [`Engine::save_new`]. The
//! engine picks the file name and folder, resolves conflicts and the catalog,
//! and writes the container through the same atomic writer as every other
//! mutation.

use std::collections::HashSet;
use std::path::PathBuf;

use log::info;

use super::conflict::{ConflictDecision, Resolution};
use super::orchestrator::{commit_catalog, Engine};
use super::plan::{ContainerWrite, Edit, InsertSource, MutationPlan, PlanStep};
use super::{sync, write};
use crate::catalog::{CatalogEntry, CatalogRef};
use crate::container::Record;
use crate::error::{Error, Result};
use crate::naming::{build_asset_filename_today, container_file_name};

/// Payload of a record handed over for export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewPayload {
    Bytes(Vec<u8>),
    /// Read this file and embed it
    Embed(PathBuf),
    /// Keep as an external link
    Link(PathBuf),
}

/// A record to export; its `payload` slot is replaced on write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub record: Record,
    pub payload: NewPayload,
}

/// Request to store freshly produced records as a new container.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub library: String,
    pub catalog: CatalogRef,
    /// File name stem before the naming convention is applied; defaults to
    /// the first asset's display name
    pub name: Option<String>,
    pub records: Vec<NewRecord>,
    pub conflict: Option<ConflictDecision>,
}

/// Result of an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Saved {
        path: PathBuf,
        catalogs_created: Vec<CatalogEntry>,
    },
    Skipped {
        destination: PathBuf,
    },
}

impl Engine {
    /// Write a new container into a library.
    ///
    /// Every asset record is filed under the requested catalog. At least one
    /// record must be an asset.
    pub fn save_new(&self, request: ExportRequest) -> Result<ExportOutcome> {
        let first_asset = request
            .records
            .iter()
            .find_map(|r| r.record.asset.as_ref())
            .ok_or_else(|| {
                Error::invalid("an exported container needs at least one asset record")
            })?;
        let mut ids = HashSet::new();
        if let Some(duplicate) = request.records.iter().find(|r| !ids.insert(r.record.id.clone())) {
            return Err(Error::invalid(format!("duplicate record id '{}'", duplicate.record.id)));
        }

        let library = self.config().library(&request.library)?;
        let resolution = sync::resolve(&library, &request.catalog)?;
        let stem_source = request.name.as_deref().unwrap_or(&first_asset.display_name);
        let stem = build_asset_filename_today(stem_source, &self.config().naming);
        let dir = sync::destination_dir(self.config(), &library, resolution.catalog_path());
        let desired = dir.join(container_file_name(&stem));

        let (path, replace) = match self.resolve_destination(&desired, request.conflict)? {
            Resolution::Skip => return Ok(ExportOutcome::Skipped { destination: desired }),
            Resolution::Use(path) => (path, false),
            Resolution::Overwrite(path) => (path, true),
        };

        let catalog_id = resolution.id();
        let edits = request
            .records
            .into_iter()
            .map(|NewRecord { mut record, payload }| {
                if let Some(meta) = record.asset.as_mut() {
                    meta.catalog_id = catalog_id;
                }
                let source = match payload {
                    NewPayload::Bytes(bytes) => InsertSource::Bytes(bytes),
                    NewPayload::Embed(file) => InsertSource::EmbedFile(file),
                    NewPayload::Link(file) => InsertSource::Link(file),
                };
                Edit::Insert { record, source }
            })
            .collect();
        let plan = MutationPlan::new(vec![PlanStep::Write(ContainerWrite {
            container: path.clone(),
            create: true,
            replace,
            edits,
        })]);

        write::apply(&plan, &self.write_context())?;
        let catalogs_created = commit_catalog(Some(resolution))?;
        info!("Saved new container {}", path.display());
        Ok(ExportOutcome::Saved {
            path,
            catalogs_created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::container::{self, AssetMetadata, DataKind, PayloadSlot, RecordId};
    use crate::engine::trash::TrashDir;
    use std::fs;
    use tempfile::TempDir;

    fn engine(dir: &TempDir) -> Engine {
        let config = EngineConfig::with_libraries([("L1", dir.path().join("L1"))]);
        Engine::new(config, Box::new(TrashDir::new(dir.path().join("trash"))))
    }

    fn new_record(id: &str, asset: Option<&str>, refs: &[&str], payload: NewPayload) -> NewRecord {
        NewRecord {
            record: Record {
                id: RecordId::new(id),
                name: id.to_string(),
                kind: if asset.is_some() { DataKind::Material } else { DataKind::Image },
                refs: refs.iter().map(|r| RecordId::new(*r)).collect(),
                asset: asset.map(AssetMetadata::new),
                payload: PayloadSlot::Embedded { offset: 0, len: 0 },
            },
            payload,
        }
    }

    fn request(records: Vec<NewRecord>) -> ExportRequest {
        ExportRequest {
            library: "L1".to_string(),
            catalog: CatalogRef::Path("Materials".to_string()),
            name: None,
            records,
            conflict: None,
        }
    }

    #[test]
    fn test_save_new_writes_container_and_catalog() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("L1")).unwrap();
        fs::write(dir.path().join("grain.png"), b"grain").unwrap();
        let engine = engine(&dir);

        let outcome = engine
            .save_new(request(vec![
                new_record(
                    "MA_Oak",
                    Some("Oak"),
                    &["IM_Grain"],
                    NewPayload::Bytes(b"oak".to_vec()),
                ),
                new_record("IM_Grain", None, &[], NewPayload::Embed(dir.path().join("grain.png"))),
            ]))
            .unwrap();

        let ExportOutcome::Saved { path, catalogs_created } = outcome else {
            panic!("expected a saved container");
        };
        assert_eq!(path, dir.path().join("L1/Oak.shelf"));
        assert_eq!(catalogs_created.len(), 1);
        let c = container::open(&path).unwrap();
        assert_eq!(
            c.get("MA_Oak").unwrap().asset.as_ref().unwrap().catalog_id,
            Some(catalogs_created[0].id)
        );
        assert_eq!(
            c.read_payload("IM_Grain").unwrap(),
            container::Payload::Bytes(b"grain".to_vec())
        );
    }

    #[test]
    fn test_save_new_increments_existing_name() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let records = || vec![new_record("MA_Oak", Some("Oak"), &[], NewPayload::Bytes(vec![]))];
        engine.save_new(request(records())).unwrap();
        let second = engine.save_new(request(records())).unwrap();
        assert!(
            matches!(second, ExportOutcome::Saved { path, .. } if path.ends_with("Oak_001.shelf"))
        );
    }

    #[test]
    fn test_save_new_requires_an_asset() {
        let dir = TempDir::new().unwrap();
        let records = vec![new_record("IM", None, &[], NewPayload::Bytes(vec![]))];
        let result = engine(&dir).save_new(request(records));
        assert!(matches!(result, Err(Error::InvalidOperation { .. })));
    }

    #[test]
    fn test_save_new_rejects_dangling_refs() {
        let dir = TempDir::new().unwrap();
        let result = engine(&dir).save_new(request(vec![new_record(
            "MA",
            Some("A"),
            &["ghost"],
            NewPayload::Bytes(vec![]),
        )]));
        assert!(matches!(result, Err(Error::InvalidOperation { .. })));
        assert!(!dir.path().join("L1").join(crate::defaults::CATALOG_FILENAME).exists());
    }
}
