//! Shared test utilities for integration and E2E tests.
//!
//! A [`ShelfFixture`] is a temporary directory holding two configured
//! libraries (`L1`, `L2`), a trash folder and an `asset-shelf.yaml` pointing
//! at them. Containers are created through the library's own export path so
//! every fixture file is a valid container.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let shelf = ShelfFixture::new();
//!     let records = vec![asset("Chair", DataKind::Object, &[], b"chair")];
//!     let chair = shelf.save("L1", "", None, records);
//!     shelf.command().arg("ls").assert().success();
//! }
//! ```

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_fs::prelude::*;

use asset_shelf::catalog::CatalogRef;
use asset_shelf::config::{self, EngineConfig};
use asset_shelf::container::{self, AssetMetadata, DataKind, Payload, PayloadSlot, Record, RecordId};
use asset_shelf::engine::export::{ExportOutcome, ExportRequest, NewPayload, NewRecord};
use asset_shelf::engine::{Engine, TrashDir};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;

    pub use asset_shelf::container::DataKind;

    pub use super::{asset, data, payload_bytes, without_payload_slots, ShelfFixture};
}

/// Temporary libraries plus configuration.
pub struct ShelfFixture {
    temp_dir: assert_fs::TempDir,
}

impl ShelfFixture {
    /// Two empty libraries and default settings.
    pub fn new() -> Self {
        Self::with_settings("")
    }

    /// Two empty libraries plus extra top-level YAML settings.
    pub fn with_settings(extra: &str) -> Self {
        let temp_dir = assert_fs::TempDir::new().expect("Failed to create temp directory");
        temp_dir.child("L1").create_dir_all().expect("Failed to create L1");
        temp_dir.child("L2").create_dir_all().expect("Failed to create L2");
        let yaml = format!(
            "libraries:\n  - name: L1\n    path: {}\n  - name: L2\n    path: {}\ntrash_dir: {}\n{}",
            temp_dir.path().join("L1").display(),
            temp_dir.path().join("L2").display(),
            temp_dir.path().join("trash").display(),
            extra
        );
        temp_dir
            .child("asset-shelf.yaml")
            .write_str(&yaml)
            .expect("Failed to write config file");
        Self { temp_dir }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("asset-shelf.yaml")
    }

    pub fn trash_dir(&self) -> PathBuf {
        self.path().join("trash")
    }

    pub fn config(&self) -> EngineConfig {
        config::from_file(self.config_path()).expect("Failed to load fixture config")
    }

    pub fn engine(&self) -> Engine {
        Engine::new(self.config(), Box::new(TrashDir::new(self.trash_dir())))
    }

    /// Save records as a new container; `catalog` is a catalog path or
    /// empty for Unassigned.
    pub fn save(
        &self,
        library: &str,
        catalog: &str,
        name: Option<&str>,
        records: Vec<NewRecord>,
    ) -> PathBuf {
        let catalog = if catalog.is_empty() {
            CatalogRef::Unassigned
        } else {
            CatalogRef::Path(catalog.to_string())
        };
        let outcome = self
            .engine()
            .save_new(ExportRequest {
                library: library.to_string(),
                catalog,
                name: name.map(str::to_string),
                records,
                conflict: None,
            })
            .expect("Failed to save fixture container");
        match outcome {
            ExportOutcome::Saved { path, .. } => path,
            other => panic!("fixture save was skipped: {:?}", other),
        }
    }

    /// Command for the binary with this fixture's configuration.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!("asset-shelf");
        cmd.current_dir(self.path())
            .env("ASSET_SHELF_CONFIG", self.config_path())
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG");
        cmd
    }
}

impl Default for ShelfFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// An asset record whose display name equals its id.
pub fn asset(id: &str, kind: DataKind, refs: &[&str], payload: &[u8]) -> NewRecord {
    let mut new = data(id, kind, refs, payload);
    new.record.asset = Some(AssetMetadata::new(id));
    new
}

/// A plain data record.
pub fn data(id: &str, kind: DataKind, refs: &[&str], payload: &[u8]) -> NewRecord {
    NewRecord {
        record: Record {
            id: RecordId::new(id),
            name: id.to_string(),
            kind,
            refs: refs.iter().map(|r| RecordId::new(*r)).collect(),
            asset: None,
            payload: PayloadSlot::Embedded { offset: 0, len: 0 },
        },
        payload: NewPayload::Bytes(payload.to_vec()),
    }
}

/// Embedded payload bytes of a record.
pub fn payload_bytes(path: &Path, id: &str) -> Vec<u8> {
    let container = container::open(path).expect("Failed to open container");
    match container.read_payload(id).expect("Failed to read payload") {
        Payload::Bytes(bytes) => bytes,
        other => panic!("expected embedded bytes for {}, got {:?}", id, other),
    }
}

/// Records with embedded slot positions blanked, for comparing tables
/// across a repack.
pub fn without_payload_slots(path: &Path) -> Vec<Record> {
    let container = container::open(path).expect("Failed to open container");
    container
        .records()
        .iter()
        .cloned()
        .map(|mut record| {
            if let PayloadSlot::Embedded { .. } = record.payload {
                record.payload = PayloadSlot::Embedded { offset: 0, len: 0 };
            }
            record
        })
        .collect()
}
