//! # Asset Containers
//!
//! A container is a single `.shelf` file holding one or more records. Each
//! record is either an *asset record* (a payload datum carrying asset
//! metadata: display name, tags, catalog, ...) or a *plain data record* (a
//! payload with no metadata, such as an image or node group shared by several
//! assets).
//!
//! Records reference each other through `refs`, forming a general directed
//! graph that may contain cycles. Records are stored in an arena (`Vec`) and
//! addressed by their stable [`RecordId`]; there are no back-pointers.
//!
//! ## Modules
//!
//! - [`format`]: the on-disk layout (header line, JSON record table, payload
//!   section) and table validation.
//! - [`reader`]: opens a container and indexes it without loading payload
//!   bytes.

pub mod format;
pub mod reader;

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

pub use reader::open;

/// Stable identifier of a record, unique within its container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for RecordId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Type of payload datum a record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Material,
    Object,
    Collection,
    Mesh,
    NodeGroup,
    Image,
    World,
    Font,
    Sound,
    MovieClip,
    Other,
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataKind::Material => "material",
            DataKind::Object => "object",
            DataKind::Collection => "collection",
            DataKind::Mesh => "mesh",
            DataKind::NodeGroup => "node_group",
            DataKind::Image => "image",
            DataKind::World => "world",
            DataKind::Font => "font",
            DataKind::Sound => "sound",
            DataKind::MovieClip => "movie_clip",
            DataKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Metadata that turns a record into an asset.
///
/// These fields are independent of the payload's own `name`: changing the
/// display name never renames the payload datum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub license: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub copyright: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Catalog the asset belongs to; `None` means Unassigned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<Uuid>,
}

impl AssetMetadata {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            description: String::new(),
            author: String::new(),
            license: String::new(),
            copyright: String::new(),
            tags: Vec::new(),
            catalog_id: None,
        }
    }
}

/// Where a record's payload bytes live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum PayloadSlot {
    /// Bytes stored in the container's payload section
    Embedded { offset: u64, len: u64 },
    /// A link to a file outside the container
    External { path: PathBuf },
}

/// One entry of a container's record table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    /// Name of the payload datum
    pub name: String,
    pub kind: DataKind,
    /// Reference edges: records this one depends on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<AssetMetadata>,
    pub payload: PayloadSlot,
}

impl Record {
    pub fn is_asset(&self) -> bool {
        self.asset.is_some()
    }

    /// Display name for assets, payload name otherwise.
    pub fn label(&self) -> &str {
        self.asset
            .as_ref()
            .map(|meta| meta.display_name.as_str())
            .unwrap_or(&self.name)
    }
}

/// Payload content as loaded from a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Bytes(Vec<u8>),
    /// Absolute location of an externally linked file
    External(PathBuf),
}

/// In-memory index of a container file.
///
/// Only the record table is held in memory; payload bytes stay on disk until
/// [`Container::read_payload`] is called.
#[derive(Debug, Clone)]
pub struct Container {
    path: PathBuf,
    version: u32,
    records: Vec<Record>,
    index: HashMap<RecordId, usize>,
    payload_base: u64,
}

impl Container {
    /// Build an index over already validated records.
    pub(crate) fn from_parts(
        path: PathBuf,
        version: u32,
        records: Vec<Record>,
        payload_base: u64,
    ) -> Self {
        let index = records
            .iter()
            .enumerate()
            .map(|(position, record)| (record.id.clone(), position))
            .collect();
        Self {
            path,
            version,
            records,
            index,
            payload_base,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Records in table order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.index.get(id).map(|&position| &self.records[position])
    }

    /// Arena position of a record.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Look up a record, failing with `RecordNotFound`.
    pub fn require(&self, id: &str) -> Result<&Record> {
        self.get(id).ok_or_else(|| Error::RecordNotFound {
            container: self.path.clone(),
            id: id.to_string(),
        })
    }

    /// Look up an asset record, failing if the record is plain data.
    pub fn require_asset(&self, id: &str) -> Result<&Record> {
        let record = self.require(id)?;
        if !record.is_asset() {
            return Err(Error::invalid(format!(
                "record '{}' in {} is not an asset",
                id,
                self.path.display()
            )));
        }
        Ok(record)
    }

    /// Resolve a user-supplied asset reference.
    ///
    /// An exact record id wins; otherwise the query must match exactly one
    /// asset's display name.
    pub fn resolve_asset(&self, query: &str) -> Result<&Record> {
        if self.contains(query) {
            return self.require_asset(query);
        }
        let mut matches = self
            .assets()
            .filter(|record| record.label() == query);
        match (matches.next(), matches.next()) {
            (Some(record), None) => Ok(record),
            (Some(_), Some(_)) => Err(Error::invalid(format!(
                "'{}' matches several assets in {}; use the record id",
                query,
                self.path.display()
            ))),
            _ => Err(Error::RecordNotFound {
                container: self.path.clone(),
                id: query.to_string(),
            }),
        }
    }

    /// Asset records in table order.
    pub fn assets(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(|record| record.is_asset())
    }

    pub fn asset_count(&self) -> usize {
        self.assets().count()
    }

    /// A container without assets is meaningless and should be cleaned up by
    /// the user; it is never removed automatically.
    pub fn needs_cleanup(&self) -> bool {
        self.asset_count() == 0
    }

    /// Byte offset where the payload section starts.
    pub fn payload_base(&self) -> u64 {
        self.payload_base
    }

    /// Resolve an external payload path against the container directory.
    pub fn resolve_external(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(path)
        }
    }

    /// Load one record's payload.
    ///
    /// Embedded payloads are read from the container file; external payloads
    /// are returned as their resolved path without being read.
    pub fn read_payload(&self, id: &str) -> Result<Payload> {
        let record = self.require(id)?;
        match &record.payload {
            PayloadSlot::Embedded { offset, len } => {
                reader::read_slot(&self.path, self.payload_base + offset, *len).map(Payload::Bytes)
            }
            PayloadSlot::External { path } => Ok(Payload::External(self.resolve_external(path))),
        }
    }
}
