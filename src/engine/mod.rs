//! # Mutation Engine
//!
//! Safely mutates asset containers: rename, retag, recatalog, edit metadata,
//! move between libraries, and delete.
//!
//! ## Pipeline
//!
//! Every operation runs the same pipeline, driven by [`Engine`]:
//!
//! 1. **Read**: open the container and resolve the target asset
//!    ([`crate::container`]).
//! 2. **Classify**: compute the target's dependency closure and split it into
//!    exclusive and shared records ([`graph`]).
//! 3. **Resolve**: look up or queue catalog entries ([`sync`]) and decide what
//!    to do about occupied destinations ([`conflict`]).
//! 4. **Plan**: build an ordered, side-effect free [`MutationPlan`]
//!    ([`plan`]).
//! 5. **Write**: stage, verify and atomically commit every container the plan
//!    touches ([`write`]), under per-container locks ([`lock`]). Containers
//!    left empty go to the [`trash`].
//! 6. **Sync**: append newly created catalogs to the library's definition
//!    file.
//!
//! Stopping after step 4 gives a dry run: [`Engine::prepare`] returns the plan
//! without touching anything.

pub mod batch;
pub mod bundle;
pub mod conflict;
pub mod export;
pub mod graph;
pub mod lock;
pub mod orchestrator;
pub mod plan;
pub mod sync;
pub mod trash;
pub mod write;

use std::fmt;
use std::path::PathBuf;

use crate::catalog::{CatalogEntry, CatalogRef};
use crate::container::RecordId;

pub use conflict::{ConflictDecision, ConflictPolicy, Resolution};
pub use orchestrator::{Engine, PreparedOperation};
pub use plan::{MetadataPatch, MutationPlan};
pub use trash::{DisposalReport, Trash, TrashDir};

/// A requested change to one asset.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Change the display name; the container file follows when it was named
    /// after the asset
    Rename { new_name: String },
    /// Replace the tag list
    Retag { tags: Vec<String> },
    /// File the asset under another catalog of its library
    Recatalog { catalog: CatalogRef },
    /// Update description, author, license or copyright
    EditMetadata { patch: MetadataPatch },
    /// Move the asset and its dependencies to a library, optionally appending
    /// to an existing container there
    Move {
        library: String,
        catalog: CatalogRef,
        into: Option<PathBuf>,
    },
    /// Remove the asset and its exclusive dependencies
    Delete,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Rename { .. } => OperationKind::Rename,
            Operation::Retag { .. } => OperationKind::Retag,
            Operation::Recatalog { .. } => OperationKind::Recatalog,
            Operation::EditMetadata { .. } => OperationKind::EditMetadata,
            Operation::Move { .. } => OperationKind::Move,
            Operation::Delete => OperationKind::Delete,
        }
    }
}

/// Operation discriminant, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Rename,
    Retag,
    Recatalog,
    EditMetadata,
    Move,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Rename => "rename",
            OperationKind::Retag => "retag",
            OperationKind::Recatalog => "recatalog",
            OperationKind::EditMetadata => "edit",
            OperationKind::Move => "move",
            OperationKind::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// An operation on one asset in one container.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRequest {
    pub container: PathBuf,
    /// Record id, or the display name of exactly one asset
    pub target: String,
    pub operation: Operation,
    /// Answer for the `prompt` conflict policy
    pub conflict: Option<ConflictDecision>,
}

impl OperationRequest {
    pub fn new(
        container: impl Into<PathBuf>,
        target: impl Into<String>,
        operation: Operation,
    ) -> Self {
        Self {
            container: container.into(),
            target: target.into(),
            operation,
            conflict: None,
        }
    }

    pub fn with_conflict(mut self, decision: ConflictDecision) -> Self {
        self.conflict = Some(decision);
        self
    }
}

/// What an applied operation changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationReport {
    pub kind: OperationKind,
    pub target: RecordId,
    /// Container the target was read from
    pub source: PathBuf,
    /// Container the target lives in now
    pub location: PathBuf,
    /// Records removed from the source
    pub removed: Vec<RecordId>,
    /// Records copied to the destination
    pub copied: Vec<RecordId>,
    pub catalogs_created: Vec<CatalogEntry>,
    pub disposed: Vec<DisposalReport>,
    /// Containers left without any asset; flagged, never removed
    pub needs_cleanup: Vec<PathBuf>,
}

/// Result of running one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied(OperationReport),
    /// The request matched the current state; nothing was written
    Unchanged { target: RecordId, container: PathBuf },
    /// The conflict policy chose to skip; nothing was written
    Skipped { target: RecordId, destination: PathBuf },
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    pub fn report(&self) -> Option<&OperationReport> {
        match self {
            Outcome::Applied(report) => Some(report),
            _ => None,
        }
    }
}
