//! # Error Handling
//!
//! This module defines the centralized error type for `asset-shelf`. It uses
//! the `thiserror` library to build a single `Error` enum covering every
//! failure the mutation engine can report, with messages that say which
//! container or record was involved.
//!
//! ## Taxonomy
//!
//! Errors fall into three severity groups:
//!
//! - **Recoverable-local** (`ContainerNotFound`, `ContainerCorrupt`,
//!   `RecordNotFound`, `InvalidOperation`, `ConflictUnresolved`,
//!   `ContainerLocked`, `LibraryNotFound`, `ConfigParse`): raised by the
//!   reader, grapher, planner or resolver before any write is attempted. Every
//!   file is left exactly as it was found.
//!
//! - **Write failures** (`WriteFailed`): the temporary file could not be
//!   produced or verified. The original container is preserved and the
//!   operation is safe to retry.
//!
//! - **Partial writes** (`WriteFailedPartial`): the replace step failed
//!   mid-flight. This is the only state where the original may not have been
//!   preserved, so it must be reported distinctly and never retried silently.
//!
//! Use [`Error::is_partial`] and [`Error::is_recoverable`] to branch on
//! severity instead of matching variants by hand.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for asset-shelf operations
#[derive(Error, Debug)]
pub enum Error {
    /// The container path is missing or unreadable.
    #[error("Container not found: {}", path.display())]
    ContainerNotFound { path: PathBuf },

    /// The container's header or record table could not be parsed.
    #[error("Container is corrupt: {} - {message}", path.display())]
    ContainerCorrupt { path: PathBuf, message: String },

    /// The target record identifier does not exist in the container.
    #[error("Record '{id}' not found in {}", container.display())]
    RecordNotFound { container: PathBuf, id: String },

    /// The request would violate exclusivity or catalog invariants.
    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    /// Writing or verifying the temporary file failed; the original is intact.
    #[error("Write failed for {}: {message}", path.display())]
    WriteFailed { path: PathBuf, message: String },

    /// The replace step failed after the temporary file was complete.
    ///
    /// `recovery` points at the fully written replacement content when it
    /// could be kept on disk.
    #[error(
        "Write partially applied for {}: {message}{}",
        path.display(),
        note("new contents kept at", recovery.as_ref().map(|r| r.display()))
    )]
    WriteFailedPartial {
        path: PathBuf,
        message: String,
        /// Location of the finished replacement file, if it survived
        recovery: Option<PathBuf>,
    },

    /// The destination is occupied and no decision was supplied for it.
    #[error("Destination already exists: {} ({message})", destination.display())]
    ConflictUnresolved {
        destination: PathBuf,
        message: String,
    },

    /// Another writer holds the container's advisory lock.
    #[error("Container is locked by another writer: {}", path.display())]
    ContainerLocked { path: PathBuf },

    /// A library name is not present in the configuration.
    #[error("Library not configured: {name}")]
    LibraryNotFound { name: String },

    /// The configuration file could not be parsed or is inconsistent.
    #[error("Configuration error: {message}{}", note("hint", hint.as_ref()))]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// The catalog definition file could not be read or updated.
    #[error("Catalog definition error for {}: {message}", path.display())]
    Catalog { path: PathBuf, message: String },

    /// The trash collaborator failed to take a file.
    #[error("Could not move {} to trash: {message}", path.display())]
    Trash { path: PathBuf, message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON encoding error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),
}

/// `"\n  <label>: <value>"` when a value is present.
fn note<T: std::fmt::Display>(label: &str, value: Option<T>) -> String {
    value
        .map(|value| format!("\n  {}: {}", label, value))
        .unwrap_or_default()
}

impl Error {
    /// Shorthand for an `InvalidOperation` with a formatted message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }

    /// Shorthand for a `ContainerCorrupt` error.
    pub fn corrupt(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::ContainerCorrupt {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a `WriteFailed` error.
    pub fn write_failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::WriteFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// True when the error left a container in a state that needs manual
    /// inspection.
    pub fn is_partial(&self) -> bool {
        matches!(self, Error::WriteFailedPartial { .. })
    }

    /// True when the error guarantees every file was left as found.
    pub fn is_recoverable(&self) -> bool {
        !self.is_partial()
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
