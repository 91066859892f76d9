//! Conflict Resolver
//!
//! Decides what happens when a mutation wants to place a container at a path
//! that is already occupied. Resolution only inspects the filesystem; it never
//! creates, truncates or removes anything.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Highest counter tried by the increment policy.
pub const MAX_INCREMENT: u32 = 9999;

/// Configured behaviour for occupied destinations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Pick the first free `name_001`, `name_002`, ...
    #[default]
    Increment,
    /// Replace the existing file atomically
    Overwrite,
    /// Abort the operation without changes
    Skip,
    /// Ask the caller; requires a [`ConflictDecision`]
    Prompt,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConflictPolicy::Increment => "increment",
            ConflictPolicy::Overwrite => "overwrite",
            ConflictPolicy::Skip => "skip",
            ConflictPolicy::Prompt => "prompt",
        };
        f.write_str(name)
    }
}

/// Answer supplied for the prompt policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictDecision {
    Increment,
    Overwrite,
    Skip,
}

/// Outcome of resolving a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The path is free to be created
    Use(PathBuf),
    /// The path is occupied and will be replaced atomically
    Overwrite(PathBuf),
    /// The caller chose not to proceed; not an error
    Skip,
}

impl Resolution {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Resolution::Use(path) | Resolution::Overwrite(path) => Some(path),
            Resolution::Skip => None,
        }
    }

    pub fn replaces_existing(&self) -> bool {
        matches!(self, Resolution::Overwrite(_))
    }
}

/// Resolve `destination` under `policy`.
///
/// A free destination is always returned as-is. For an occupied one the
/// policy decides; `Prompt` defers to `decision` and fails with
/// `ConflictUnresolved` when none was supplied.
pub fn resolve(
    destination: &Path,
    policy: ConflictPolicy,
    decision: Option<ConflictDecision>,
) -> Result<Resolution> {
    if !destination.exists() {
        return Ok(Resolution::Use(destination.to_path_buf()));
    }

    let decision = match (policy, decision) {
        (ConflictPolicy::Increment, _) => ConflictDecision::Increment,
        (ConflictPolicy::Overwrite, _) => ConflictDecision::Overwrite,
        (ConflictPolicy::Skip, _) => ConflictDecision::Skip,
        (ConflictPolicy::Prompt, Some(decision)) => decision,
        (ConflictPolicy::Prompt, None) => {
            return Err(Error::ConflictUnresolved {
                destination: destination.to_path_buf(),
                message: "policy is 'prompt' and no decision was supplied".to_string(),
            })
        }
    };

    match decision {
        ConflictDecision::Increment => increment_path(destination).map(Resolution::Use),
        ConflictDecision::Overwrite => Ok(Resolution::Overwrite(destination.to_path_buf())),
        ConflictDecision::Skip => Ok(Resolution::Skip),
    }
}

/// First free `stem_NNN.ext` next to `destination`.
pub fn increment_path(destination: &Path) -> Result<PathBuf> {
    let parent = destination.parent().unwrap_or_else(|| Path::new(""));
    let stem = destination
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = destination
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1..=MAX_INCREMENT)
        .map(|counter| parent.join(format!("{}_{:03}{}", stem, counter, extension)))
        .find(|candidate| !candidate.exists())
        .ok_or_else(|| Error::ConflictUnresolved {
            destination: destination.to_path_buf(),
            message: format!(
                "more than {} numbered versions exist; clean up old versions or pick another name",
                MAX_INCREMENT
            ),
        })
}
