//! # Asset Shelf Library
//!
//! Manages libraries of reusable assets stored in `.shelf` container files.
//! A container holds several records; some of them are *assets* carrying
//! metadata (display name, tags, catalog), the others are plain data the
//! assets depend on. The library renames, retags, recatalogs, moves and
//! deletes assets without ever breaking a reference or leaving a container
//! half written.
//!
//! It is used by the `asset-shelf` command-line tool, and hosts that produce
//! new assets can hand them over through [`engine::Engine::save_new`].
//!
//! ## Quick Example
//!
//! ```
//! use asset_shelf::config;
//! use asset_shelf::naming::{sanitize_name, MAX_NAME_LENGTH};
//!
//! let config = config::parse(
//!     r#"
//! libraries:
//!   - name: Props
//!     path: /assets/props
//! conflict_policy: skip
//! "#,
//! )
//! .unwrap();
//! assert_eq!(config.libraries.len(), 1);
//! assert_eq!(sanitize_name("Chair: <v2>", MAX_NAME_LENGTH), "Chair_ _v2_");
//! ```
//!
//! ## Core Concepts
//!
//! - **Containers (`container`)**: the on-disk format and a read-only,
//!   lazily loading reader.
//! - **Libraries (`library`, `catalog`)**: configured root folders and their
//!   catalog definition files.
//! - **Configuration (`config`)**: explicitly passed settings; nothing is
//!   read from global state.
//! - **Engine (`engine`)**: dependency classification, planning, conflict
//!   resolution and the atomic writer.
//!
//! ## Guarantees
//!
//! A mutation either fully applies or leaves every file as it found it, with
//! one reported exception: when a multi-file commit fails halfway the error is
//! `WriteFailedPartial` and names what needs inspection. Records another asset
//! still depends on are never removed.

pub mod catalog;
pub mod config;
pub mod container;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod library;
pub mod naming;
pub mod output;
pub mod suggestions;

#[cfg(test)]
mod graph_proptest;
