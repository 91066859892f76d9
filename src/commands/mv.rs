//! Move command implementation
//!
//! Moves assets into another library. Each asset travels with every record
//! it depends on; records other assets still use stay behind in the source.
//! With `--into`, the assets are appended to an existing container instead
//! of getting a container of their own.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use asset_shelf::engine::{Operation, OperationRequest};

use super::{engine_for, matching_assets, parse_catalog, run_many, GlobalArgs, MutationArgs};

/// Arguments for the move command
#[derive(Args, Debug)]
pub struct MoveArgs {
    /// Containers holding the assets to move
    #[arg(value_name = "CONTAINER", required = true)]
    pub containers: Vec<PathBuf>,

    /// Destination library name
    #[arg(short, long, value_name = "NAME")]
    pub library: String,

    /// Destination catalog path or id (default: unassigned)
    #[arg(short, long, value_name = "CATALOG", default_value = "")]
    pub catalog: String,

    /// Append to this existing container instead of creating one
    #[arg(long, value_name = "FILE")]
    pub into: Option<PathBuf>,

    /// Only assets whose name or id matches this glob
    #[arg(short, long, value_name = "PATTERN")]
    pub asset: Option<String>,

    #[command(flatten)]
    pub mutation: MutationArgs,
}

/// Execute the move command
pub fn execute(args: MoveArgs, global: &GlobalArgs) -> Result<()> {
    let engine = engine_for(global, &args.mutation)?;
    let catalog = parse_catalog(&args.catalog);
    let requests = matching_assets(&args.containers, args.asset.as_deref(), engine.config())?
        .into_iter()
        .map(|(container, target)| {
            OperationRequest::new(
                container,
                target,
                Operation::Move {
                    library: args.library.clone(),
                    catalog: catalog.clone(),
                    into: args.into.clone(),
                },
            )
        })
        .collect();
    run_many(&engine, requests, &args.mutation, &global.output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::Workspace;
    use asset_shelf::catalog::CatalogRef;
    use asset_shelf::container;

    fn move_args(containers: Vec<PathBuf>, library: &str) -> MoveArgs {
        MoveArgs {
            containers,
            library: library.to_string(),
            catalog: String::new(),
            into: None,
            asset: None,
            mutation: MutationArgs::default(),
        }
    }

    #[test]
    fn test_move_to_other_library() {
        let ws = Workspace::new();
        let chair = ws.save_chair("Chair", CatalogRef::Unassigned);
        let stool = ws.save_chair("Stool", CatalogRef::Unassigned);

        execute(move_args(vec![chair.clone(), stool.clone()], "L2"), &ws.global).unwrap();

        assert!(!chair.exists());
        assert!(!stool.exists());
        let moved = container::open(ws.path("L2/Chair.shelf")).unwrap();
        assert!(moved.contains("Chair"));
        assert!(moved.contains("Chair_Wood"));
        assert!(ws.path("L2/Stool.shelf").exists());
    }

    #[test]
    fn test_move_unknown_library_suggests() {
        let ws = Workspace::new();
        let chair = ws.save_chair("Chair", CatalogRef::Unassigned);
        let err = execute(move_args(vec![chair.clone()], "L3"), &ws.global).unwrap_err();
        assert!(err.to_string().contains("1 of 1 operations failed"));
        assert!(chair.exists());
    }

    #[test]
    fn test_move_into_existing_container() {
        let ws = Workspace::new();
        let chair = ws.save_chair("Chair", CatalogRef::Unassigned);
        let stool = ws.save_chair("Stool", CatalogRef::Unassigned);

        let mut args = move_args(vec![stool.clone()], "L1");
        args.into = Some(chair.clone());
        execute(args, &ws.global).unwrap();

        assert!(!stool.exists());
        let merged = container::open(&chair).unwrap();
        assert_eq!(merged.asset_count(), 2);
        assert!(merged.contains("Stool_Wood"));
    }
}
