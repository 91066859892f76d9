//! Recatalog command implementation
//!
//! Files an asset under another catalog of its library. A catalog path that
//! does not exist yet is added to the library's catalog definition file once
//! the container has been written.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use asset_shelf::engine::{Operation, OperationRequest};

use super::{engine_for, parse_catalog, run_single, GlobalArgs, MutationArgs};

/// Arguments for the recatalog command
#[derive(Args, Debug)]
pub struct RecatalogArgs {
    /// Container holding the asset
    #[arg(value_name = "CONTAINER")]
    pub container: PathBuf,

    /// Asset id or display name
    #[arg(value_name = "ASSET")]
    pub asset: String,

    /// Catalog path (e.g. "Furniture/Chairs"), catalog id, or "unassigned"
    #[arg(value_name = "CATALOG")]
    pub catalog: String,

    #[command(flatten)]
    pub mutation: MutationArgs,
}

/// Execute the recatalog command
pub fn execute(args: RecatalogArgs, global: &GlobalArgs) -> Result<()> {
    let engine = engine_for(global, &args.mutation)?;
    let request = OperationRequest::new(
        &args.container,
        &args.asset,
        Operation::Recatalog {
            catalog: parse_catalog(&args.catalog),
        },
    );
    run_single(&engine, &request, &args.mutation, &global.output)
}
