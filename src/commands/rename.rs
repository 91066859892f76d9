//! Rename command implementation
//!
//! Changes an asset's display name. The payload datum keeps its own name.
//! When filename syncing is enabled and the container holds only this asset
//! under a file named after it, the container file is renamed as well.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use asset_shelf::engine::{Operation, OperationRequest};

use super::{engine_for, run_single, GlobalArgs, MutationArgs};

/// Arguments for the rename command
#[derive(Args, Debug)]
pub struct RenameArgs {
    /// Container holding the asset
    #[arg(value_name = "CONTAINER")]
    pub container: PathBuf,

    /// Asset id or display name
    #[arg(value_name = "ASSET")]
    pub asset: String,

    /// New display name
    #[arg(value_name = "NEW_NAME")]
    pub new_name: String,

    #[command(flatten)]
    pub mutation: MutationArgs,
}

/// Execute the rename command
pub fn execute(args: RenameArgs, global: &GlobalArgs) -> Result<()> {
    let engine = engine_for(global, &args.mutation)?;
    let request = OperationRequest::new(
        &args.container,
        &args.asset,
        Operation::Rename {
            new_name: args.new_name,
        },
    );
    run_single(&engine, &request, &args.mutation, &global.output)
}
