//! Retag command implementation

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use asset_shelf::engine::{Operation, OperationRequest};

use super::{engine_for, run_single, GlobalArgs, MutationArgs};

/// Arguments for the retag command
#[derive(Args, Debug)]
pub struct RetagArgs {
    /// Container holding the asset
    #[arg(value_name = "CONTAINER")]
    pub container: PathBuf,

    /// Asset id or display name
    #[arg(value_name = "ASSET")]
    pub asset: String,

    /// New tags; each value may hold a comma separated list
    #[arg(value_name = "TAG", required_unless_present = "clear")]
    pub tags: Vec<String>,

    /// Remove every tag
    #[arg(long, conflicts_with = "tags")]
    pub clear: bool,

    #[command(flatten)]
    pub mutation: MutationArgs,
}

/// Execute the retag command
pub fn execute(args: RetagArgs, global: &GlobalArgs) -> Result<()> {
    let engine = engine_for(global, &args.mutation)?;
    let tags = if args.clear { Vec::new() } else { args.tags };
    let request = OperationRequest::new(&args.container, &args.asset, Operation::Retag { tags });
    run_single(&engine, &request, &args.mutation, &global.output)
}
