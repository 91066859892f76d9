//! Delete command implementation
//!
//! Removes assets together with the records only they use. Records another
//! asset depends on are never removed. A container left with no records is
//! moved to the trash folder, never erased.

use anyhow::Result;
use clap::Args;
use dialoguer::{theme::ColorfulTheme, Confirm};
use std::io::IsTerminal;
use std::path::PathBuf;

use asset_shelf::engine::{Operation, OperationRequest};

use super::{engine_for, matching_assets, run_many, GlobalArgs, MutationArgs};

/// Arguments for the delete command
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Containers holding the assets to delete
    #[arg(value_name = "CONTAINER", required = true)]
    pub containers: Vec<PathBuf>,

    /// Only assets whose name or id matches this glob
    #[arg(short, long, value_name = "PATTERN")]
    pub asset: Option<String>,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,

    #[command(flatten)]
    pub mutation: MutationArgs,
}

/// Execute the delete command
pub fn execute(args: DeleteArgs, global: &GlobalArgs) -> Result<()> {
    let engine = engine_for(global, &args.mutation)?;
    let targets = matching_assets(&args.containers, args.asset.as_deref(), engine.config())?;

    if !args.yes && !args.mutation.dry_run && std::io::stdin().is_terminal() {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Delete {} asset(s)?", targets.len()))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted");
            return Ok(());
        }
    }

    let requests = targets
        .into_iter()
        .map(|(container, target)| OperationRequest::new(container, target, Operation::Delete))
        .collect();
    run_many(&engine, requests, &args.mutation, &global.output)
}
