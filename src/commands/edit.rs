//! Edit command implementation

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use asset_shelf::engine::{MetadataPatch, Operation, OperationRequest};

use super::{engine_for, run_single, GlobalArgs, MutationArgs};

/// Arguments for the edit command
#[derive(Args, Debug)]
pub struct EditArgs {
    /// Container holding the asset
    #[arg(value_name = "CONTAINER")]
    pub container: PathBuf,

    /// Asset id or display name
    #[arg(value_name = "ASSET")]
    pub asset: String,

    /// New description
    #[arg(long)]
    pub description: Option<String>,

    /// New author
    #[arg(long)]
    pub author: Option<String>,

    /// New license
    #[arg(long)]
    pub license: Option<String>,

    /// New copyright notice
    #[arg(long)]
    pub copyright: Option<String>,

    #[command(flatten)]
    pub mutation: MutationArgs,
}

/// Execute the edit command
pub fn execute(args: EditArgs, global: &GlobalArgs) -> Result<()> {
    let patch = MetadataPatch {
        description: args.description,
        author: args.author,
        license: args.license,
        copyright: args.copyright,
    };
    if patch.is_empty() {
        anyhow::bail!(
            "Nothing to edit\n\n\
             hint: Pass at least one of --description, --author, --license, --copyright"
        );
    }
    let engine = engine_for(global, &args.mutation)?;
    let request = OperationRequest::new(
        &args.container,
        &args.asset,
        Operation::EditMetadata { patch },
    );
    run_single(&engine, &request, &args.mutation, &global.output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::Workspace;
    use asset_shelf::catalog::CatalogRef;
    use asset_shelf::container;

    #[test]
    fn test_edit_sets_only_given_fields() {
        let ws = Workspace::new();
        let chair = ws.save_chair("Chair", CatalogRef::Unassigned);
        let args = EditArgs {
            container: chair.clone(),
            asset: "Chair".to_string(),
            description: Some("A sturdy chair".to_string()),
            author: None,
            license: Some("CC0".to_string()),
            copyright: None,
            mutation: MutationArgs::default(),
        };
        execute(args, &ws.global).unwrap();

        let container = container::open(&chair).unwrap();
        let meta = container.require_asset("Chair").unwrap().asset.clone().unwrap();
        assert_eq!(meta.description, "A sturdy chair");
        assert_eq!(meta.license, "CC0");
        assert!(meta.author.is_empty());
    }

    #[test]
    fn test_edit_without_fields_fails() {
        let ws = Workspace::new();
        let chair = ws.save_chair("Chair", CatalogRef::Unassigned);
        let args = EditArgs {
            container: chair,
            asset: "Chair".to_string(),
            description: None,
            author: None,
            license: None,
            copyright: None,
            mutation: MutationArgs::default(),
        };
        let err = execute(args, &ws.global).unwrap_err();
        assert!(err.to_string().contains("Nothing to edit"));
    }
}
