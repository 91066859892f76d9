//! Bundle command implementation
//!
//! Copies assets from one or more containers into a single new container,
//! named `<name>_<date>.shelf`, for handing a set of assets to someone else.
//! The sources are left as they are.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use asset_shelf::engine::bundle::{BundleItem, BundleRequest};
use asset_shelf::output::{marker, Status};
use asset_shelf::suggestions;

use super::{engine_for, matching_assets, GlobalArgs, MutationArgs};

/// Arguments for the bundle command
#[derive(Args, Debug)]
pub struct BundleArgs {
    /// Containers holding the assets to bundle
    #[arg(value_name = "CONTAINER", required = true)]
    pub containers: Vec<PathBuf>,

    /// Folder the bundle is written to
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output: PathBuf,

    /// Bundle name; the date is appended (default: AssetBundle)
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Only assets whose name or id matches this glob
    #[arg(short, long, value_name = "PATTERN")]
    pub asset: Option<String>,

    /// Do not copy the libraries' catalog files next to the bundle
    #[arg(long)]
    pub no_catalog: bool,

    #[command(flatten)]
    pub mutation: MutationArgs,
}

/// Execute the bundle command
pub fn execute(args: BundleArgs, global: &GlobalArgs) -> Result<()> {
    let engine = engine_for(global, &args.mutation)?;
    let items = matching_assets(&args.containers, args.asset.as_deref(), engine.config())?
        .into_iter()
        .map(|(container, target)| BundleItem { container, target })
        .collect();
    let request = BundleRequest {
        items,
        output_dir: args.output,
        name: args.name,
        copy_catalog: !args.no_catalog,
    };

    let prepared = engine
        .prepare_bundle(&request)
        .map_err(|e| suggestions::explain(e, engine.config()))?;
    if args.mutation.dry_run {
        println!(
            "{} bundle {} asset(s) into {}",
            marker(&global.output, Status::DryRun),
            prepared.assets.len(),
            prepared.destination.display()
        );
        for line in prepared.plan.to_string().lines() {
            println!("   {}", line);
        }
        return Ok(());
    }

    let outcome = engine
        .apply_bundle(prepared)
        .map_err(|e| suggestions::explain(e, engine.config()))?;
    println!(
        "{} Bundled {} asset(s) into {}",
        marker(&global.output, Status::Done),
        outcome.assets,
        outcome.path.display()
    );
    for path in &outcome.catalog_files {
        println!("   catalog file {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::Workspace;
    use asset_shelf::catalog::CatalogRef;
    use asset_shelf::container;

    fn bundle_args(containers: Vec<PathBuf>, output: PathBuf) -> BundleArgs {
        BundleArgs {
            containers,
            output,
            name: Some("Kit".to_string()),
            asset: None,
            no_catalog: false,
            mutation: MutationArgs::default(),
        }
    }

    fn bundles(dir: &std::path::Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.extension().is_some_and(|e| e == "shelf"))
            .collect()
    }

    #[test]
    fn test_bundle_collects_assets_and_keeps_sources() {
        let ws = Workspace::new();
        let chair = ws.save_chair("Chair", CatalogRef::Path("Furniture".to_string()));
        let stool = ws.save_chair("Stool", CatalogRef::Unassigned);
        let before = std::fs::read(&chair).unwrap();

        let args = bundle_args(vec![chair.clone(), stool.clone()], ws.path("out"));
        execute(args, &ws.global).unwrap();

        let written = bundles(&ws.path("out"));
        assert_eq!(written.len(), 1);
        let bundle = container::open(&written[0]).unwrap();
        let mut assets: Vec<_> = bundle.assets().map(|r| r.id.as_str()).collect();
        assets.sort_unstable();
        assert_eq!(assets, vec!["Chair", "Stool"]);
        assert!(bundle.get("Chair_Wood").is_some());
        assert!(bundle.get("Stool_Wood").is_some());
        assert_eq!(std::fs::read(&chair).unwrap(), before);
        assert!(stool.exists());
        assert!(ws.path("out/Kit.asset_catalogs.txt").exists());
    }

    #[test]
    fn test_bundle_dry_run_writes_nothing() {
        let ws = Workspace::new();
        let chair = ws.save_chair("Chair", CatalogRef::Unassigned);
        let mut args = bundle_args(vec![chair], ws.path("out"));
        args.mutation.dry_run = true;

        execute(args, &ws.global).unwrap();

        assert!(!ws.path("out").exists());
    }

    #[test]
    fn test_bundle_without_catalog_copy() {
        let ws = Workspace::new();
        let chair = ws.save_chair("Chair", CatalogRef::Path("Furniture".to_string()));
        let mut args = bundle_args(vec![chair], ws.path("out"));
        args.no_catalog = true;

        execute(args, &ws.global).unwrap();

        assert_eq!(bundles(&ws.path("out")).len(), 1);
        assert!(!ws.path("out/Kit.asset_catalogs.txt").exists());
    }
}
