//! Catalogs command implementation
//!
//! Lists the catalogs defined in a library's catalog definition file with
//! the number of assets filed under each. Assets pointing at an id the file
//! does not define are counted as unknown.

use anyhow::Result;
use clap::Args;
use std::collections::BTreeMap;

use asset_shelf::library::Library;
use asset_shelf::suggestions;
use uuid::Uuid;

use super::GlobalArgs;

/// List the catalogs of a library
#[derive(Args, Debug)]
pub struct CatalogsArgs {
    /// Library name
    #[arg(value_name = "LIBRARY")]
    pub library: String,

    /// Also print catalog ids
    #[arg(long)]
    pub ids: bool,
}

/// Asset counts per catalog id; `None` is Unassigned.
fn count_assets(library: &Library) -> BTreeMap<Option<Uuid>, usize> {
    let mut counts = BTreeMap::new();
    for (path, result) in library.scan() {
        match result {
            Ok(container) => {
                for meta in container.assets().filter_map(|record| record.asset.as_ref()) {
                    *counts.entry(meta.catalog_id).or_insert(0) += 1;
                }
            }
            Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
        }
    }
    counts
}

/// Execute the catalogs command
pub fn execute(args: CatalogsArgs, global: &GlobalArgs) -> Result<()> {
    let config = global.load_config()?;
    let library = config
        .library(&args.library)
        .map_err(|_| suggestions::library_not_found(&args.library, &config))?;
    let catalog = library.catalog().map_err(|e| suggestions::explain(e, &config))?;
    let mut counts = count_assets(&library);

    let mut entries: Vec<_> = catalog.entries().collect();
    entries.sort_by(|a, b| a.path.cmp(&b.path));

    println!("{:>5}  Unassigned", counts.remove(&None).unwrap_or(0));
    for entry in entries {
        let count = counts.remove(&Some(entry.id)).unwrap_or(0);
        if args.ids {
            println!("{:>5}  {}  {}", count, entry.path, entry.id);
        } else {
            println!("{:>5}  {}", count, entry.path);
        }
    }
    let unknown: usize = counts.values().sum();
    if unknown > 0 {
        println!("{:>5}  (unknown catalog id)", unknown);
    }
    Ok(())
}
