//! # Ls Command Implementation
//!
//! This module implements the `ls` subcommand, which lists the assets stored
//! in the configured libraries.
//!
//! ## Functionality
//!
//! - **Asset Listing**: one line per asset with its catalog and container
//! - **Filtering**: by library, display-name glob, tag and catalog path prefix
//! - **Detailed Output**: optional long format with kind, tags and id
//!
//! Containers are opened concurrently. A container that cannot be read is
//! reported on stderr and does not stop the listing. This command is
//! read-only.

use anyhow::Result;
use clap::{Args, ValueEnum};
use std::path::PathBuf;

use asset_shelf::catalog::{normalize_path, CatalogFile};
use asset_shelf::config::EngineConfig;
use asset_shelf::library::Library;
use asset_shelf::output::{marker, Status};
use asset_shelf::suggestions;

use super::GlobalArgs;

/// List assets across libraries
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Only list this library
    #[arg(value_name = "LIBRARY")]
    pub library: Option<String>,

    /// Filter assets by display-name glob (e.g. "Chair*")
    #[arg(short, long, value_name = "PATTERN")]
    pub filter: Option<String>,

    /// Only assets carrying this tag
    #[arg(short, long, value_name = "TAG")]
    pub tag: Option<String>,

    /// Only assets in this catalog or below it
    #[arg(long, value_name = "PATH")]
    pub catalog: Option<String>,

    /// Use long listing format showing kind, tags and record id
    #[arg(short, long)]
    pub long: bool,

    /// Sort order for the listing
    #[arg(short, long, value_enum, default_value = "name")]
    pub sort: SortOrder,

    /// Show only the number of matching assets
    #[arg(long)]
    pub count: bool,
}

/// Sort order options for asset listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum SortOrder {
    /// Sort by display name
    #[default]
    Name,
    /// Sort by catalog path, then name
    Catalog,
    /// Sort by container path
    Path,
}

/// One listed asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRow {
    pub library: String,
    pub catalog: Option<String>,
    pub name: String,
    pub id: String,
    pub kind: String,
    pub tags: Vec<String>,
    pub container: PathBuf,
}

/// Execute the `ls` command.
pub fn execute(args: LsArgs, global: &GlobalArgs) -> Result<()> {
    let config = global.load_config()?;
    let mut rows = collect_rows(&args, &config, global)?;
    sort_rows(&mut rows, args.sort);

    if args.count {
        println!("{}", rows.len());
        return Ok(());
    }
    if rows.is_empty() {
        println!("No assets found");
        return Ok(());
    }
    for row in &rows {
        println!("{}", format_row(row, args.long));
    }
    Ok(())
}

fn libraries(args: &LsArgs, config: &EngineConfig) -> Result<Vec<Library>> {
    match &args.library {
        Some(name) => config
            .library(name)
            .map(|library| vec![library])
            .map_err(|_| suggestions::library_not_found(name, config)),
        None => Ok(config.all_libraries()),
    }
}

fn collect_rows(
    args: &LsArgs,
    config: &EngineConfig,
    global: &GlobalArgs,
) -> Result<Vec<AssetRow>> {
    let pattern = args
        .filter
        .as_deref()
        .map(|p| glob::Pattern::new(p).map_err(|e| suggestions::invalid_glob(p, &e)))
        .transpose()?;
    let catalog_prefix = args.catalog.as_deref().and_then(normalize_path);

    let mut rows = Vec::new();
    for library in libraries(args, config)? {
        let catalog = match library.catalog() {
            Ok(catalog) => Some(catalog),
            Err(e) => {
                log::warn!("Ignoring catalogs of {}: {}", library.name(), e);
                None
            }
        };
        for (path, result) in library.scan() {
            let container = match result {
                Ok(container) => container,
                Err(e) => {
                    eprintln!(
                        "{} {}: {}",
                        marker(&global.output, Status::Warning),
                        path.display(),
                        e
                    );
                    continue;
                }
            };
            for record in container.assets() {
                let Some(meta) = record.asset.as_ref() else {
                    continue;
                };
                let catalog_path = catalog
                    .as_ref()
                    .and_then(|c: &CatalogFile| c.path_of(meta.catalog_id.as_ref()))
                    .map(str::to_string);
                let row = AssetRow {
                    library: library.name().to_string(),
                    catalog: catalog_path,
                    name: meta.display_name.clone(),
                    id: record.id.as_str().to_string(),
                    kind: record.kind.to_string(),
                    tags: meta.tags.clone(),
                    container: path.clone(),
                };
                if matches_filters(
                    &row,
                    pattern.as_ref(),
                    args.tag.as_deref(),
                    catalog_prefix.as_deref(),
                ) {
                    rows.push(row);
                }
            }
        }
    }
    Ok(rows)
}

fn matches_filters(
    row: &AssetRow,
    pattern: Option<&glob::Pattern>,
    tag: Option<&str>,
    catalog_prefix: Option<&str>,
) -> bool {
    if pattern.is_some_and(|p| !p.matches(&row.name)) {
        return false;
    }
    if tag.is_some_and(|t| !row.tags.iter().any(|candidate| candidate == t)) {
        return false;
    }
    if let Some(prefix) = catalog_prefix {
        let Some(catalog) = row.catalog.as_deref() else {
            return false;
        };
        if catalog != prefix && !catalog.starts_with(&format!("{}/", prefix)) {
            return false;
        }
    }
    true
}

fn sort_rows(rows: &mut [AssetRow], order: SortOrder) {
    match order {
        SortOrder::Name => rows.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.container.cmp(&b.container))
        }),
        SortOrder::Catalog => rows.sort_by(|a, b| {
            a.catalog
                .cmp(&b.catalog)
                .then_with(|| a.name.cmp(&b.name))
        }),
        SortOrder::Path => rows.sort_by(|a, b| {
            a.container
                .cmp(&b.container)
                .then_with(|| a.id.cmp(&b.id))
        }),
    }
}

fn format_row(row: &AssetRow, long: bool) -> String {
    let catalog = row.catalog.as_deref().unwrap_or("Unassigned");
    if long {
        format!(
            "{:<10} {:<24} {:<28} {:<10} {:<20} {}  [{}]",
            row.library,
            catalog,
            row.name,
            row.kind,
            row.tags.join(","),
            row.container.display(),
            row.id
        )
    } else {
        format!("{:<10} {:<24} {}", row.library, catalog, row.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::Workspace;
    use asset_shelf::catalog::CatalogRef;

    fn args() -> LsArgs {
        LsArgs {
            library: None,
            filter: None,
            tag: None,
            catalog: None,
            long: false,
            sort: SortOrder::Name,
            count: false,
        }
    }

    #[test]
    fn test_collect_rows_with_catalog_filter() {
        let ws = Workspace::new();
        ws.save_chair("Chair", CatalogRef::Path("Furniture/Chairs".to_string()));
        ws.save_chair("Lamp", CatalogRef::Path("Lighting".to_string()));
        ws.save_chair("Crate", CatalogRef::Unassigned);
        let config = ws.global.load_config().unwrap();

        let all = collect_rows(&args(), &config, &ws.global).unwrap();
        assert_eq!(all.len(), 3);

        let mut filtered = args();
        filtered.catalog = Some("Furniture".to_string());
        let rows = collect_rows(&filtered, &config, &ws.global).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Chair");
        assert_eq!(rows[0].catalog.as_deref(), Some("Furniture/Chairs"));
    }

    #[test]
    fn test_collect_rows_with_glob_and_unknown_library() {
        let ws = Workspace::new();
        ws.save_chair("Chair", CatalogRef::Unassigned);
        ws.save_chair("Table", CatalogRef::Unassigned);
        let config = ws.global.load_config().unwrap();

        let mut filtered = args();
        filtered.filter = Some("T*".to_string());
        let rows = collect_rows(&filtered, &config, &ws.global).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Table");

        let mut unknown = args();
        unknown.library = Some("L3".to_string());
        let err = collect_rows(&unknown, &config, &ws.global).unwrap_err();
        assert!(err.to_string().contains("Did you mean"));
    }

    #[test]
    fn test_sort_by_catalog_puts_unassigned_first() {
        let row = |name: &str, catalog: Option<&str>| AssetRow {
            library: "L1".to_string(),
            catalog: catalog.map(str::to_string),
            name: name.to_string(),
            id: name.to_string(),
            kind: "object".to_string(),
            tags: vec![],
            container: PathBuf::from(format!("/l1/{}.shelf", name)),
        };
        let mut rows = vec![row("B", Some("Props")), row("A", None), row("C", Some("Chairs"))];
        sort_rows(&mut rows, SortOrder::Catalog);
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C", "B"]);
    }

    #[test]
    fn test_format_row_short_and_long() {
        let row = AssetRow {
            library: "L1".to_string(),
            catalog: None,
            name: "Chair".to_string(),
            id: "OBChair".to_string(),
            kind: "object".to_string(),
            tags: vec!["wood".to_string()],
            container: PathBuf::from("/l1/Chair.shelf"),
        };
        assert!(format_row(&row, false).contains("Unassigned"));
        let long = format_row(&row, true);
        assert!(long.contains("wood"));
        assert!(long.contains("[OBChair]"));
    }
}
