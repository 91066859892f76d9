//! # Info Command Implementation
//!
//! Shows what a container holds and, for one asset, the dependency tree the
//! mutation engine works with: every record the asset reaches, marked
//! `exclusive` when only this asset uses it and `shared` otherwise.
//!
//! This command is read-only.

use anyhow::Result;
use clap::Args;
use ptree::{print_tree, TreeItem};
use std::collections::HashSet;
use std::path::PathBuf;

use asset_shelf::container::{self, Container, PayloadSlot, Record};
use asset_shelf::engine::graph::{classify, Classification};
use asset_shelf::output::{marker, Status};
use asset_shelf::suggestions;

use super::GlobalArgs;

/// Show a container's records and an asset's dependencies
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Container file to inspect
    #[arg(value_name = "CONTAINER")]
    pub container: PathBuf,

    /// Asset id or display name to show the dependency tree for
    #[arg(value_name = "ASSET")]
    pub asset: Option<String>,
}

/// Execute the info command
pub fn execute(args: InfoArgs, global: &GlobalArgs) -> Result<()> {
    let config = global.load_config().unwrap_or_default();
    let container = container::open(&args.container).map_err(|e| suggestions::explain(e, &config))?;

    println!("{}", container.path().display());
    println!(
        "  format version {}, {} records, {} assets",
        container.version(),
        container.len(),
        container.asset_count()
    );
    if container.needs_cleanup() {
        println!(
            "{} no assets left; the container can be removed",
            marker(&global.output, Status::Warning)
        );
    }
    for record in container.records() {
        println!("  {}", describe_record(record));
    }

    let Some(query) = args.asset else {
        return Ok(());
    };
    let target = container
        .resolve_asset(&query)
        .map_err(|e| suggestions::explain(e, &config))?
        .id
        .clone();
    let classification =
        classify(&container, target.as_str()).map_err(|e| suggestions::explain(e, &config))?;

    println!();
    if let Some(meta) = container.get(target.as_str()).and_then(|r| r.asset.as_ref()) {
        for (label, value) in [
            ("description", &meta.description),
            ("author", &meta.author),
            ("license", &meta.license),
            ("copyright", &meta.copyright),
        ] {
            if !value.is_empty() {
                println!("{}: {}", label, value);
            }
        }
        if !meta.tags.is_empty() {
            println!("tags: {}", meta.tags.join(", "));
        }
        match meta.catalog_id {
            Some(id) => println!("catalog: {}", id),
            None => println!("catalog: Unassigned"),
        }
    }

    let tree = build_tree(&container, &classification, target.as_str(), &mut Vec::new());
    print_tree(&tree)?;

    let exclusive = classification.exclusive().count();
    let shared = classification.shared().count();
    println!("{} exclusive, {} shared", exclusive, shared);
    if classification.is_target_shared() {
        println!(
            "{} another asset depends on '{}'; it cannot be moved or deleted",
            marker(&global.output, Status::Warning),
            target
        );
    }
    Ok(())
}

fn describe_record(record: &Record) -> String {
    let payload = match &record.payload {
        PayloadSlot::Embedded { len, .. } => format!("{} bytes", len),
        PayloadSlot::External { path } => format!("-> {}", path.display()),
    };
    let asset = record
        .asset
        .as_ref()
        .map(|meta| format!(" asset '{}'", meta.display_name))
        .unwrap_or_default();
    format!("{} [{}] {} ({}){}", record.id, record.kind, record.name, payload, asset)
}

/// Tree node structure for ptree visualization
#[derive(Clone)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: std::io::Write>(
        &self,
        f: &mut W,
        _style: &ptree::Style,
    ) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> std::borrow::Cow<'_, [Self::Child]> {
        std::borrow::Cow::Borrowed(&self.children)
    }
}

/// Expand references depth first; a record already on the current path is
/// shown once more as a cycle and not expanded again.
fn build_tree(
    container: &Container,
    classification: &Classification,
    id: &str,
    path: &mut Vec<String>,
) -> TreeNode {
    let Some(record) = container.get(id) else {
        return TreeNode {
            label: format!("{} (missing)", id),
            children: Vec::new(),
        };
    };
    let marking = classification
        .get(id)
        .map(|exclusivity| format!(" [{}]", exclusivity))
        .unwrap_or_default();
    if path.iter().any(|ancestor| ancestor == id) {
        return TreeNode {
            label: format!("{} (cycle)", record.label()),
            children: Vec::new(),
        };
    }

    path.push(id.to_string());
    let mut seen = HashSet::new();
    let children = record
        .refs
        .iter()
        .filter(|child| seen.insert(child.as_str()))
        .map(|child| build_tree(container, classification, child.as_str(), path))
        .collect();
    path.pop();

    TreeNode {
        label: format!("{} ({}){}", record.label(), record.kind, marking),
        children,
    }
}
