//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use asset_shelf::defaults::default_config_path;
use asset_shelf::output::OutputConfig;

use crate::commands;

/// Asset Shelf - Safely manage asset libraries stored in .shelf containers
#[derive(Parser, Debug)]
#[command(name = "asset-shelf")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "ASSET_SHELF_CONFIG",
        default_value_os_t = default_config_path()
    )]
    config: PathBuf,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List assets across the configured libraries
    Ls(commands::ls::LsArgs),

    /// Show a container's records and an asset's dependency tree
    Info(commands::info::InfoArgs),

    /// List a library's catalogs
    Catalogs(commands::catalogs::CatalogsArgs),

    /// Change an asset's display name
    Rename(commands::rename::RenameArgs),

    /// Replace an asset's tags
    Retag(commands::retag::RetagArgs),

    /// Assign an asset to another catalog
    Recatalog(commands::recatalog::RecatalogArgs),

    /// Edit an asset's description, author, license or copyright
    Edit(commands::edit::EditArgs),

    /// Move assets to another library
    #[command(name = "move")]
    Move(commands::mv::MoveArgs),

    /// Delete assets and the data only they use
    Delete(commands::delete::DeleteArgs),

    /// Copy assets into one new container for sharing
    Bundle(commands::bundle::BundleArgs),
}

impl Cli {
    /// Output settings from `--color` and the environment
    pub fn output(&self) -> OutputConfig {
        OutputConfig::from_env_and_flag(&self.color)
    }

    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);
        let output = self.output();
        let global = commands::GlobalArgs {
            config: self.config,
            output,
        };

        match self.command {
            Commands::Ls(args) => commands::ls::execute(args, &global),
            Commands::Info(args) => commands::info::execute(args, &global),
            Commands::Catalogs(args) => commands::catalogs::execute(args, &global),
            Commands::Rename(args) => commands::rename::execute(args, &global),
            Commands::Retag(args) => commands::retag::execute(args, &global),
            Commands::Recatalog(args) => commands::recatalog::execute(args, &global),
            Commands::Edit(args) => commands::edit::execute(args, &global),
            Commands::Move(args) => commands::mv::execute(args, &global),
            Commands::Delete(args) => commands::delete::execute(args, &global),
            Commands::Bundle(args) => commands::bundle::execute(args, &global),
        }
    }
}

/// `RUST_LOG` wins over `--log-level` when set.
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    // A second init (tests driving several commands) is harmless
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "asset-shelf",
            "ls",
            "--config",
            "/tmp/shelf.yaml",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/tmp/shelf.yaml"));
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command, Commands::Ls(_)));
    }

    #[test]
    fn test_parse_move_subcommand() {
        let cli = Cli::try_parse_from([
            "asset-shelf",
            "move",
            "Chair.shelf",
            "--library",
            "Props",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Commands::Move(args) => {
                assert_eq!(args.library, "Props");
                assert!(args.mutation.dry_run);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_bundle_subcommand() {
        let cli = Cli::try_parse_from([
            "asset-shelf",
            "bundle",
            "Chair.shelf",
            "Table.shelf",
            "--output",
            "/tmp/share",
            "--no-catalog",
        ])
        .unwrap();
        match cli.command {
            Commands::Bundle(args) => {
                assert_eq!(args.containers.len(), 2);
                assert_eq!(args.output, PathBuf::from("/tmp/share"));
                assert!(args.no_catalog);
                assert!(args.name.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
