//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `asset-shelf` command-line tool. Each subcommand is defined in its own file.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` plus the global
//!   options and performs the command's logic.
//!
//! The helpers below are shared by the mutating commands: loading the
//! configuration, building the engine, the `prompt` conflict dialog, dry-run
//! rendering and batch progress.

pub mod bundle;
pub mod catalogs;
pub mod delete;
pub mod edit;
pub mod info;
pub mod ls;
pub mod mv;
pub mod recatalog;
pub mod rename;
pub mod retag;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use dialoguer::{theme::ColorfulTheme, Select};
use indicatif::{ProgressBar, ProgressStyle};
use uuid::Uuid;

use asset_shelf::catalog::CatalogRef;
use asset_shelf::config::{self, EngineConfig};
use asset_shelf::container;
use asset_shelf::engine::batch::{self, BatchItem, BatchSummary};
use asset_shelf::engine::{
    ConflictDecision, ConflictPolicy, Engine, OperationRequest, Outcome, PreparedOperation,
};
use asset_shelf::error::Error;
use asset_shelf::output::{marker, OutputConfig, Status};
use asset_shelf::suggestions;

/// Options every subcommand receives.
#[derive(Debug)]
pub struct GlobalArgs {
    pub config: PathBuf,
    pub output: OutputConfig,
}

impl GlobalArgs {
    /// Load and validate the configuration file.
    pub fn load_config(&self) -> Result<EngineConfig> {
        if !self.config.exists() {
            return Err(suggestions::config_not_found(&self.config));
        }
        config::from_file(&self.config)
            .with_context(|| format!("Failed to load config from {}", self.config.display()))
    }
}

/// Flags shared by commands that change containers.
#[derive(Args, Debug, Clone, Default)]
pub struct MutationArgs {
    /// Show what would be done without making changes
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// How to handle an occupied destination (overrides the configuration)
    #[arg(long, value_enum, value_name = "POLICY")]
    pub on_conflict: Option<ConflictArg>,
}

/// Command-line spelling of [`ConflictPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConflictArg {
    /// Keep both by numbering the new file
    Increment,
    /// Replace the existing file
    Overwrite,
    /// Leave everything as it is
    Skip,
    /// Ask interactively
    Prompt,
}

impl From<ConflictArg> for ConflictPolicy {
    fn from(value: ConflictArg) -> Self {
        match value {
            ConflictArg::Increment => ConflictPolicy::Increment,
            ConflictArg::Overwrite => ConflictPolicy::Overwrite,
            ConflictArg::Skip => ConflictPolicy::Skip,
            ConflictArg::Prompt => ConflictPolicy::Prompt,
        }
    }
}

/// A batch finished with failures.
#[derive(Debug, thiserror::Error)]
#[error("{failed} of {total} operations failed")]
pub struct BatchFailed {
    pub failed: usize,
    pub total: usize,
    /// Failures that left files partially written
    pub partial: usize,
}

/// Process exit code for an error: 3 when files were left partially
/// written, 1 otherwise.
pub fn exit_code(error: &anyhow::Error) -> u8 {
    let partial = error.chain().any(|cause| {
        cause.downcast_ref::<Error>().is_some_and(Error::is_partial)
            || cause.downcast_ref::<BatchFailed>().is_some_and(|b| b.partial > 0)
    });
    if partial {
        3
    } else {
        1
    }
}

/// Build an engine from the configuration and the mutation flags.
pub fn engine_for(global: &GlobalArgs, mutation: &MutationArgs) -> Result<Engine> {
    let mut config = global.load_config()?;
    if let Some(policy) = mutation.on_conflict {
        config.conflict_policy = policy.into();
    }
    Ok(Engine::with_default_trash(config))
}

/// Parse a catalog argument: `unassigned` (or empty), a catalog id, or a
/// slash separated path.
pub fn parse_catalog(value: &str) -> CatalogRef {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("unassigned") {
        return CatalogRef::Unassigned;
    }
    match Uuid::parse_str(trimmed) {
        Ok(id) => CatalogRef::Id(id),
        Err(_) => CatalogRef::Path(trimmed.to_string()),
    }
}

/// Assets in `containers` whose display name or id matches `pattern`.
///
/// Returns `(container, record id)` pairs in container order. A missing or
/// corrupt container is an error before anything runs.
pub fn matching_assets(
    containers: &[PathBuf],
    pattern: Option<&str>,
    config: &EngineConfig,
) -> Result<Vec<(PathBuf, String)>> {
    let pattern = pattern.unwrap_or("*");
    let glob = glob::Pattern::new(pattern).map_err(|e| suggestions::invalid_glob(pattern, &e))?;
    let mut targets = Vec::new();
    for path in containers {
        let container = container::open(path).map_err(|e| suggestions::explain(e, config))?;
        let before = targets.len();
        targets.extend(
            container
                .assets()
                .filter(|record| glob.matches(record.label()) || glob.matches(record.id.as_str()))
                .map(|record| (path.clone(), record.id.as_str().to_string())),
        );
        if targets.len() == before {
            log::warn!("No asset in {} matches '{}'", path.display(), pattern);
        }
    }
    if targets.is_empty() {
        anyhow::bail!("No asset matches '{}'", pattern);
    }
    Ok(targets)
}

/// Prepare a request, asking the user when the `prompt` policy meets an
/// occupied destination on an interactive terminal.
pub fn prepare_interactive(
    engine: &Engine,
    request: &OperationRequest,
) -> Result<PreparedOperation> {
    match engine.prepare(request) {
        Err(Error::ConflictUnresolved { destination, .. }) if can_prompt(engine) => {
            let decision = ask_conflict(&destination)?;
            engine
                .prepare(&request.clone().with_conflict(decision))
                .map_err(|e| suggestions::explain(e, engine.config()))
        }
        other => other.map_err(|e| suggestions::explain(e, engine.config())),
    }
}

fn can_prompt(engine: &Engine) -> bool {
    engine.config().conflict_policy == ConflictPolicy::Prompt && std::io::stdin().is_terminal()
}

fn ask_conflict(destination: &Path) -> Result<ConflictDecision> {
    let choices = ["Keep both (numbered copy)", "Overwrite", "Skip"];
    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("{} already exists", destination.display()))
        .items(&choices)
        .default(0)
        .interact()?;
    Ok(match choice {
        0 => ConflictDecision::Increment,
        1 => ConflictDecision::Overwrite,
        _ => ConflictDecision::Skip,
    })
}

/// Run one request: print the plan on a dry run, apply it otherwise.
pub fn run_single(
    engine: &Engine,
    request: &OperationRequest,
    mutation: &MutationArgs,
    output: &OutputConfig,
) -> Result<()> {
    let prepared = prepare_interactive(engine, request)?;
    if mutation.dry_run {
        print_plan(output, &prepared);
        return Ok(());
    }
    let outcome = engine
        .apply(prepared)
        .map_err(|e| suggestions::explain(e, engine.config()))?;
    for line in outcome_lines(output, &outcome) {
        println!("{}", line);
    }
    Ok(())
}

/// Run several requests with a progress bar; every item runs even when an
/// earlier one failed.
pub fn run_many(
    engine: &Engine,
    requests: Vec<OperationRequest>,
    mutation: &MutationArgs,
    output: &OutputConfig,
) -> Result<()> {
    if mutation.dry_run {
        let mut failed = 0;
        for request in &requests {
            match prepare_interactive(engine, request) {
                Ok(prepared) => print_plan(output, &prepared),
                Err(e) => {
                    failed += 1;
                    println!("{} '{}': {}", marker(output, Status::Failed), request.target, e);
                }
            }
        }
        return finish(BatchSummary {
            failed,
            ..BatchSummary::default()
        }, requests.len());
    }

    let requests = decide_conflicts_upfront(engine, requests)?;
    let total = requests.len();
    let progress = if total > 1 {
        ProgressBar::new(total as u64)
    } else {
        ProgressBar::hidden()
    };
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let items = batch::run(engine, requests, |item| {
        progress.suspend(|| {
            for line in item_lines(output, item) {
                println!("{}", line);
            }
        });
        progress.set_message(item.request.target.clone());
        progress.inc(1);
    });
    progress.finish_and_clear();

    let summary = BatchSummary::from_items(&items);
    if total > 1 {
        println!(
            "{} applied, {} unchanged, {} skipped, {} failed",
            summary.applied, summary.unchanged, summary.skipped, summary.failed
        );
    }
    finish(summary, total)
}

fn finish(summary: BatchSummary, total: usize) -> Result<()> {
    if summary.failed == 0 {
        return Ok(());
    }
    Err(BatchFailed {
        failed: summary.failed,
        total,
        partial: summary.partial,
    }
    .into())
}

/// Under the `prompt` policy, ask about every occupied destination before
/// the batch starts so the progress bar is never interrupted.
fn decide_conflicts_upfront(
    engine: &Engine,
    requests: Vec<OperationRequest>,
) -> Result<Vec<OperationRequest>> {
    if !can_prompt(engine) {
        return Ok(requests);
    }
    let mut decided = Vec::with_capacity(requests.len());
    for request in requests {
        match engine.prepare(&request) {
            Err(Error::ConflictUnresolved { destination, .. }) => {
                let decision = ask_conflict(&destination)?;
                decided.push(request.with_conflict(decision));
            }
            _ => decided.push(request),
        }
    }
    Ok(decided)
}

/// Print a prepared operation as a dry run.
pub fn print_plan(output: &OutputConfig, prepared: &PreparedOperation) {
    println!(
        "{} {} '{}'",
        marker(output, Status::DryRun),
        prepared.kind(),
        prepared.target()
    );
    if let Some(destination) = prepared.skipped() {
        println!("   skip: {} already exists", destination.display());
        return;
    }
    for line in prepared.plan().to_string().lines() {
        println!("   {}", line);
    }
    for path in prepared.pending_catalogs() {
        println!("   create catalog {}", path);
    }
}

fn item_lines(output: &OutputConfig, item: &BatchItem) -> Vec<String> {
    match &item.result {
        Ok(outcome) => outcome_lines(output, outcome),
        Err(e) => vec![format!(
            "{} {} '{}' in {}: {}",
            marker(output, Status::Failed),
            item.request.operation.kind(),
            item.request.target,
            item.request.container.display(),
            e
        )],
    }
}

/// Human readable lines for an outcome.
pub fn outcome_lines(output: &OutputConfig, outcome: &Outcome) -> Vec<String> {
    let mut lines = Vec::new();
    match outcome {
        Outcome::Applied(report) => {
            lines.push(format!(
                "{} {} '{}': {}",
                marker(output, Status::Done),
                report.kind,
                report.target,
                report.location.display()
            ));
            if !report.removed.is_empty() {
                let removed: Vec<&str> = report.removed.iter().map(|id| id.as_str()).collect();
                lines.push(format!("   removed {}", removed.join(", ")));
            }
            for entry in &report.catalogs_created {
                lines.push(format!("   created catalog {}", entry.path));
            }
            for disposal in &report.disposed {
                lines.push(format!("   moved {} to trash", disposal.container.display()));
            }
            for path in &report.needs_cleanup {
                lines.push(format!(
                    "{} {} has no assets left",
                    marker(output, Status::Warning),
                    path.display()
                ));
            }
        }
        Outcome::Unchanged { target, container } => lines.push(format!(
            "{} '{}' already up to date in {}",
            marker(output, Status::Unchanged),
            target,
            container.display()
        )),
        Outcome::Skipped { target, destination } => lines.push(format!(
            "{} '{}': {} already exists",
            marker(output, Status::Skipped),
            target,
            destination.display()
        )),
    }
    lines
}
