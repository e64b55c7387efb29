//! Command-line interface module for fileflow.
//!
//! This module handles all CLI-related functionality including:
//! - Command parsing
//! - Configuration loading with fallback to defaults
//! - Preview, apply and undo orchestration
//! - Status line and summary output

use crate::applier::ApplyOutcome;
use crate::config::{Config, default_config_path};
use crate::opener;
use crate::output::OutputFormatter;
use crate::pipeline::Pipeline;
use crate::planner::Action;
use crate::stream::{CancelToken, DEFAULT_CAPACITY};
use crate::undo::{UndoManager, UndoOutcome};
use clap::{ArgAction, Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(
    name = "fileflow",
    version,
    about = "Sort files into folders by type, with preview and undo"
)]
pub struct Cli {
    /// Configuration file (defaults to ./.fileflowrc.toml, then the user config)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show what would happen to each file
    Preview {
        /// Maximum number of rows to display (defaults to preview_limit)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Move files into their folders
    Apply {
        /// Resolve conflicts and report, but change nothing
        #[arg(long)]
        dry_run: bool,
    },

    /// Move files back to where they were
    Undo {
        /// Undo every journaled move instead of only the latest apply
        #[arg(long)]
        all: bool,
    },

    /// Empty the journal; moves made so far can no longer be undone
    ResetJournal,

    /// Write the default configuration to a file
    InitConfig {
        /// Where to write it (defaults to the user config location)
        path: Option<PathBuf>,
    },

    /// Open the folder containing a path in the file browser
    Reveal { path: PathBuf },
}

/// Runs the CLI application with the parsed arguments.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use fileflow::cli::{Cli, run_cli};
///
/// let cli = Cli::parse_from(["fileflow", "preview"]);
/// if let Err(e) = run_cli(cli) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Preview { limit } => preview(&load_pipeline(cli.config.as_deref()), limit),
        Command::Apply { dry_run } => apply(&load_pipeline(cli.config.as_deref()), dry_run),
        Command::Undo { all } => undo(&load_pipeline(cli.config.as_deref()), all),
        Command::ResetJournal => reset_journal(&load_pipeline(cli.config.as_deref())),
        Command::InitConfig { path } => init_config(path),
        Command::Reveal { path } => {
            opener::reveal(&path);
            Ok(())
        }
    }
}

/// Loads the configuration, falling back to the defaults if it is unusable.
fn load_pipeline(config_path: Option<&Path>) -> Pipeline {
    let (config, error) = Config::load_or_default(config_path);
    if let Some(e) = error {
        OutputFormatter::warning(&format!("{}; using the default configuration", e));
    }
    Pipeline::new(config)
}

/// The folder name a MOVE item lands in.
fn destination_folder(destination: &Path) -> String {
    destination
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn preview(pipeline: &Pipeline, limit: Option<usize>) -> Result<(), String> {
    let limit = limit.unwrap_or(pipeline.config().preview_limit);
    let plan = pipeline
        .preview()
        .map_err(|e| format!("Error preparing preview: {}", e))?;

    for root in &pipeline.config().roots {
        OutputFormatter::info(&format!("Scanning {}", root.path.display()));
    }

    let mut shown = 0;
    let mut hidden = 0;
    let mut skips = 0;
    let mut conflicts = 0;
    let mut folder_counts = BTreeMap::new();

    for item in plan {
        match item.action {
            Action::Move => {
                *folder_counts
                    .entry(destination_folder(&item.destination))
                    .or_insert(0) += 1;
            }
            Action::Skip => skips += 1,
            Action::Conflict => conflicts += 1,
        }
        if shown < limit {
            OutputFormatter::plan_item(&item);
            shown += 1;
        } else {
            hidden += 1;
        }
    }

    if hidden > 0 {
        OutputFormatter::info(&format!("... {} more not shown", hidden));
    }
    if shown + hidden == 0 {
        OutputFormatter::plain("No files found to sort.");
        return Ok(());
    }

    let moves = folder_counts.values().sum();
    OutputFormatter::summary_table(&folder_counts, moves);
    OutputFormatter::plain(&format!("Skipped: {}", skips));
    if conflicts > 0 {
        OutputFormatter::warning(&format!(
            "{} conflicts will be left in place (conflict_policy = {})",
            conflicts,
            pipeline.config().conflict_policy
        ));
    }
    Ok(())
}

fn apply(pipeline: &Pipeline, dry_run: bool) -> Result<(), String> {
    let token = CancelToken::new();
    let plan = pipeline
        .preview_stream(token.clone(), DEFAULT_CAPACITY)
        .map_err(|e| format!("Error preparing plan: {}", e))?;

    if dry_run {
        OutputFormatter::dry_run_notice("No files will be moved.");
    }

    let spinner = OutputFormatter::create_spinner(if dry_run { "checked" } else { "moved" });
    let mut folder_counts = BTreeMap::new();
    let report = pipeline.apply_with(plan, dry_run, &token, |outcome| {
        spinner.suspend(|| OutputFormatter::apply_outcome(outcome));
        if let ApplyOutcome::DryRun { destination, .. } = outcome {
            *folder_counts
                .entry(destination_folder(destination))
                .or_insert(0) += 1;
        }
        spinner.inc(1);
    });
    spinner.finish_and_clear();

    if dry_run {
        let total = folder_counts.values().sum();
        OutputFormatter::summary_table(&folder_counts, total);
        OutputFormatter::success("Dry run complete. No files were modified.");
        OutputFormatter::plain("Run 'fileflow apply' (without --dry-run) to move them.");
    } else {
        OutputFormatter::apply_summary(&report);
        if report.moved() > 0 {
            OutputFormatter::plain(&format!(
                "Journal: {}. Use 'fileflow undo' to revert this run.",
                pipeline.journal().path().display()
            ));
        }
    }

    if report.errors() > 0 {
        OutputFormatter::warning("Some files could not be moved. Please review errors above.");
    }
    Ok(())
}

fn undo(pipeline: &Pipeline, all: bool) -> Result<(), String> {
    let journal = pipeline.journal();
    let pending = if all {
        journal.entries().map(|e| e.len()).map_err(|e| e.to_string())
    } else {
        UndoManager::latest_batch_len(journal).map_err(|e| e.to_string())
    }
    .map_err(|e| format!("Error reading journal: {}", e))?;

    if pending == 0 {
        OutputFormatter::plain(&format!(
            "Nothing to undo (journal: {}).",
            journal.path().display()
        ));
        return Ok(());
    }

    OutputFormatter::info(&format!("Restoring from journal: {}", journal.path().display()));
    let pb = OutputFormatter::create_progress_bar(pending as u64);
    let on_outcome = |outcome: &UndoOutcome| {
        pb.println(OutputFormatter::undo_outcome(outcome));
        pb.inc(1);
    };

    let report = if all {
        pipeline.undo_all_with(on_outcome)
    } else {
        pipeline.undo_latest_with(on_outcome)
    }
    .map_err(|e| format!("Error: {}", e))?;
    pb.finish_and_clear();

    OutputFormatter::undo_summary(&report);
    Ok(())
}

fn reset_journal(pipeline: &Pipeline) -> Result<(), String> {
    pipeline
        .reset_journal()
        .map_err(|e| format!("Error: {}", e))?;
    OutputFormatter::success(&format!(
        "Journal reset: {}",
        pipeline.journal().path().display()
    ));
    Ok(())
}

fn init_config(path: Option<PathBuf>) -> Result<(), String> {
    let path = path
        .or_else(default_config_path)
        .ok_or_else(|| "Could not determine a configuration directory".to_string())?;

    if path.exists() {
        return Err(format!(
            "{} already exists; remove it first to start over",
            path.display()
        ));
    }

    Config::default()
        .save(&path)
        .map_err(|e| format!("Error writing configuration: {}", e))?;
    OutputFormatter::success(&format!("Wrote default configuration to {}", path.display()));
    Ok(())
}
