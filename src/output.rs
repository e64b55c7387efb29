//! Output formatting and styling module.
//!
//! All user-facing CLI output goes through [`OutputFormatter`]: colored status
//! lines for plan items, apply and undo outcomes, progress bars and the
//! per-folder summary table. Diagnostics go through `tracing` instead.

use crate::applier::{ApplyOutcome, ApplyReport};
use crate::planner::{Action, PlanItem};
use crate::undo::{UndoOutcome, UndoReport};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::time::Duration;

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Status lines for plan items and outcomes
/// - Progress bars and spinners
/// - Summary tables with per-folder counts
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use fileflow::output::OutputFormatter;
    /// OutputFormatter::success("Journal reset");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// One preview row, colored by action.
    pub fn plan_item(item: &PlanItem) {
        let line = item.to_string();
        let styled = match item.action {
            Action::Move => line.normal(),
            Action::Skip => line.dimmed(),
            Action::Conflict => line.yellow(),
        };
        println!("{}", styled);
    }

    /// The status line for one apply outcome.
    pub fn apply_outcome(outcome: &ApplyOutcome) {
        let line = outcome.to_string();
        match outcome {
            ApplyOutcome::Moved { .. } => println!("{}", line.green()),
            ApplyOutcome::DryRun { .. } => println!("{}", line.yellow()),
            ApplyOutcome::Duplicate { .. } | ApplyOutcome::Skipped { .. } => {
                println!("{}", line.dimmed())
            }
            ApplyOutcome::Failed { .. } | ApplyOutcome::Unjournaled { .. } => {
                eprintln!("{}", line.red())
            }
        }
    }

    /// The status line for one undo outcome.
    pub fn undo_outcome(outcome: &UndoOutcome) -> String {
        let line = outcome.to_string();
        match outcome {
            UndoOutcome::Restored { .. } => line.green().to_string(),
            UndoOutcome::Missing { .. } => line.yellow().to_string(),
            UndoOutcome::Failed { .. } => line.red().to_string(),
        }
    }

    /// Creates and returns a progress bar for file operations.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use fileflow::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_with_message("Completed!");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// A spinner for passes whose length is not known up front.
    pub fn create_spinner(message: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {pos} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Prints a summary table of file counts by destination folder.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use fileflow::output::OutputFormatter;
    /// use std::collections::BTreeMap;
    ///
    /// let mut counts = BTreeMap::new();
    /// counts.insert("Docs".to_string(), 15);
    /// counts.insert("Images".to_string(), 8);
    /// OutputFormatter::summary_table(&counts, 23);
    /// ```
    pub fn summary_table(folder_counts: &BTreeMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let width = folder_counts
            .keys()
            .map(String::len)
            .max()
            .unwrap_or(0)
            .max("Folder".len());

        println!(
            "{:<width$} | {}",
            "Folder".bold(),
            "Files".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 10));

        for (folder, count) in folder_counts {
            println!(
                "{:<width$} | {} {}",
                folder,
                count.to_string().green(),
                plural(*count),
                width = width
            );
        }

        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural(total_files),
            width = width
        );
    }

    pub fn apply_summary(report: &ApplyReport) {
        Self::header("APPLY COMPLETE");
        println!("  Moved:      {}", report.moved());
        if report.would_move() > 0 {
            println!("  Would move: {}", report.would_move());
        }
        println!("  Duplicates: {}", report.duplicates());
        println!("  Skipped:    {}", report.skipped());
        if report.errors() > 0 {
            println!("  Errors:     {}", report.errors().to_string().red());
        }
        if report.cancelled {
            Self::warning("Cancelled. Files already moved stay moved; run undo to revert them.");
        }
    }

    pub fn undo_summary(report: &UndoReport) {
        Self::header("UNDO COMPLETE");
        println!("  Entries:  {}", report.total_processed());
        println!("  Restored: {}", report.restored());
        println!("  Missing:  {}", report.missing());
        if report.failed() > 0 {
            println!("  Failed:   {}", report.failed().to_string().red());
        }
        for backup in report.backups() {
            Self::warning(&format!("A file was in the way and was kept as {}", backup.display()));
        }
        if report.is_complete_success() {
            Self::success("Every journaled move was reverted.");
        }
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}
