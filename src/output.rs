//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output, including colored output,
//! progress tracking, and formatted tables. This module abstracts away output details,
//! making it easy to change formatting globally.

use crate::file_category::{CategorySet, ExtensionConflict, UNCATEGORIZED};
use crate::file_organizer::{ExecutionReport, ExecutionStatus};
use crate::journal::OperationRecord;
use crate::planner::Plan;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::stats::{StatsSummary, format_size};
use crate::undo::UndoReport;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Progress bars for operations
/// - Tables for plans, statistics, history and categories
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidyfold::output::OutputFormatter;
    /// OutputFormatter::success("File organized successfully!");
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

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Creates and returns a progress bar for file operations.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidyfold::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_with_message("Completed!");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        match ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            Ok(style) => pb.set_style(style.progress_chars("█▓░")),
            Err(e) => tracing::debug!(error = %e, "invalid progress bar template"),
        }
        pb
    }

    /// Prints the moves a plan would perform, then what it leaves alone.
    pub fn plan_preview(plan: &Plan) {
        if plan.entries.is_empty() {
            Self::info("Nothing to organize.");
        } else {
            Self::header("PLANNED MOVES");
            for entry in &plan.entries {
                let marker = if entry.is_renamed() {
                    " (renamed)".yellow().to_string()
                } else {
                    String::new()
                };
                println!(
                    " - {} → {}{}",
                    file_name(&entry.source_path),
                    relative_to(&entry.destination_path, &plan.root).green(),
                    marker
                );
            }
        }

        if !plan.skipped.is_empty() {
            Self::header("SKIPPED");
            for skipped in &plan.skipped {
                println!(
                    " - {}: {}",
                    file_name(&skipped.path),
                    skipped.reason.to_string().dimmed()
                );
            }
        }

        if !plan.in_place.is_empty() {
            Self::plain(&format!(
                "\n{} already in place",
                pluralize(plan.in_place.len(), "file")
            ));
        }
    }

    /// Prints a summary table with file counts and sizes by category.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidyfold::output::OutputFormatter;
    /// use tidyfold::stats::summarize;
    ///
    /// let stats = summarize([("Documents", 2048), ("Images", 512)]);
    /// OutputFormatter::summary_table(&stats);
    /// ```
    pub fn summary_table(stats: &StatsSummary) {
        Self::header("SUMMARY");

        let max_category_len = stats
            .per_category
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0)
            .max(8);

        println!(
            "{:<width$} | {:<10} | {}",
            "Category".bold(),
            "Files".bold(),
            "Size".bold(),
            width = max_category_len
        );
        println!("{}", "-".repeat(max_category_len + 25));

        for (category, entry) in &stats.per_category {
            let name = if category == UNCATEGORIZED {
                category.dimmed().to_string()
            } else {
                category.to_string()
            };
            println!(
                "{:<width$} | {:<10} | {}",
                name,
                pluralize(entry.count, "file").green(),
                format_size(entry.total_bytes),
                width = max_category_len
            );
        }

        println!("{}", "-".repeat(max_category_len + 25));
        println!(
            "{:<width$} | {:<10} | {}",
            "Total".bold(),
            pluralize(stats.total_files, "file").green().bold(),
            format_size(stats.total_bytes).bold(),
            width = max_category_len
        );
    }

    /// Prints how an execution ended.
    pub fn execution_report(report: &ExecutionReport) {
        match &report.status {
            ExecutionStatus::Completed => {
                Self::success(&format!("Organized {}.", pluralize(report.moved(), "file")));
            }
            ExecutionStatus::Failed(failure) => {
                Self::error(&failure.to_string());
                Self::warning(&format!(
                    "Stopped after {}; completed moves can be undone.",
                    pluralize(report.moved(), "file")
                ));
            }
            ExecutionStatus::Cancelled { remaining } => {
                Self::warning(&format!(
                    "Cancelled after {}; {} not moved.",
                    pluralize(report.moved(), "file"),
                    remaining
                ));
            }
        }
        if report.moved() > 0 {
            Self::plain(&format!(
                "Operation {}. Use 'tidyfold undo {}' to revert changes.",
                report.record.operation_id, report.record.operation_id
            ));
        }
    }

    /// Prints what an undo restored and what it had to leave.
    pub fn undo_report(report: &UndoReport) {
        if report.is_complete() {
            Self::success(&format!(
                "Undo complete! Restored {}.",
                pluralize(report.restored.len(), "file")
            ));
        } else {
            Self::warning(&format!(
                "Undo incomplete: restored {}, skipped {}.",
                report.restored.len(),
                report.skipped.len()
            ));
        }

        for (entry, reason) in &report.skipped {
            println!(
                "    - {}: {}",
                entry.destination_path.display(),
                reason.to_string().dimmed()
            );
        }
        if report.cancelled {
            Self::warning("Undo was cancelled before all files were processed.");
        }
        if !report.is_complete() {
            Self::warning("The operation stays in history; fix the issues and run undo again.");
        }
    }

    /// Prints recorded operations, newest first.
    pub fn history(records: &[OperationRecord]) {
        if records.is_empty() {
            Self::info("No recorded operations.");
            return;
        }
        Self::header("HISTORY");
        for record in records.iter().rev() {
            println!(
                "{}  {}  {}  {}",
                record.operation_id.cyan(),
                record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                pluralize(record.entries.len(), "file"),
                record.root.display()
            );
        }
    }

    /// Prints every category in write order along with any extension conflicts.
    pub fn categories(categories: &CategorySet) {
        Self::header("CATEGORIES");
        for category in categories.iter() {
            let extensions: Vec<_> = category.extensions().iter().map(String::as_str).collect();
            println!("{}: {}", category.name().bold(), extensions.join(", "));
        }
        Self::conflicts(categories.conflicts());
    }

    pub fn conflicts(conflicts: &[ExtensionConflict]) {
        for conflict in conflicts {
            Self::warning(&conflict.to_string());
        }
    }
}

/// A [`ProgressSink`] that advances a progress bar.
pub struct ProgressBarSink {
    bar: ProgressBar,
}

impl ProgressBarSink {
    pub fn new(total: usize) -> Self {
        Self {
            bar: OutputFormatter::create_progress_bar(total as u64),
        }
    }

    /// A sink whose bar is never drawn.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl ProgressSink for ProgressBarSink {
    fn notify(&mut self, event: ProgressEvent<'_>) {
        match event {
            ProgressEvent::Entry {
                total, source_path, ..
            } => {
                self.bar.set_length(total as u64);
                self.bar.set_message(file_name(source_path));
                self.bar.inc(1);
            }
            ProgressEvent::Finished(_) => self.bar.finish_and_clear(),
        }
    }
}

fn pluralize(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{} {}", count, word)
    } else {
        format!("{} {}s", count, word)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn relative_to(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
