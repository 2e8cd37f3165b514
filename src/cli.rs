//! Command-line interface for tidyfold.
//!
//! ## Usage
//! ```bash
//! # Preview, then organize a directory
//! tidyfold preview ~/Downloads
//! tidyfold organize ~/Downloads
//!
//! # Only large PDFs from this year
//! tidyfold organize ~/Downloads --ext pdf --min-size "1 MB" --from 2024-01-01
//!
//! # Revert the last run
//! tidyfold undo
//!
//! # Manage categories
//! tidyfold categories add Scans pdf,tiff
//! ```

use crate::config::{Config, ConfigError, FilterConfig, SizeValue};
use crate::engine::{EngineError, OrganizationEngine};
use crate::file_organizer::ExecutionStatus;
use crate::filter::{DateField, FilterSpec};
use crate::output::{OutputFormatter, ProgressBarSink};
use crate::planner::{Plan, PlanError};
use crate::progress::CancelToken;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use thiserror::Error;

/// tidyfold - sort a directory into category folders, with preview and undo
#[derive(Parser, Debug)]
#[command(name = "tidyfold")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./.tidyfoldrc.toml, then ~/.config/tidyfold/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log more (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Move files into category folders
    Organize {
        /// Directory to organize
        dir: PathBuf,

        /// Show what would happen without moving anything
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Show the full plan for a directory without moving anything
    Preview {
        dir: PathBuf,

        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Revert an organize run (the latest when no id is given)
    Undo {
        operation_id: Option<String>,
    },
    /// List recorded organize runs
    History,
    /// Show per-category counts and sizes for a directory
    Stats {
        dir: PathBuf,

        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Manage categories
    Categories {
        #[command(subcommand)]
        action: CategoryAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CategoryAction {
    /// List categories and extension conflicts
    List,
    /// Add a category
    Add {
        name: String,
        /// Extensions, with or without the leading dot
        #[arg(required = true, num_args = 1.., value_delimiter = ',')]
        extensions: Vec<String>,
    },
    /// Replace the extensions of a category
    Update {
        name: String,
        #[arg(required = true, num_args = 1.., value_delimiter = ',')]
        extensions: Vec<String>,
    },
    /// Remove a category
    Remove { name: String },
    /// Restore the built-in categories
    Reset,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateFieldArg {
    Modified,
    Created,
}

impl From<DateFieldArg> for DateField {
    fn from(field: DateFieldArg) -> Self {
        match field {
            DateFieldArg::Modified => DateField::Modified,
            DateFieldArg::Created => DateField::Created,
        }
    }
}

/// Filter flags; each one overrides the matching `[filters]` key.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only these extensions
    #[arg(long = "ext", value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Minimum size, in bytes or like "10 KB"
    #[arg(long)]
    pub min_size: Option<String>,

    /// Maximum size, in bytes or like "10 MB"
    #[arg(long)]
    pub max_size: Option<String>,

    /// Timestamp checked by --from/--to
    #[arg(long, value_enum)]
    pub date_field: Option<DateFieldArg>,

    /// Earliest date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub from: Option<String>,

    /// Latest date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub to: Option<String>,

    /// File name pattern; `*` and `?` are wildcards, otherwise a substring
    #[arg(long)]
    pub name: Option<String>,

    /// Treat --name as a regular expression
    #[arg(long, requires = "name")]
    pub regex: bool,

    /// Only files resolving to these categories
    #[arg(long = "category", value_delimiter = ',')]
    pub categories: Vec<String>,

    /// Include hidden files
    #[arg(long)]
    pub include_hidden: bool,
}

impl FilterArgs {
    /// Overrides the configured filters with the flags that were given.
    pub fn apply(&self, filters: &mut FilterConfig) {
        if !self.extensions.is_empty() {
            filters.extensions = Some(self.extensions.clone());
        }
        if let Some(min) = &self.min_size {
            filters.min_size = Some(SizeValue::Text(min.clone()));
        }
        if let Some(max) = &self.max_size {
            filters.max_size = Some(SizeValue::Text(max.clone()));
        }
        if let Some(field) = self.date_field {
            filters.date_field = field.into();
        }
        if let Some(from) = &self.from {
            filters.date_from = Some(from.clone());
        }
        if let Some(to) = &self.to {
            filters.date_to = Some(to.clone());
        }
        if let Some(name) = &self.name {
            filters.name_pattern = Some(name.clone());
            filters.name_regex = self.regex;
        }
        if !self.categories.is_empty() {
            filters.categories = Some(self.categories.clone());
        }
        if self.include_hidden {
            filters.enable_hidden_files = true;
        }
    }

    fn compile(&self, config: &Config) -> Result<FilterSpec, ConfigError> {
        let mut filters = config.filters.clone();
        self.apply(&mut filters);
        filters.compile()
    }
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error("{0}")]
    Incomplete(String),
}

/// Runs a parsed command line.
pub fn run(cli: Cli) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let mut engine = OrganizationEngine::open(&config.engine_settings())?;

    match cli.command {
        Commands::Organize {
            dir,
            dry_run,
            filters,
        } => {
            let filter = filters.compile(&config)?;
            let plan = engine.build_plan(&dir, Some(&filter))?;
            OutputFormatter::conflicts(engine.conflicts());
            if dry_run {
                OutputFormatter::dry_run_notice(&format!(
                    "Analyzing contents of: {}",
                    dir.display()
                ));
                show_preview(&plan);
                OutputFormatter::success("Dry run complete. No files were modified.");
                return Ok(());
            }
            organize(&engine, &plan)
        }
        Commands::Preview { dir, filters } => {
            let filter = filters.compile(&config)?;
            let plan = engine.build_plan(&dir, Some(&filter))?;
            OutputFormatter::conflicts(engine.conflicts());
            OutputFormatter::info(&format!("Plan for: {}", dir.display()));
            show_preview(&plan);
            Ok(())
        }
        Commands::Undo { operation_id } => undo(&engine, operation_id.as_deref()),
        Commands::History => {
            OutputFormatter::history(&engine.history());
            Ok(())
        }
        Commands::Stats { dir, filters } => {
            let filter = filters.compile(&config)?;
            let stats = engine.summarize_directory(&dir, Some(&filter))?;
            OutputFormatter::info(&format!("Statistics for: {}", dir.display()));
            OutputFormatter::summary_table(&stats);
            Ok(())
        }
        Commands::Categories { action } => manage_categories(&mut engine, action),
    }
}

fn show_preview(plan: &Plan) {
    OutputFormatter::plan_preview(plan);
    if !plan.stats.is_empty() {
        OutputFormatter::summary_table(&plan.stats);
    }
}

fn organize(engine: &OrganizationEngine, plan: &Plan) -> Result<(), CliError> {
    if plan.is_empty() {
        OutputFormatter::info("Nothing to organize.");
        return Ok(());
    }

    OutputFormatter::info(&format!("Organizing contents of: {}", plan.root.display()));
    let mut progress = ProgressBarSink::new(plan.len());
    let outcome = engine.execute(plan, &mut progress, &CancelToken::new());
    OutputFormatter::execution_report(&outcome.report);

    if let Some(e) = &outcome.persist_error {
        OutputFormatter::warning(&format!("Could not save history: {}", e));
        OutputFormatter::warning(
            "Undo may not be available. Please verify files were organized correctly.",
        );
    }

    match outcome.report.status {
        ExecutionStatus::Completed => Ok(()),
        ExecutionStatus::Failed(_) => Err(CliError::Incomplete(
            "some files could not be organized".to_string(),
        )),
        ExecutionStatus::Cancelled { .. } => {
            Err(CliError::Incomplete("organization was cancelled".to_string()))
        }
    }
}

fn undo(engine: &OrganizationEngine, operation_id: Option<&str>) -> Result<(), CliError> {
    OutputFormatter::info("Undoing previous organization...");
    let mut progress = ProgressBarSink::new(0);
    let cancel = CancelToken::new();
    let outcome = match operation_id {
        Some(id) => engine.undo(id, &mut progress, &cancel)?,
        None => engine.undo_latest(&mut progress, &cancel)?,
    };
    OutputFormatter::undo_report(&outcome.report);

    if let Some(e) = &outcome.persist_error {
        OutputFormatter::warning(&format!("Could not update history: {}", e));
    }
    if !outcome.forgotten {
        return Err(CliError::Incomplete(format!(
            "operation {} was not fully undone",
            outcome.report.operation_id
        )));
    }
    Ok(())
}

fn manage_categories(
    engine: &mut OrganizationEngine,
    action: CategoryAction,
) -> Result<(), CliError> {
    match action {
        CategoryAction::List => OutputFormatter::categories(engine.categories()),
        CategoryAction::Add { name, extensions } => {
            let conflicts = engine.add_category(&name, &extensions)?;
            OutputFormatter::success(&format!("Added category {}", name));
            OutputFormatter::conflicts(&conflicts);
        }
        CategoryAction::Update { name, extensions } => {
            let conflicts = engine.update_category(&name, &extensions)?;
            OutputFormatter::success(&format!("Updated category {}", name));
            OutputFormatter::conflicts(&conflicts);
        }
        CategoryAction::Remove { name } => {
            engine.remove_category(&name)?;
            OutputFormatter::success(&format!("Removed category {}", name));
        }
        CategoryAction::Reset => {
            engine.reset_categories()?;
            OutputFormatter::success("Categories reset to defaults");
        }
    }
    Ok(())
}
