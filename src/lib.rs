//! tidyfold - a file organization engine
//!
//! This library sorts the files of a directory into category folders by
//! extension. It provides the category model, a filter engine, a plan builder
//! with conflict-free destinations, journaled execution with undo, and
//! per-category statistics.

pub mod cli;
pub mod config;
pub mod engine;
pub mod file_category;
pub mod file_organizer;
pub mod filter;
pub mod journal;
pub mod metadata;
pub mod output;
pub mod planner;
pub mod progress;
pub mod stats;
pub mod store;
pub mod undo;

pub use config::{Config, ConfigError, FilterConfig};
pub use engine::{EngineError, EngineSettings, OrganizationEngine};
pub use file_category::{Category, CategoryError, CategorySet, ExtensionConflict, UNCATEGORIZED};
pub use file_organizer::{ExecutionReport, FileOrganizer, MoveFailure};
pub use filter::{DateField, FilterSpec, FilterValidationError, NamePattern};
pub use journal::{MoveRecord, OperationLog, OperationRecord};
pub use metadata::FileRecord;
pub use planner::{Plan, PlanEntry, PlanError, SkipReason, build_plan};
pub use progress::{CancelToken, ProgressEvent, ProgressSink};
pub use stats::{StatsSummary, summarize};
pub use undo::{UndoManager, UndoReport, UndoSkipReason};

/// Installs the `tracing` subscriber used by the binary.
///
/// `RUST_LOG` wins when set; otherwise `verbosity` picks the level
/// (0 = warn, 1 = info, 2+ = debug).
pub fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    if let Err(e) = result {
        eprintln!("Warning: could not install logger: {}", e);
    }
}
