//! fileflow - sort files into folders by type, with preview and undo
//!
//! The pipeline scans include roots, classifies each file by extension,
//! previews where it would go (MOVE, SKIP or CONFLICT), applies the moves with
//! a conflict policy while journaling each one, and replays the journal
//! backwards to undo them.

pub mod applier;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod conflict;
pub mod file_category;
pub mod hash;
pub mod journal;
pub mod opener;
pub mod output;
pub mod pipeline;
pub mod planner;
pub mod scanner;
pub mod stream;
pub mod undo;

pub use applier::{Applier, ApplyOutcome, ApplyReport};
pub use classifier::RuleSet;
pub use config::{Config, ConfigError, ConflictPolicy, CustomRule, IncludeRoot};
pub use file_category::Category;
pub use journal::{Journal, JournalEntry};
pub use pipeline::Pipeline;
pub use planner::{Action, PlanItem, Planner};
pub use stream::CancelToken;
pub use undo::{UndoManager, UndoReport};

pub use cli::run_cli;
