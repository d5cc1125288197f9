//! # Core Module
//!
//! The organizing engine.
//!
//! ## Modules
//! - `scanner` - Enumerates candidate files in a scope
//! - `filter` - Compiles filter definitions into predicates
//! - `rules` - Task rules and rule selection
//! - `organize` - Destination planning, collision resolution and file operations
//! - `watcher` - Folder watches with per-path debounce
//! - `schedule` - Startup, shutdown, interval and cron triggers
//! - `engine` - Runs passes over scopes and settled paths

pub mod engine;
pub mod filter;
pub mod organize;
pub mod rules;
pub mod scanner;
pub mod schedule;
pub mod watcher;

// Re-export commonly used types
pub use engine::{OrganizeEngine, PassOverrides};
pub use organize::{BatchResult, ConflictPolicy, OperationMode, OperationOutcome};
pub use rules::{RuleSnapshot, TaskGroup, TaskRule};
pub use scanner::Scope;
