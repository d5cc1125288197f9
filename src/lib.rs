//! # File Tidy
//!
//! A rule-driven file organizer.
//!
//! Files in watched folders, or in scopes visited on a schedule, are
//! matched against prioritized rules and moved, copied, renamed or
//! deleted. Name collisions are settled by a per-rule policy.
//!
//! ## Architecture
//! - `core` - Filters, rules, file operations, watching, scheduling and the engine
//! - `config` - The JSON configuration document
//! - `events` - Structured pass, watch and schedule events
//! - `error` - Error types

pub mod config;
pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use config::OrganizerConfig;
pub use error::{Result, TidyError};

/// Initialize tracing for the library
///
/// Reads the filter from `RUST_LOG`. Safe to call more than once; later
/// calls leave the first subscriber in place.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}
