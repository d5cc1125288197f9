//! # Error Module
//!
//! Error types for the file organizer.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, rule names, the offending value
//! - **Per-file failures stay local** - a pass reports them and keeps going

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum TidyError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Watch setup error: {0}")]
    Watch(#[from] WatchSetupError),

    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("File operation error: {0}")]
    Operation(#[from] FileOperationError),

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(String),
}

/// Malformed rule, filter or config file
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Unknown {field} operator '{value}'")]
    UnknownOperator { field: &'static str, value: String },

    #[error("Unknown {field} unit '{value}'")]
    UnknownUnit { field: &'static str, value: String },

    #[error("Invalid {field} value '{value}'")]
    InvalidValue { field: &'static str, value: String },

    #[error("Invalid regular expression '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error("Invalid glob '{pattern}': {reason}")]
    InvalidGlob { pattern: String, reason: String },

    #[error("Rule '{rule}' needs a destination for {operation}")]
    MissingDestination { rule: String, operation: String },

    #[error("Failed to read config file {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("Failed to parse config file {path}: {reason}")]
    ParseFailed { path: PathBuf, reason: String },

    #[error("max_concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("{count} rule(s) failed to compile")]
    InvalidRules { count: usize },

    #[error("No config file given and no default config directory on this platform")]
    NoConfigPath,
}

/// Failure of a single file operation. Recorded on that file only.
#[derive(Error, Debug)]
pub enum FileOperationError {
    #[error("Source file not found: {path}")]
    SourceMissing { path: PathBuf },

    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("File is in use: {path}")]
    InUse { path: PathBuf },

    #[error("Path is too long: {path}")]
    PathTooLong { path: PathBuf },

    #[error("Disk is full while writing {path}")]
    DiskFull { path: PathBuf },

    #[error("Rename target '{target}' leaves the source directory")]
    RenameOutsideDirectory { target: String },

    #[error("Copy verification failed for {path}: source {expected} bytes, destination {actual} bytes")]
    CopyVerification {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FileOperationError {
    /// Classify an I/O error raised while touching `path`.
    pub fn from_io(path: impl Into<PathBuf>, error: io::Error) -> Self {
        let path = path.into();

        match error.kind() {
            io::ErrorKind::NotFound => return FileOperationError::SourceMissing { path },
            io::ErrorKind::PermissionDenied => {
                return FileOperationError::PermissionDenied { path }
            }
            _ => {}
        }

        match error.raw_os_error() {
            Some(code) if os_codes::IN_USE.contains(&code) => FileOperationError::InUse { path },
            Some(code) if os_codes::PATH_TOO_LONG.contains(&code) => {
                FileOperationError::PathTooLong { path }
            }
            Some(code) if os_codes::DISK_FULL.contains(&code) => {
                FileOperationError::DiskFull { path }
            }
            _ => FileOperationError::Io {
                path,
                source: error,
            },
        }
    }
}

#[cfg(windows)]
mod os_codes {
    pub const IN_USE: &[i32] = &[32, 33];
    pub const PATH_TOO_LONG: &[i32] = &[206];
    pub const DISK_FULL: &[i32] = &[39, 112];
}

#[cfg(not(windows))]
mod os_codes {
    // EBUSY, ETXTBSY
    pub const IN_USE: &[i32] = &[16, 26];
    // ENAMETOOLONG (linux, macOS)
    pub const PATH_TOO_LONG: &[i32] = &[36, 63];
    // ENOSPC, EDQUOT (linux, macOS)
    pub const DISK_FULL: &[i32] = &[28, 122, 69];
}

/// A WatchSpec could not be registered
#[derive(Error, Debug, Clone)]
pub enum WatchSetupError {
    #[error("Failed to initialize watcher: {0}")]
    InitFailed(String),

    #[error("Watch folder not found: {path}")]
    PathNotFound { path: PathBuf },

    #[error("Watch path is not a folder: {path}")]
    NotADirectory { path: PathBuf },

    #[error("Failed to watch {path}: {reason}")]
    WatchFailed { path: PathBuf, reason: String },

    #[error("Watch registry has been stopped")]
    Stopped,
}

/// A ScheduleSpec could not be registered or evaluated
#[derive(Error, Debug, Clone)]
pub enum ScheduleError {
    #[error("Cron expression '{expression}' needs a cron evaluator")]
    NoCronEvaluator { expression: String },

    #[error("Cron evaluation failed for '{expression}': {reason}")]
    EvaluationFailed { expression: String, reason: String },

    #[error("Interval schedule must be longer than zero")]
    EmptyInterval,

    #[error("Cron schedule has neither an expression nor fields")]
    MissingCronExpression,

    #[error("Unknown schedule id {0}")]
    UnknownSchedule(usize),
}

/// Errors that occur while enumerating a scope
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, TidyError>;
