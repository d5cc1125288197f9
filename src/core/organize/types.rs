//! Types for the organize module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// What happens to a matched file
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    /// Move into the destination folder
    #[default]
    Move,
    /// Copy into the destination folder (keep originals)
    Copy,
    /// Remove the source; destination is unused
    Delete,
    /// Rename in place using the destination as a name template
    Rename,
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationMode::Move => write!(f, "move"),
            OperationMode::Copy => write!(f, "copy"),
            OperationMode::Delete => write!(f, "delete"),
            OperationMode::Rename => write!(f, "rename"),
        }
    }
}

/// How a destination that already exists is handled
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Leave both files alone
    #[default]
    Skip,
    /// Replace the destination unconditionally
    Override,
    /// Replace only when the source was modified later
    OverrideIfNewer,
    /// Replace only when the byte lengths differ
    OverrideIfSizesDiffer,
    /// Write `name(1).ext`, `name(2).ext`, ...
    RenameAppendCounter,
    /// Write `name-YYYYMMDDHHMMSS.ext`
    RenameAppendTimestamp,
}

/// Decision taken for one destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Perform the operation onto `destination`
    Proceed {
        destination: PathBuf,
        /// An existing file at `destination` will be replaced
        replaces_existing: bool,
    },
    /// Leave the source untouched
    Skip(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Destination exists and the policy is `Skip`
    DestinationExists,
    /// Destination is at least as new as the source
    DestinationNotOlder,
    /// Destination has the same byte length
    SameSize,
    /// Source and destination are the same file
    AlreadyInPlace,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::DestinationExists => write!(f, "destination exists"),
            SkipReason::DestinationNotOlder => write!(f, "destination is not older"),
            SkipReason::SameSize => write!(f, "destination has the same size"),
            SkipReason::AlreadyInPlace => write!(f, "already in place"),
        }
    }
}

/// Per-file result of a pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OperationOutcome {
    Moved { destination: PathBuf },
    Copied { destination: PathBuf },
    Deleted,
    Renamed { destination: PathBuf },
    Skipped { reason: SkipReason },
    Failed { reason: String },
    /// No rule applied; the file was left alone
    Unmatched,
}

impl OperationOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, OperationOutcome::Failed { .. })
    }
}

/// One file's outcome plus what produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub source: PathBuf,
    /// Id of the rule that matched, if any
    pub rule_id: Option<u64>,
    pub outcome: OperationOutcome,
}

/// Counts per outcome kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub moved: usize,
    pub copied: usize,
    pub deleted: usize,
    pub renamed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub unmatched: usize,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: &OperationOutcome) {
        match outcome {
            OperationOutcome::Moved { .. } => self.moved += 1,
            OperationOutcome::Copied { .. } => self.copied += 1,
            OperationOutcome::Deleted => self.deleted += 1,
            OperationOutcome::Renamed { .. } => self.renamed += 1,
            OperationOutcome::Skipped { .. } => self.skipped += 1,
            OperationOutcome::Failed { .. } => self.failed += 1,
            OperationOutcome::Unmatched => self.unmatched += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.moved
            + self.copied
            + self.deleted
            + self.renamed
            + self.skipped
            + self.failed
            + self.unmatched
    }
}

/// Result of one pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
    pub pass_id: String,
    pub reports: Vec<FileReport>,
    /// Non-fatal enumeration errors
    pub scan_errors: Vec<String>,
    pub duration_ms: u64,
}

impl BatchResult {
    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for report in &self.reports {
            summary.record(&report.outcome);
        }
        summary
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.reports.iter().filter(|r| r.outcome.is_failure())
    }

    /// Fold another batch into this one
    pub fn absorb(&mut self, other: BatchResult) {
        self.reports.extend(other.reports);
        self.scan_errors.extend(other.scan_errors);
        self.duration_ms += other.duration_ms;
    }
}
