//! Collision handling for destinations that already exist.

use super::types::{ConflictPolicy, Resolution, SkipReason};
use crate::error::FileOperationError;
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

/// Decides how an operation proceeds when its destination is occupied
pub struct CollisionResolver;

impl CollisionResolver {
    pub fn resolve(
        source: &Path,
        destination: &Path,
        policy: ConflictPolicy,
    ) -> Result<Resolution, FileOperationError> {
        Self::resolve_at(source, destination, policy, Local::now())
    }

    /// Resolve with an explicit clock for timestamp renames.
    ///
    /// Only stat-level metadata is read; nothing on disk is changed.
    pub fn resolve_at(
        source: &Path,
        destination: &Path,
        policy: ConflictPolicy,
        now: DateTime<Local>,
    ) -> Result<Resolution, FileOperationError> {
        if same_file(source, destination) {
            return Ok(Resolution::Skip(SkipReason::AlreadyInPlace));
        }

        let existing = match fs::symlink_metadata(destination) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(proceed(destination, false));
            }
            Err(e) => return Err(FileOperationError::from_io(destination, e)),
        };

        let resolution = match policy {
            ConflictPolicy::Skip => Resolution::Skip(SkipReason::DestinationExists),
            ConflictPolicy::Override => proceed(destination, true),
            ConflictPolicy::OverrideIfNewer => {
                let source_modified = fs::metadata(source)
                    .and_then(|m| m.modified())
                    .map_err(|e| FileOperationError::from_io(source, e))?;
                let destination_modified = existing
                    .modified()
                    .map_err(|e| FileOperationError::from_io(destination, e))?;

                if source_modified > destination_modified {
                    proceed(destination, true)
                } else {
                    Resolution::Skip(SkipReason::DestinationNotOlder)
                }
            }
            ConflictPolicy::OverrideIfSizesDiffer => {
                let source_len = fs::metadata(source)
                    .map(|m| m.len())
                    .map_err(|e| FileOperationError::from_io(source, e))?;

                if source_len != existing.len() {
                    proceed(destination, true)
                } else {
                    Resolution::Skip(SkipReason::SameSize)
                }
            }
            ConflictPolicy::RenameAppendCounter => proceed(&next_counter_name(destination), false),
            ConflictPolicy::RenameAppendTimestamp => {
                let stamped = with_suffix(destination, &format!("-{}", now.format("%Y%m%d%H%M%S")));
                // Same-second collisions fall back to a counter on the stamped name.
                if stamped.exists() {
                    proceed(&next_counter_name(&stamped), false)
                } else {
                    proceed(&stamped, false)
                }
            }
        };

        Ok(resolution)
    }
}

fn proceed(destination: &Path, replaces_existing: bool) -> Resolution {
    Resolution::Proceed {
        destination: destination.to_path_buf(),
        replaces_existing,
    }
}

/// First free `name(n).ext`, probing from 1
fn next_counter_name(destination: &Path) -> PathBuf {
    (1u64..)
        .map(|n| with_suffix(destination, &format!("({n})")))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| destination.to_path_buf())
}

/// Insert `suffix` between the stem and the extension
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    path.with_file_name(name)
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
