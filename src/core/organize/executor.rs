//! Physical file operations.

use super::types::*;
use crate::error::FileOperationError;
use filetime::FileTime;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Applies a resolved operation to one file
pub struct OperationExecutor;

impl OperationExecutor {
    /// Perform `mode` on `source` according to `resolution`.
    ///
    /// Never fails the caller: any error becomes `Failed` for this file.
    /// A destination being replaced is only swapped out once the new
    /// content is complete; a failed operation leaves it untouched.
    pub fn apply(source: &Path, resolution: &Resolution, mode: OperationMode) -> OperationOutcome {
        let (destination, replaces_existing) = match resolution {
            Resolution::Skip(reason) => {
                debug!(path = %source.display(), %reason, "Skipped");
                return OperationOutcome::Skipped { reason: *reason };
            }
            Resolution::Proceed {
                destination,
                replaces_existing,
            } => (destination.as_path(), *replaces_existing),
        };

        let result = match mode {
            OperationMode::Move => Self::move_file(source, destination).map(|_| {
                OperationOutcome::Moved {
                    destination: destination.to_path_buf(),
                }
            }),
            OperationMode::Copy => Self::copy_file(source, destination).map(|_| {
                OperationOutcome::Copied {
                    destination: destination.to_path_buf(),
                }
            }),
            OperationMode::Delete => Self::delete_file(source).map(|_| OperationOutcome::Deleted),
            OperationMode::Rename => Self::rename_file(source, destination).map(|_| {
                OperationOutcome::Renamed {
                    destination: destination.to_path_buf(),
                }
            }),
        };

        match result {
            Ok(outcome) => {
                debug!(path = %source.display(), %mode, replaces_existing, "Applied");
                outcome
            }
            Err(e) => {
                warn!(path = %source.display(), %mode, error = %e, "File operation failed");
                OperationOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn move_file(source: &Path, destination: &Path) -> Result<(), FileOperationError> {
        ensure_source(source)?;
        create_parent(destination)?;

        match fs::rename(source, destination) {
            Ok(()) => return Ok(()),
            Err(e) if is_cross_device(&e) => {
                debug!(path = %source.display(), "Crossing volumes, copying instead");
            }
            Err(e) => return Err(FileOperationError::from_io(source, e)),
        }

        copy_into_place(source, destination)?;
        fs::remove_file(source).map_err(|e| FileOperationError::from_io(source, e))
    }

    fn copy_file(source: &Path, destination: &Path) -> Result<(), FileOperationError> {
        ensure_source(source)?;
        create_parent(destination)?;
        copy_into_place(source, destination)
    }

    fn delete_file(source: &Path) -> Result<(), FileOperationError> {
        fs::remove_file(source).map_err(|e| FileOperationError::from_io(source, e))
    }

    fn rename_file(source: &Path, destination: &Path) -> Result<(), FileOperationError> {
        if destination.parent() != source.parent() {
            return Err(FileOperationError::RenameOutsideDirectory {
                target: destination.display().to_string(),
            });
        }
        ensure_source(source)?;
        fs::rename(source, destination).map_err(|e| FileOperationError::from_io(source, e))
    }
}

fn ensure_source(source: &Path) -> Result<(), FileOperationError> {
    match fs::symlink_metadata(source) {
        Ok(_) => Ok(()),
        Err(e) => Err(FileOperationError::from_io(source, e)),
    }
}

fn create_parent(destination: &Path) -> Result<(), FileOperationError> {
    match destination.parent() {
        Some(parent) => {
            fs::create_dir_all(parent).map_err(|e| FileOperationError::from_io(parent, e))
        }
        None => Ok(()),
    }
}

/// Only a cross-volume rename falls back to copying
fn is_cross_device(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::CrossesDevices
}

/// Copy into a hidden sibling, verify its size, then rename it over
/// `destination`.
fn copy_into_place(source: &Path, destination: &Path) -> Result<(), FileOperationError> {
    let staging = staging_path(destination);
    let result = copy_with_times(source, &staging)
        .and_then(|_| verify_size(source, &staging))
        .and_then(|_| {
            fs::rename(&staging, destination)
                .map_err(|e| FileOperationError::from_io(destination, e))
        });
    if result.is_err() {
        let _ = fs::remove_file(&staging);
    }
    result
}

fn staging_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(".{name}.tidy-{}", Uuid::new_v4().simple()))
}

fn verify_size(source: &Path, copy: &Path) -> Result<(), FileOperationError> {
    let expected = fs::metadata(source)
        .map_err(|e| FileOperationError::from_io(source, e))?
        .len();
    let actual = fs::metadata(copy)
        .map_err(|e| FileOperationError::from_io(copy, e))?
        .len();
    if expected != actual {
        return Err(FileOperationError::CopyVerification {
            path: copy.to_path_buf(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Byte copy that carries access and modification times over
fn copy_with_times(source: &Path, destination: &Path) -> Result<(), FileOperationError> {
    let metadata = fs::metadata(source).map_err(|e| FileOperationError::from_io(source, e))?;
    fs::copy(source, destination).map_err(|e| FileOperationError::from_io(destination, e))?;

    let atime = FileTime::from_last_access_time(&metadata);
    let mtime = FileTime::from_last_modification_time(&metadata);
    if let Err(e) = filetime::set_file_times(destination, atime, mtime) {
        debug!(path = %destination.display(), error = %e, "Could not preserve timestamps");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn proceed(destination: PathBuf, replaces_existing: bool) -> Resolution {
        Resolution::Proceed {
            destination,
            replaces_existing,
        }
    }

    fn setup() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("in").join("report.pdf");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, b"pdf bytes").unwrap();
        (temp, source)
    }

    #[test]
    fn move_creates_folder_and_removes_source() {
        let (temp, source) = setup();
        let destination = temp.path().join("out/nested/report.pdf");

        let outcome =
            OperationExecutor::apply(&source, &proceed(destination.clone(), false), OperationMode::Move);

        assert_eq!(outcome, OperationOutcome::Moved { destination: destination.clone() });
        assert!(!source.exists());
        assert_eq!(fs::read(&destination).unwrap(), b"pdf bytes");
    }

    #[test]
    fn copy_keeps_source_and_mtime() {
        let (temp, source) = setup();
        let mtime = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&source, mtime).unwrap();
        let destination = temp.path().join("out/report.pdf");

        let outcome =
            OperationExecutor::apply(&source, &proceed(destination.clone(), false), OperationMode::Copy);

        assert!(matches!(outcome, OperationOutcome::Copied { .. }));
        assert!(source.exists());
        let copied = fs::metadata(&destination).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&copied), mtime);
    }

    #[test]
    fn delete_ignores_destination() {
        let (_temp, source) = setup();
        let outcome = OperationExecutor::apply(
            &source,
            &proceed(source.clone(), false),
            OperationMode::Delete,
        );
        assert_eq!(outcome, OperationOutcome::Deleted);
        assert!(!source.exists());
    }

    #[test]
    fn rename_stays_in_directory() {
        let (temp, source) = setup();
        let renamed = source.with_file_name("2024-report.pdf");
        let outcome =
            OperationExecutor::apply(&source, &proceed(renamed.clone(), false), OperationMode::Rename);
        assert!(matches!(outcome, OperationOutcome::Renamed { .. }));
        assert!(renamed.exists());

        let escaped = temp.path().join("elsewhere.pdf");
        let outcome =
            OperationExecutor::apply(&renamed, &proceed(escaped.clone(), false), OperationMode::Rename);
        assert!(outcome.is_failure());
        assert!(renamed.exists());
        assert!(!escaped.exists());
    }

    #[test]
    fn override_replaces_existing_content() {
        let (temp, source) = setup();
        let destination = temp.path().join("out/report.pdf");
        fs::create_dir_all(destination.parent().unwrap()).unwrap();
        fs::write(&destination, b"stale").unwrap();

        let outcome =
            OperationExecutor::apply(&source, &proceed(destination.clone(), true), OperationMode::Move);

        assert!(matches!(outcome, OperationOutcome::Moved { .. }));
        assert_eq!(fs::read(&destination).unwrap(), b"pdf bytes");
    }

    #[test]
    fn copy_over_existing_leaves_no_staging_file() {
        let (temp, source) = setup();
        let out = temp.path().join("out");
        let destination = out.join("report.pdf");
        fs::create_dir_all(&out).unwrap();
        fs::write(&destination, b"stale").unwrap();

        let outcome =
            OperationExecutor::apply(&source, &proceed(destination.clone(), true), OperationMode::Copy);

        assert!(matches!(outcome, OperationOutcome::Copied { .. }));
        assert_eq!(fs::read(&destination).unwrap(), b"pdf bytes");
        let names: Vec<_> = fs::read_dir(&out).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names, vec![std::ffi::OsString::from("report.pdf")]);
    }

    #[test]
    fn failed_replacement_keeps_the_existing_destination() {
        let temp = TempDir::new().unwrap();
        // A folder cannot be byte-copied, so the copy step fails
        let source = temp.path().join("in").join("folder.pdf");
        fs::create_dir_all(&source).unwrap();
        let destination = temp.path().join("out/folder.pdf");
        fs::create_dir_all(destination.parent().unwrap()).unwrap();
        fs::write(&destination, b"keep me").unwrap();

        let outcome =
            OperationExecutor::apply(&source, &proceed(destination.clone(), true), OperationMode::Copy);

        assert!(outcome.is_failure());
        assert_eq!(fs::read(&destination).unwrap(), b"keep me");
        assert_eq!(fs::read_dir(destination.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn only_cross_volume_errors_fall_back_to_copy() {
        assert!(is_cross_device(&io::Error::from(io::ErrorKind::CrossesDevices)));
        assert!(!is_cross_device(&io::Error::from(io::ErrorKind::PermissionDenied)));
        assert!(!is_cross_device(&io::Error::from(io::ErrorKind::NotFound)));
    }

    #[test]
    fn skip_touches_nothing() {
        let (_temp, source) = setup();
        let outcome = OperationExecutor::apply(
            &source,
            &Resolution::Skip(SkipReason::DestinationExists),
            OperationMode::Delete,
        );
        assert_eq!(
            outcome,
            OperationOutcome::Skipped {
                reason: SkipReason::DestinationExists
            }
        );
        assert!(source.exists());
    }

    #[test]
    fn missing_source_is_a_failure_not_a_panic() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("gone.txt");
        let outcome = OperationExecutor::apply(
            &source,
            &proceed(temp.path().join("out/gone.txt"), false),
            OperationMode::Move,
        );
        match outcome {
            OperationOutcome::Failed { reason } => assert!(reason.contains("not found")),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
