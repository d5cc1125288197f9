//! Destination planning for a matched file.

use super::types::OperationMode;
use crate::error::FileOperationError;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Maps a rule destination onto the path a file should end up at
pub struct DestinationPlanner;

impl DestinationPlanner {
    /// Target path for `source` under `mode`.
    ///
    /// Move and Copy treat `destination` as a folder. Rename treats it as a
    /// file name template with `{name}`, `{ext}`, `{date}` and `{time}`.
    /// Delete has no target and yields `None`.
    pub fn plan(
        source: &Path,
        destination: Option<&Path>,
        mode: OperationMode,
        now: DateTime<Local>,
    ) -> Result<Option<PathBuf>, FileOperationError> {
        let file_name = source
            .file_name()
            .ok_or_else(|| FileOperationError::SourceMissing {
                path: source.to_path_buf(),
            })?;

        match mode {
            OperationMode::Delete => Ok(None),
            OperationMode::Move | OperationMode::Copy => {
                let folder = destination.unwrap_or_else(|| source.parent().unwrap_or(source));
                Ok(Some(folder.join(file_name)))
            }
            OperationMode::Rename => {
                let template = destination
                    .map(|d| d.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "{name}.{ext}".to_string());
                let new_name = expand_template(&template, source, now);

                if new_name.is_empty()
                    || new_name.contains(['/', '\\'])
                    || new_name == "."
                    || new_name == ".."
                {
                    return Err(FileOperationError::RenameOutsideDirectory { target: new_name });
                }

                Ok(Some(source.with_file_name(new_name)))
            }
        }
    }
}

fn expand_template(template: &str, source: &Path, now: DateTime<Local>) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = source
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();

    let expanded = template
        .replace("{name}", &stem)
        .replace("{ext}", &ext)
        .replace("{date}", &now.format("%Y%m%d").to_string())
        .replace("{time}", &now.format("%H%M%S").to_string());

    // "{name}.{ext}" on an extensionless file would leave a trailing dot
    expanded.strip_suffix('.').unwrap_or(&expanded).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap()
    }

    #[test]
    fn move_and_copy_target_the_folder() {
        let source = Path::new("/in/report.pdf");
        for mode in [OperationMode::Move, OperationMode::Copy] {
            let planned = DestinationPlanner::plan(source, Some(Path::new("/out")), mode, now());
            assert_eq!(planned.unwrap(), Some(PathBuf::from("/out/report.pdf")));
        }
    }

    #[test]
    fn delete_has_no_target() {
        let planned = DestinationPlanner::plan(
            Path::new("/in/x.tmp"),
            None,
            OperationMode::Delete,
            now(),
        );
        assert_eq!(planned.unwrap(), None);
    }

    #[test]
    fn rename_expands_template_in_place() {
        let planned = DestinationPlanner::plan(
            Path::new("/in/scan.jpg"),
            Some(Path::new("{date}-{name}.{ext}")),
            OperationMode::Rename,
            now(),
        );
        assert_eq!(
            planned.unwrap(),
            Some(PathBuf::from("/in/20240115-scan.jpg"))
        );
    }

    #[test]
    fn rename_without_extension_drops_trailing_dot() {
        let planned = DestinationPlanner::plan(
            Path::new("/in/Makefile"),
            Some(Path::new("{name}-{time}.{ext}")),
            OperationMode::Rename,
            now(),
        );
        assert_eq!(planned.unwrap(), Some(PathBuf::from("/in/Makefile-093000")));
    }

    #[test]
    fn rename_cannot_leave_the_directory() {
        let planned = DestinationPlanner::plan(
            Path::new("/in/a.txt"),
            Some(Path::new("../escape/{name}.{ext}")),
            OperationMode::Rename,
            now(),
        );
        assert!(matches!(
            planned,
            Err(FileOperationError::RenameOutsideDirectory { .. })
        ));
    }
}
