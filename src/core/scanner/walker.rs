//! Directory walking implementation using walkdir.

use super::{is_shortcut, FileMetadata, ScanResult, Scope};
use crate::error::ScanError;
use tracing::debug;
use walkdir::WalkDir;

/// Enumerates the files of a scope
#[derive(Debug, Clone, Default)]
pub struct ScopeScanner {
    /// Whether to follow symbolic links
    follow_symlinks: bool,
}

impl ScopeScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// List every regular file in the scope.
    ///
    /// A missing root is fatal; unreadable entries below it are collected
    /// in [`ScanResult::errors`] and the walk continues.
    pub fn scan(&self, scope: &Scope) -> Result<ScanResult, ScanError> {
        let root = &scope.path;

        if !root.is_dir() {
            return Err(ScanError::DirectoryNotFound { path: root.clone() });
        }

        let mut walker = WalkDir::new(root)
            .follow_links(self.follow_symlinks)
            .min_depth(1)
            .sort_by_file_name();
        if !scope.include_subfolders {
            walker = walker.max_depth(1);
        }

        let mut result = ScanResult::default();

        for entry_result in walker {
            match entry_result {
                Ok(entry) => {
                    if !entry.file_type().is_file() || is_shortcut(entry.path()) {
                        continue;
                    }

                    match entry.metadata() {
                        Ok(metadata) => result
                            .files
                            .push(FileMetadata::from_metadata(entry.path(), &metadata)),
                        Err(e) => {
                            let path = entry.path().to_path_buf();
                            result.errors.push(ScanError::ReadDirectory {
                                path,
                                source: std::io::Error::new(
                                    std::io::ErrorKind::Other,
                                    e.to_string(),
                                ),
                            });
                        }
                    }
                }
                Err(e) => {
                    let path = e.path().map(|p| p.to_path_buf()).unwrap_or_default();

                    let error = if e.io_error().map(|e| e.kind())
                        == Some(std::io::ErrorKind::PermissionDenied)
                    {
                        ScanError::PermissionDenied { path }
                    } else {
                        ScanError::ReadDirectory {
                            path,
                            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
                        }
                    };
                    result.errors.push(error);
                }
            }
        }

        debug!(
            scope = %root.display(),
            files = result.files.len(),
            errors = result.errors.len(),
            "scope scanned"
        );

        Ok(result)
    }
}
