//! # Scanner Module
//!
//! Enumerates candidate files inside a scope and captures the stat-level
//! metadata rules are evaluated against.
//!
//! ## Example
//! ```rust,ignore
//! use file_tidy::core::scanner::{ScopeScanner, Scope};
//!
//! let scanner = ScopeScanner::new();
//! let result = scanner.scan(&Scope::recursive("/Users/me/Downloads"))?;
//! ```

mod walker;

pub use walker::ScopeScanner;

use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A folder whose files are candidates for organization
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// Root folder
    pub path: PathBuf,
    /// Whether files in subfolders are candidates too
    #[serde(default)]
    pub include_subfolders: bool,
}

impl Scope {
    pub fn new(path: impl Into<PathBuf>, include_subfolders: bool) -> Self {
        Self {
            path: path.into(),
            include_subfolders,
        }
    }

    pub fn flat(path: impl Into<PathBuf>) -> Self {
        Self::new(path, false)
    }

    pub fn recursive(path: impl Into<PathBuf>) -> Self {
        Self::new(path, true)
    }

    /// Check whether `file` lies in this scope.
    ///
    /// Paths are compared as given first; if that fails both sides are
    /// canonicalized so symlinked roots (e.g. `/var` vs `/private/var`) agree.
    pub fn contains(&self, file: &Path) -> bool {
        if self.contains_lexically(&self.path, file) {
            return true;
        }

        match (fs::canonicalize(&self.path), canonical_file_path(file)) {
            (Ok(root), Some(file)) => self.contains_lexically(&root, &file),
            _ => false,
        }
    }

    /// True when every file of `other` is also a file of this scope.
    ///
    /// Paths are compared as given.
    pub fn covers(&self, other: &Scope) -> bool {
        if self.path == other.path {
            self.include_subfolders || !other.include_subfolders
        } else {
            self.include_subfolders && other.path.starts_with(&self.path)
        }
    }

    fn contains_lexically(&self, root: &Path, file: &Path) -> bool {
        if self.include_subfolders {
            file != root && file.starts_with(root)
        } else {
            file.parent() == Some(root)
        }
    }
}

/// Canonicalize the parent so a file that was just removed still resolves.
fn canonical_file_path(file: &Path) -> Option<PathBuf> {
    let parent = fs::canonicalize(file.parent()?).ok()?;
    Some(parent.join(file.file_name()?))
}

/// Platform file attribute bits a filter can ask about.
///
/// Attributes a platform does not have are reported as `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttributes {
    pub archive: bool,
    pub hidden: bool,
    pub read_only: bool,
    pub system: bool,
    pub temporary: bool,
}

impl FileAttributes {
    #[cfg(windows)]
    fn from_metadata(_path: &Path, metadata: &fs::Metadata) -> Self {
        use std::os::windows::fs::MetadataExt;

        const READONLY: u32 = 0x1;
        const HIDDEN: u32 = 0x2;
        const SYSTEM: u32 = 0x4;
        const ARCHIVE: u32 = 0x20;
        const TEMPORARY: u32 = 0x100;

        let bits = metadata.file_attributes();
        Self {
            archive: bits & ARCHIVE != 0,
            hidden: bits & HIDDEN != 0,
            read_only: bits & READONLY != 0,
            system: bits & SYSTEM != 0,
            temporary: bits & TEMPORARY != 0,
        }
    }

    #[cfg(not(windows))]
    fn from_metadata(path: &Path, metadata: &fs::Metadata) -> Self {
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false);

        Self {
            hidden,
            read_only: metadata.permissions().readonly(),
            ..Self::default()
        }
    }
}

/// Stat-level snapshot of a candidate file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Full path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Creation time (falls back to modification time where unsupported)
    pub created: SystemTime,
    /// Last modified time
    pub modified: SystemTime,
    /// Last access time (falls back to modification time where unsupported)
    pub accessed: SystemTime,
    pub attributes: FileAttributes,
}

impl FileMetadata {
    /// Read metadata for a path
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let metadata = fs::metadata(path)?;
        Ok(Self::from_metadata(path, &metadata))
    }

    pub(crate) fn from_metadata(path: &Path, metadata: &fs::Metadata) -> Self {
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        Self {
            path: path.to_path_buf(),
            size: metadata.len(),
            created: metadata.created().unwrap_or(modified),
            modified,
            accessed: metadata.accessed().unwrap_or(modified),
            attributes: FileAttributes::from_metadata(path, metadata),
        }
    }

    /// File name as UTF-8 (lossy)
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Result of a scan operation
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Candidate files found in the scope
    pub files: Vec<FileMetadata>,
    /// Errors that occurred during scanning (non-fatal)
    pub errors: Vec<ScanError>,
}

/// Check whether a path is a Windows shortcut, which is never organized
pub fn is_shortcut(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("lnk"))
        .unwrap_or(false)
}
