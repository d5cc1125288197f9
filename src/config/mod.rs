//! # Config Module
//!
//! The organizer's configuration file.
//!
//! Rules, watches and schedules come from one JSON document, by default
//! `<config dir>/file-tidy/config.json`. The engine reads it once and works
//! from compiled snapshots afterwards.
//!
//! ## Example
//! ```rust,ignore
//! let config = OrganizerConfig::load(OrganizerConfig::default_path().unwrap())?;
//! let engine = OrganizeEngine::new(&config, null_sender())?;
//! ```

use crate::core::filter::DEFAULT_CONTENT_READ_LIMIT;
use crate::core::organize::ConflictPolicy;
use crate::core::rules::{SnapshotSettings, TaskGroup};
use crate::core::schedule::ScheduleSpec;
use crate::core::watcher::WatchSpec;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default bound on concurrently running passes
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Default time allowed for shutdown passes
pub const DEFAULT_SHUTDOWN_DEADLINE_SECS: u64 = 10;

/// Everything the organizer needs to run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizerConfig {
    pub groups: Vec<TaskGroup>,
    pub watches: Vec<WatchSpec>,
    pub schedules: Vec<ScheduleSpec>,
    /// Worker pool size for watch and schedule passes
    pub max_concurrency: usize,
    pub shutdown_deadline_secs: u64,
    /// Upper bound on bytes read per file by content filters
    pub content_read_limit_bytes: usize,
    /// Used by rules that do not name a policy
    pub default_conflict_policy: ConflictPolicy,
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            watches: Vec::new(),
            schedules: Vec::new(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            shutdown_deadline_secs: DEFAULT_SHUTDOWN_DEADLINE_SECS,
            content_read_limit_bytes: DEFAULT_CONTENT_READ_LIMIT,
            default_conflict_policy: ConflictPolicy::Skip,
        }
    }
}

impl OrganizerConfig {
    /// `<config dir>/file-tidy/config.json`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("file-tidy").join("config.json"))
    }

    /// Read and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config = Self::from_json(&text).map_err(|e| match e {
            ConfigError::ParseFailed { reason, .. } => ConfigError::ParseFailed {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;

        debug!(
            path = %path.display(),
            groups = config.groups.len(),
            watches = config.watches.len(),
            schedules = config.schedules.len(),
            "Loaded config"
        );
        Ok(config)
    }

    /// Parse and validate a JSON document
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|e| ConfigError::ParseFailed {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        Ok(())
    }

    pub fn snapshot_settings(&self) -> SnapshotSettings {
        SnapshotSettings {
            content_read_limit: self.content_read_limit_bytes,
            default_conflict_policy: self.default_conflict_policy,
        }
    }

    pub fn shutdown_deadline(&self) -> Duration {
        Duration::from_secs(self.shutdown_deadline_secs)
    }
}
