//! # Folder Watcher Module
//!
//! Organizes files as they arrive in watched folders.
//!
//! ## Features
//! - One `notify` watcher and one [`ChangeDebouncer`] per [`WatchSpec`]
//! - Settled paths are dispatched onto the engine's worker pool
//! - Per-watch operation and conflict policy overrides
//! - `stop_all` cancels pending timers; queued work that has not started is dropped
//!
//! ## Example
//! ```rust,ignore
//! let registry = WatchRegistry::new(Arc::clone(&engine), sender);
//! registry.register(WatchSpec::new("/Users/me/Downloads"))?;
//!
//! // later
//! registry.stop_all();
//! ```

mod debouncer;

pub use debouncer::{ChangeDebouncer, ChangeKind, DebounceHandle, SettledEvent};

use crate::core::engine::{OrganizeEngine, PassOverrides};
use crate::core::organize::{ConflictPolicy, OperationMode};
use crate::error::WatchSetupError;
use crate::events::{Event, EventSender, WatchEvent};
use crossbeam_channel::unbounded;
use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

fn default_debounce_seconds() -> f64 {
    2.0
}

/// A folder to watch and how to treat its changes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchSpec {
    pub path: PathBuf,
    #[serde(default)]
    pub recursive: bool,
    /// Quiet period before a changed path is organized
    #[serde(default = "default_debounce_seconds")]
    pub debounce_seconds: f64,
    /// Replaces the matched rule's operation
    #[serde(default)]
    pub operation: Option<OperationMode>,
    /// Replaces the matched rule's conflict policy
    #[serde(default)]
    pub conflict_policy: Option<ConflictPolicy>,
}

impl WatchSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            recursive: false,
            debounce_seconds: default_debounce_seconds(),
            operation: None,
            conflict_policy: None,
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn debounce(mut self, seconds: f64) -> Self {
        self.debounce_seconds = seconds;
        self
    }

    /// Debounce delay; negative or non-finite values mean no delay
    pub fn debounce_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.debounce_seconds).unwrap_or(Duration::ZERO)
    }

    pub fn overrides(&self) -> PassOverrides {
        PassOverrides {
            operation: self.operation,
            conflict_policy: self.conflict_policy,
        }
    }
}

struct ActiveWatch {
    spec: WatchSpec,
    watcher: Option<RecommendedWatcher>,
    debouncer: ChangeDebouncer,
    dispatcher: Option<JoinHandle<()>>,
}

impl ActiveWatch {
    fn stop(&mut self) {
        // Dropping the notify watcher ends raw events; stopping the
        // debouncer closes the settled channel, which ends the dispatcher.
        self.watcher.take();
        self.debouncer.stop();
        if let Some(dispatcher) = self.dispatcher.take() {
            let _ = dispatcher.join();
        }
    }
}

/// Every active folder watch, stoppable as a group
pub struct WatchRegistry {
    engine: Arc<OrganizeEngine>,
    events: EventSender,
    watches: Mutex<Vec<ActiveWatch>>,
    stopped: Arc<AtomicBool>,
}

impl WatchRegistry {
    pub fn new(engine: Arc<OrganizeEngine>, events: EventSender) -> Self {
        Self {
            engine,
            events,
            watches: Mutex::new(Vec::new()),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start watching `spec.path`.
    ///
    /// Fails immediately when the folder is missing or cannot be watched;
    /// other registered watches are unaffected.
    pub fn register(&self, spec: WatchSpec) -> Result<(), WatchSetupError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(WatchSetupError::Stopped);
        }

        let path = spec.path.clone();
        let metadata = std::fs::metadata(&path)
            .map_err(|_| WatchSetupError::PathNotFound { path: path.clone() })?;
        if !metadata.is_dir() {
            return Err(WatchSetupError::NotADirectory { path });
        }

        let (settled_tx, settled_rx) = unbounded();
        let mut debouncer = ChangeDebouncer::spawn(spec.debounce_duration(), settled_tx);

        let handle = debouncer.handle();
        let events = self.events.clone();
        let watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
            match result {
                Ok(event) => {
                    if let Some(kind) = change_kind(&event.kind) {
                        for path in event.paths {
                            events.try_send(Event::Watch(WatchEvent::Changed {
                                path: path.clone(),
                                kind,
                            }));
                            handle.notify(path, kind);
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Watcher error");
                    events.try_send(Event::Watch(WatchEvent::Error {
                        message: e.to_string(),
                    }));
                }
            }
        });

        let mut watcher = match watcher {
            Ok(watcher) => watcher,
            Err(e) => {
                debouncer.stop();
                return Err(WatchSetupError::InitFailed(e.to_string()));
            }
        };

        let mode = if spec.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        if let Err(e) = watcher.watch(&path, mode) {
            debouncer.stop();
            return Err(WatchSetupError::WatchFailed {
                path,
                reason: e.to_string(),
            });
        }

        let dispatcher = self.spawn_dispatcher(&spec, settled_rx);

        info!(path = %path.display(), recursive = spec.recursive, "Watching folder");
        self.events.send(Event::Watch(WatchEvent::Started {
            path,
            recursive: spec.recursive,
        }));

        let mut watches = self.watches.lock().unwrap_or_else(|e| e.into_inner());
        watches.push(ActiveWatch {
            spec,
            watcher: Some(watcher),
            debouncer,
            dispatcher,
        });
        Ok(())
    }

    /// Hand settled paths to the engine's pool until the debouncer exits
    fn spawn_dispatcher(
        &self,
        spec: &WatchSpec,
        settled: crossbeam_channel::Receiver<SettledEvent>,
    ) -> Option<JoinHandle<()>> {
        let engine = Arc::clone(&self.engine);
        let events = self.events.clone();
        let stopped = Arc::clone(&self.stopped);
        let overrides = spec.overrides();

        thread::Builder::new()
            .name("tidy-watch".into())
            .spawn(move || {
                for event in settled.iter() {
                    if stopped.load(Ordering::SeqCst) {
                        break;
                    }
                    events.try_send(Event::Watch(WatchEvent::Settled {
                        path: event.path.clone(),
                        kind: event.kind,
                    }));
                    if event.kind == ChangeKind::Removed {
                        continue;
                    }

                    let job_engine = Arc::clone(&engine);
                    let stopped = Arc::clone(&stopped);
                    let overrides = overrides.clone();
                    engine.spawn(move || {
                        if stopped.load(Ordering::SeqCst) {
                            debug!(path = %event.path.display(), "Dropped after stop");
                            return;
                        }
                        job_engine.run_settled_path(&event.path, &overrides);
                    });
                }
            })
            .map_err(|e| warn!(error = %e, "Failed to start watch dispatcher"))
            .ok()
    }

    /// Stop every watch.
    ///
    /// Pending debounce timers are cancelled and no new file operations
    /// start; operations already running finish.
    pub fn stop_all(&self) {
        self.stopped.store(true, Ordering::SeqCst);

        let mut watches = self.watches.lock().unwrap_or_else(|e| e.into_inner());
        let paths: Vec<PathBuf> = watches.iter().map(|w| w.spec.path.clone()).collect();
        for watch in watches.iter_mut() {
            watch.stop();
        }
        watches.clear();

        if !paths.is_empty() {
            info!(count = paths.len(), "Stopped all watches");
        }
        self.events.send(Event::Watch(WatchEvent::Stopped { paths }));
    }

    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.watches
            .lock()
            .map(|watches| watches.iter().map(|w| w.spec.path.clone()).collect())
            .unwrap_or_default()
    }

    pub fn is_watching(&self, path: impl AsRef<Path>) -> bool {
        self.watched_paths().iter().any(|p| p == path.as_ref())
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Drop for WatchRegistry {
    fn drop(&mut self) {
        if !self.is_stopped() {
            self.stop_all();
        }
    }
}

/// Map a notify event kind onto the changes that matter here
fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Renamed),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrganizerConfig;
    use crate::events::null_sender;
    use notify::event::{AccessKind, CreateKind, RenameMode};
    use tempfile::TempDir;

    fn registry() -> WatchRegistry {
        let engine = OrganizeEngine::new(&OrganizerConfig::default(), null_sender()).unwrap();
        WatchRegistry::new(Arc::new(engine), null_sender())
    }

    #[test]
    fn spec_defaults_from_json() {
        let spec: WatchSpec = serde_json::from_str(r#"{ "path": "/in" }"#).unwrap();
        assert!(!spec.recursive);
        assert_eq!(spec.debounce_duration(), Duration::from_secs(2));
        assert!(spec.operation.is_none());
    }

    #[test]
    fn invalid_debounce_means_no_delay() {
        assert_eq!(WatchSpec::new("/in").debounce(-1.0).debounce_duration(), Duration::ZERO);
        assert_eq!(
            WatchSpec::new("/in").debounce(f64::NAN).debounce_duration(),
            Duration::ZERO
        );
    }

    #[test]
    fn change_kinds_are_mapped() {
        assert_eq!(
            change_kind(&EventKind::Create(CreateKind::File)),
            Some(ChangeKind::Created)
        );
        assert_eq!(
            change_kind(&EventKind::Modify(ModifyKind::Name(RenameMode::To))),
            Some(ChangeKind::Renamed)
        );
        assert_eq!(change_kind(&EventKind::Access(AccessKind::Any)), None);
    }

    #[test]
    fn missing_folder_fails_fast() {
        let registry = registry();
        let result = registry.register(WatchSpec::new("/nonexistent/path/that/doesnt/exist"));
        assert!(matches!(result, Err(WatchSetupError::PathNotFound { .. })));
        assert!(registry.watched_paths().is_empty());
    }

    #[test]
    fn file_is_not_a_watch_folder() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();

        let result = registry().register(WatchSpec::new(&file));
        assert!(matches!(result, Err(WatchSetupError::NotADirectory { .. })));
    }

    #[test]
    fn registry_tracks_and_stops_watches() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let registry = registry();

        registry.register(WatchSpec::new(first.path())).unwrap();
        registry
            .register(WatchSpec::new(second.path()).recursive(true))
            .unwrap();
        assert!(registry.is_watching(first.path()));
        assert_eq!(registry.watched_paths().len(), 2);

        registry.stop_all();
        assert!(registry.watched_paths().is_empty());
        assert!(matches!(
            registry.register(WatchSpec::new(first.path())),
            Err(WatchSetupError::Stopped)
        ));
    }
}
