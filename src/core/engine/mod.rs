//! # Engine Module
//!
//! Runs organize passes.
//!
//! A pass takes the current [`RuleSnapshot`], enumerates its target (a
//! scope or one settled path) and sends each file through rule selection,
//! destination planning, collision resolution and the executor. A failed
//! file is recorded and the pass moves on.
//!
//! ## Concurrency
//! - Passes whose roots are equal or nested never run at once; each one
//!   claims its root for its whole duration.
//! - [`OrganizeEngine::run_scopes`] drops scopes whose files another
//!   listed scope already covers, so no file is visited twice.
//! - Files within one pass are processed in order.
//! - Watch and schedule work runs on one bounded rayon pool.
//! - [`OrganizeEngine::replace_rules`] swaps the snapshot atomically; a
//!   pass takes its snapshot once it holds its claim and keeps it to the end.
//!
//! ## Example
//! ```rust,ignore
//! let engine = OrganizeEngine::new(&config, null_sender())?;
//! let batch = engine.run_pass(&Scope::flat("/Users/me/Downloads"), PassTrigger::Manual)?;
//! println!("moved {}", batch.summary().moved);
//! ```

mod claims;

use crate::config::OrganizerConfig;
use crate::core::organize::{
    BatchResult, CollisionResolver, ConflictPolicy, DestinationPlanner, FileReport,
    OperationExecutor, OperationMode, OperationOutcome, Resolution,
};
use crate::core::rules::{RuleSnapshot, SnapshotSettings, TaskGroup};
use crate::core::scanner::{is_shortcut, FileMetadata, Scope, ScopeScanner};
use crate::error::{ScanError, TidyError};
use crate::events::{Event, EventSender, PassEvent, PassTrigger};
use chrono::{DateTime, Local};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use claims::ScopeClaims;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Values that replace the matched rule's for one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassOverrides {
    pub operation: Option<OperationMode>,
    pub conflict_policy: Option<ConflictPolicy>,
}

/// Orchestrates matching and file operations
pub struct OrganizeEngine {
    rules: RwLock<Arc<RuleSnapshot>>,
    settings: SnapshotSettings,
    scanner: ScopeScanner,
    claims: ScopeClaims,
    pool: ThreadPool,
    events: EventSender,
}

impl OrganizeEngine {
    /// Compile the configured rules and start the worker pool
    pub fn new(config: &OrganizerConfig, events: EventSender) -> Result<Self, TidyError> {
        config.validate()?;

        let pool = ThreadPoolBuilder::new()
            .num_threads(config.max_concurrency)
            .thread_name(|i| format!("tidy-worker-{i}"))
            .build()
            .map_err(|e| TidyError::WorkerPool(e.to_string()))?;

        let settings = config.snapshot_settings();
        let snapshot = RuleSnapshot::compile(&config.groups, &settings);

        info!(
            rules = snapshot.active_count(),
            invalid = snapshot.errors().len(),
            workers = config.max_concurrency,
            "Engine ready"
        );

        Ok(Self {
            rules: RwLock::new(Arc::new(snapshot)),
            settings,
            scanner: ScopeScanner::new(),
            claims: ScopeClaims::default(),
            pool,
            events,
        })
    }

    /// The rule set new passes will use
    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        let guard = self.rules.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Compile `groups` and make them the active rule set.
    ///
    /// Passes already running finish with their old snapshot.
    pub fn replace_rules(&self, groups: &[TaskGroup]) -> Arc<RuleSnapshot> {
        let snapshot = Arc::new(RuleSnapshot::compile(groups, &self.settings));
        let mut guard = self.rules.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::clone(&snapshot);
        info!(rules = snapshot.active_count(), "Rules replaced");
        snapshot
    }

    /// Queue work on the shared worker pool
    pub fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn(job);
    }

    /// Organize every file in `scope`.
    ///
    /// Only a missing scope root is an error; everything below it is
    /// reported per file.
    pub fn run_pass(&self, scope: &Scope, trigger: PassTrigger) -> Result<BatchResult, ScanError> {
        let _claim = self.claims.acquire(&scope.path);
        let snapshot = self.snapshot();

        let start = Instant::now();
        let pass_id = Uuid::new_v4().to_string();
        self.events.send(Event::Pass(PassEvent::Started {
            pass_id: pass_id.clone(),
            trigger,
            target: scope.path.clone(),
        }));
        info!(%pass_id, scope = %scope.path.display(), %trigger, "Pass started");

        let scanned = match self.scanner.scan(scope) {
            Ok(scanned) => scanned,
            Err(e) => {
                warn!(%pass_id, error = %e, "Pass aborted");
                self.finish(BatchResult {
                    pass_id,
                    scan_errors: vec![e.to_string()],
                    ..Default::default()
                }, start);
                return Err(e);
            }
        };

        let mut batch = BatchResult {
            pass_id: pass_id.clone(),
            ..Default::default()
        };
        for error in scanned.errors {
            let message = error.to_string();
            self.events.send(Event::Pass(PassEvent::ScanError {
                pass_id: pass_id.clone(),
                message: message.clone(),
            }));
            batch.scan_errors.push(message);
        }

        self.events.send(Event::Pass(PassEvent::Planned {
            pass_id: pass_id.clone(),
            total_files: scanned.files.len(),
        }));

        let now = Local::now();
        let overrides = PassOverrides::default();
        for file in &scanned.files {
            let report = self.process_file(file, &snapshot, &overrides, now);
            self.record(&mut batch, report);
        }

        Ok(self.finish(batch, start))
    }

    /// Run `scopes` in parallel on the worker pool and merge the results.
    ///
    /// A scope whose files another listed scope already covers is skipped.
    pub fn run_scopes(&self, scopes: &[Scope], trigger: PassTrigger) -> BatchResult {
        let scopes = without_covered(scopes);
        let batches: Vec<BatchResult> = self.pool.install(|| {
            scopes
                .par_iter()
                .map(|scope| match self.run_pass(scope, trigger) {
                    Ok(batch) => batch,
                    Err(e) => BatchResult {
                        scan_errors: vec![e.to_string()],
                        ..Default::default()
                    },
                })
                .collect()
        });

        let mut merged = BatchResult {
            pass_id: Uuid::new_v4().to_string(),
            ..Default::default()
        };
        for batch in batches {
            merged.absorb(batch);
        }
        merged
    }

    /// Run a pass over every distinct source scope of the active rules
    pub fn run_all(&self, trigger: PassTrigger) -> BatchResult {
        let scopes = self.snapshot().scopes();
        debug!(scopes = scopes.len(), "Running all scopes");
        self.run_scopes(&scopes, trigger)
    }

    /// Organize one path that stopped changing.
    ///
    /// Returns `None` when the path is gone, is a folder, or is a shortcut.
    pub fn run_settled_path(&self, path: &Path, overrides: &PassOverrides) -> Option<BatchResult> {
        if !path.is_file() || is_shortcut(path) {
            debug!(path = %path.display(), "Settled path ignored");
            return None;
        }

        let snapshot = self.snapshot();
        let file = FileMetadata::from_path(path).ok()?;
        let start = Instant::now();
        let pass_id = Uuid::new_v4().to_string();
        self.events.send(Event::Pass(PassEvent::Started {
            pass_id: pass_id.clone(),
            trigger: PassTrigger::FileChange,
            target: path.to_path_buf(),
        }));

        let mut batch = BatchResult {
            pass_id,
            ..Default::default()
        };

        let root = snapshot
            .select(&file)
            .map(|rule| rule.rule.source.path.clone());
        let report = match root {
            Some(root) => {
                let _claim = self.claims.acquire(&root);
                // A pass holding the claim may have moved the file already.
                if !path.is_file() {
                    debug!(path = %path.display(), "Settled path handled by another pass");
                    return None;
                }
                let snapshot = self.snapshot();
                let file = FileMetadata::from_path(path).ok()?;
                self.process_file(&file, &snapshot, overrides, Local::now())
            }
            None => FileReport {
                source: path.to_path_buf(),
                rule_id: None,
                outcome: OperationOutcome::Unmatched,
            },
        };

        self.record(&mut batch, report);
        Some(self.finish(batch, start))
    }

    fn process_file(
        &self,
        file: &FileMetadata,
        snapshot: &RuleSnapshot,
        overrides: &PassOverrides,
        now: DateTime<Local>,
    ) -> FileReport {
        let source = file.path.clone();
        let Some(rule) = snapshot.select(file) else {
            debug!(path = %source.display(), "No rule matched");
            return FileReport {
                source,
                rule_id: None,
                outcome: OperationOutcome::Unmatched,
            };
        };

        let mode = overrides.operation.unwrap_or(rule.operation());
        let policy = overrides.conflict_policy.unwrap_or(rule.conflict_policy);
        debug!(
            path = %source.display(),
            rule = %rule.rule.name,
            %mode,
            ?policy,
            "Rule selected"
        );

        let resolution = DestinationPlanner::plan(&source, rule.rule.destination.as_deref(), mode, now)
            .and_then(|target| match target {
                Some(destination) => CollisionResolver::resolve_at(&source, &destination, policy, now),
                None => Ok(Resolution::Proceed {
                    destination: source.clone(),
                    replaces_existing: false,
                }),
            });

        let outcome = match resolution {
            Ok(resolution) => OperationExecutor::apply(&source, &resolution, mode),
            Err(e) => {
                warn!(path = %source.display(), error = %e, "Could not resolve destination");
                OperationOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        FileReport {
            source,
            rule_id: Some(rule.id()),
            outcome,
        }
    }

    fn record(&self, batch: &mut BatchResult, report: FileReport) {
        self.events.send(Event::Pass(PassEvent::FileProcessed {
            pass_id: batch.pass_id.clone(),
            report: report.clone(),
        }));
        batch.reports.push(report);
    }

    fn finish(&self, mut batch: BatchResult, start: Instant) -> BatchResult {
        batch.duration_ms = start.elapsed().as_millis() as u64;
        let summary = batch.summary();
        info!(
            pass_id = %batch.pass_id,
            moved = summary.moved,
            copied = summary.copied,
            deleted = summary.deleted,
            renamed = summary.renamed,
            skipped = summary.skipped,
            failed = summary.failed,
            unmatched = summary.unmatched,
            "Pass completed"
        );
        self.events.send(Event::Pass(PassEvent::Completed {
            pass_id: batch.pass_id.clone(),
            summary,
            duration_ms: batch.duration_ms,
        }));
        batch
    }
}

/// Drop every scope another scope in the list covers; equal scopes keep
/// their first occurrence
fn without_covered(scopes: &[Scope]) -> Vec<Scope> {
    let resolved: Vec<Scope> = scopes
        .iter()
        .map(|scope| Scope {
            path: std::fs::canonicalize(&scope.path).unwrap_or_else(|_| scope.path.clone()),
            include_subfolders: scope.include_subfolders,
        })
        .collect();

    scopes
        .iter()
        .enumerate()
        .filter(|&(i, _)| {
            !resolved.iter().enumerate().any(|(j, other)| {
                j != i
                    && other.covers(&resolved[i])
                    && (j < i || !resolved[i].covers(other))
            })
        })
        .map(|(_, scope)| scope.clone())
        .collect()
}
