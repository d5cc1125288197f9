//! Event type definitions for pass, watch and schedule reporting.

use crate::core::organize::{BatchSummary, FileReport};
use crate::core::watcher::ChangeKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// All events emitted by the organizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Organize pass events
    Pass(PassEvent),
    /// Folder watch events
    Watch(WatchEvent),
    /// Schedule events
    Schedule(ScheduleEvent),
}

/// What started a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassTrigger {
    Manual,
    Startup,
    Shutdown,
    Interval,
    Cron,
    FileChange,
}

impl fmt::Display for PassTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PassTrigger::Manual => "manual",
            PassTrigger::Startup => "startup",
            PassTrigger::Shutdown => "shutdown",
            PassTrigger::Interval => "interval",
            PassTrigger::Cron => "cron",
            PassTrigger::FileChange => "file change",
        };
        f.write_str(label)
    }
}

/// Events during an organize pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PassEvent {
    /// A pass has started over `target` (a scope root or a single file)
    Started {
        pass_id: String,
        trigger: PassTrigger,
        target: PathBuf,
    },
    /// Files enumerated and about to be processed
    Planned { pass_id: String, total_files: usize },
    /// One file was handled
    FileProcessed { pass_id: String, report: FileReport },
    /// Enumeration hit an error but the pass continues
    ScanError { pass_id: String, message: String },
    /// The pass finished
    Completed {
        pass_id: String,
        summary: BatchSummary,
        duration_ms: u64,
    },
}

/// Events from folder watches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WatchEvent {
    /// Monitoring of a folder began
    Started { path: PathBuf, recursive: bool },
    /// A raw change was observed
    Changed { path: PathBuf, kind: ChangeKind },
    /// A path stopped changing and was handed to the engine
    Settled { path: PathBuf, kind: ChangeKind },
    /// All watches were stopped
    Stopped { paths: Vec<PathBuf> },
    /// The underlying watcher reported an error
    Error { message: String },
}

/// Events from schedule triggers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScheduleEvent {
    /// A schedule was registered
    Registered { id: usize, description: String },
    /// A schedule fired and its passes were dispatched
    Fired { id: usize, trigger: PassTrigger },
    /// Shutdown passes did not finish before the deadline
    ShutdownTimedOut { deadline_ms: u64 },
    /// All schedules were unregistered
    Stopped,
    /// A schedule could not be evaluated
    Error { id: usize, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::organize::OperationOutcome;

    #[test]
    fn events_are_serializable() {
        let event = Event::Pass(PassEvent::FileProcessed {
            pass_id: "p1".into(),
            report: FileReport {
                source: PathBuf::from("/in/report.pdf"),
                rule_id: Some(3),
                outcome: OperationOutcome::Moved {
                    destination: PathBuf::from("/out/report.pdf"),
                },
            },
        });

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::Pass(PassEvent::FileProcessed { report, .. }) => {
                assert_eq!(report.rule_id, Some(3));
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn trigger_names_are_snake_case() {
        let json = serde_json::to_string(&PassTrigger::FileChange).unwrap();
        assert_eq!(json, "\"file_change\"");
    }
}
