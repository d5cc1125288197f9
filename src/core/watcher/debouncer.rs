//! Per-path debounce of raw change notifications.
//!
//! One actor thread owns the timer table. Each path is either absent
//! (idle) or pending with a deadline; every notification pushes the
//! deadline out again. When a deadline passes with no further
//! notification the path is emitted once as a [`SettledEvent`] and
//! dropped from the table.

use crossbeam_channel::{after, never, select, unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Kind of raw filesystem change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Modified,
    Renamed,
    Removed,
}

/// A path that has stopped changing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettledEvent {
    pub path: PathBuf,
    /// The last change seen before the path settled
    pub kind: ChangeKind,
}

enum Command {
    Notify(PathBuf, ChangeKind),
    Stop,
}

struct Pending {
    /// `None` when the delay is too large to fit the clock
    deadline: Option<Instant>,
    kind: ChangeKind,
}

/// Cloneable handle for feeding notifications into a debouncer
#[derive(Clone)]
pub struct DebounceHandle {
    commands: Sender<Command>,
}

impl DebounceHandle {
    /// Record a change; restarts the path's timer
    pub fn notify(&self, path: PathBuf, kind: ChangeKind) {
        let _ = self.commands.send(Command::Notify(path, kind));
    }
}

/// Coalesces bursts of notifications per path
pub struct ChangeDebouncer {
    handle: DebounceHandle,
    worker: Option<JoinHandle<()>>,
}

impl ChangeDebouncer {
    /// Start the timer thread. Settled paths are sent to `settled`.
    pub fn spawn(delay: Duration, settled: Sender<SettledEvent>) -> Self {
        let (commands, inbox) = unbounded();
        let worker = thread::Builder::new()
            .name("tidy-debounce".into())
            .spawn(move || run(delay, inbox, settled))
            .ok();

        Self {
            handle: DebounceHandle { commands },
            worker,
        }
    }

    pub fn handle(&self) -> DebounceHandle {
        self.handle.clone()
    }

    pub fn notify(&self, path: PathBuf, kind: ChangeKind) {
        self.handle.notify(path, kind);
    }

    /// Cancel every pending timer and wait for the thread to exit.
    ///
    /// Pending paths are discarded without a settled event.
    pub fn stop(&mut self) {
        let _ = self.handle.commands.send(Command::Stop);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for ChangeDebouncer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(delay: Duration, inbox: Receiver<Command>, settled: Sender<SettledEvent>) {
    let mut pending: HashMap<PathBuf, Pending> = HashMap::new();

    loop {
        let timer = match pending.values().filter_map(|p| p.deadline).min() {
            Some(deadline) => after(deadline.saturating_duration_since(Instant::now())),
            None => never(),
        };

        select! {
            recv(inbox) -> command => match command {
                Ok(Command::Notify(path, kind)) => {
                    trace!(path = %path.display(), ?kind, "Change recorded");
                    let deadline = Instant::now().checked_add(delay);
                    pending.insert(path, Pending { deadline, kind });
                }
                Ok(Command::Stop) | Err(_) => {
                    debug!(cancelled = pending.len(), "Debouncer stopped");
                    return;
                }
            },
            recv(timer) -> _ => {}
        }

        let now = Instant::now();
        let due: Vec<PathBuf> = pending
            .iter()
            .filter(|(_, p)| p.deadline.is_some_and(|d| d <= now))
            .map(|(path, _)| path.clone())
            .collect();

        for path in due {
            if let Some(entry) = pending.remove(&path) {
                debug!(path = %path.display(), "Path settled");
                if settled.send(SettledEvent { path, kind: entry.kind }).is_err() {
                    return;
                }
            }
        }
    }
}
