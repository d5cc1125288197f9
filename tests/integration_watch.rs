//! Integration tests for folder watching and schedules.

use assert_fs::prelude::*;
use assert_fs::TempDir;
use crossbeam_channel::unbounded;
use file_tidy::config::OrganizerConfig;
use file_tidy::core::engine::OrganizeEngine;
use file_tidy::core::organize::{ConflictPolicy, OperationMode};
use file_tidy::core::rules::{TaskGroup, TaskRule};
use file_tidy::core::scanner::Scope;
use file_tidy::core::schedule::{ScheduleSpec, ScheduleTiming, ScheduleTrigger};
use file_tidy::core::watcher::{ChangeDebouncer, ChangeKind, WatchRegistry, WatchSpec};
use file_tidy::events::null_sender;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn engine_moving_text(inbox: &Path, out: &Path) -> Arc<OrganizeEngine> {
    let rule = TaskRule::new(1, "Text", "*.txt", Scope::flat(inbox), OperationMode::Move)
        .with_destination(out)
        .with_policy(ConflictPolicy::Override);
    let config = OrganizerConfig {
        groups: vec![TaskGroup {
            name: "Watch".into(),
            enabled: true,
            rules: vec![rule],
        }],
        max_concurrency: 2,
        ..Default::default()
    };
    Arc::new(OrganizeEngine::new(&config, null_sender()).unwrap())
}

fn wait_for(path: &Path, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if path.exists() {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    path.exists()
}

#[test]
fn watched_folder_is_organized_after_settling() {
    let temp = TempDir::new().unwrap();
    let inbox = temp.child("in");
    let out = temp.child("out");
    inbox.create_dir_all().unwrap();

    let engine = engine_moving_text(inbox.path(), out.path());
    let registry = WatchRegistry::new(Arc::clone(&engine), null_sender());
    registry
        .register(WatchSpec::new(inbox.path()).debounce(0.2))
        .unwrap();

    inbox.child("note.txt").write_str("hello").unwrap();

    assert!(wait_for(&out.child("note.txt"), Duration::from_secs(10)));
    out.child("note.txt").assert("hello");

    registry.stop_all();
    assert!(registry.is_stopped());
}

#[test]
fn nothing_runs_after_stop() {
    let temp = TempDir::new().unwrap();
    let inbox = temp.child("in");
    let out = temp.child("out");
    inbox.create_dir_all().unwrap();

    let engine = engine_moving_text(inbox.path(), out.path());
    let registry = WatchRegistry::new(Arc::clone(&engine), null_sender());
    registry
        .register(WatchSpec::new(inbox.path()).debounce(0.5))
        .unwrap();
    registry.stop_all();

    inbox.child("late.txt").write_str("late").unwrap();
    thread::sleep(Duration::from_millis(1000));

    inbox.child("late.txt").assert(predicate::path::exists());
    out.child("late.txt").assert(predicate::path::missing());
}

#[test]
fn debouncer_coalesces_bursts_per_path() {
    let (tx, rx) = unbounded();
    let mut debouncer = ChangeDebouncer::spawn(Duration::from_millis(150), tx);
    let path = PathBuf::from("/watched/burst.txt");

    for _ in 0..5 {
        debouncer.notify(path.clone(), ChangeKind::Modified);
        thread::sleep(Duration::from_millis(20));
    }

    let settled = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(settled.path, path);
    assert_eq!(settled.kind, ChangeKind::Modified);
    assert!(rx.recv_timeout(Duration::from_millis(400)).is_err());

    debouncer.stop();
}

#[test]
fn startup_schedule_organizes_its_scope() {
    let temp = TempDir::new().unwrap();
    let inbox = temp.child("in");
    let out = temp.child("out");
    inbox.child("boot.txt").write_str("boot").unwrap();

    let engine = engine_moving_text(inbox.path(), out.path());
    let mut trigger = ScheduleTrigger::new(Arc::clone(&engine), null_sender());
    trigger
        .start(vec![
            ScheduleSpec::new(ScheduleTiming::OnStartup).with_scope(Scope::flat(inbox.path()))
        ])
        .unwrap();

    assert!(wait_for(&out.child("boot.txt"), Duration::from_secs(10)));
    trigger.stop_all();
}

#[test]
fn shutdown_schedule_runs_within_deadline() {
    let temp = TempDir::new().unwrap();
    let inbox = temp.child("in");
    let out = temp.child("out");
    inbox.child("last.txt").write_str("bye").unwrap();

    let engine = engine_moving_text(inbox.path(), out.path());
    let mut trigger = ScheduleTrigger::new(engine, null_sender());
    trigger
        .start(vec![ScheduleSpec::new(ScheduleTiming::OnShutdown)])
        .unwrap();

    let batch = trigger.shutdown(Duration::from_secs(10)).unwrap();

    assert_eq!(batch.summary().moved, 1);
    out.child("last.txt").assert("bye");
}
