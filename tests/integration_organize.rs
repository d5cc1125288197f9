//! Integration tests for organize passes.
//!
//! These tests drive the engine against real folders:
//! - Rule selection by priority
//! - Conflict policies against existing destinations
//! - Per-file failures that leave the rest of the pass intact
//! - Rules loaded from a JSON config file
//! - Concurrent passes over nested folders

use assert_fs::prelude::*;
use assert_fs::TempDir;
use file_tidy::config::OrganizerConfig;
use file_tidy::core::engine::OrganizeEngine;
use file_tidy::core::organize::{ConflictPolicy, OperationMode, OperationOutcome};
use file_tidy::core::rules::{TaskGroup, TaskRule};
use file_tidy::core::scanner::Scope;
use file_tidy::events::{null_sender, Event, EventChannel, PassEvent, PassTrigger};
use predicates::prelude::*;
use std::sync::Arc;
use std::thread;

fn engine_for(rules: Vec<TaskRule>) -> OrganizeEngine {
    let config = OrganizerConfig {
        groups: vec![TaskGroup {
            name: "Test".into(),
            enabled: true,
            rules,
        }],
        ..Default::default()
    };
    OrganizeEngine::new(&config, null_sender()).unwrap()
}

#[test]
fn pdf_is_moved_and_overrides_existing_copy() {
    let temp = TempDir::new().unwrap();
    let inbox = temp.child("in");
    let out = temp.child("out");
    inbox.child("report.pdf").write_str("new report").unwrap();
    out.child("report.pdf").write_str("old").unwrap();

    let rule = TaskRule::new(1, "PDFs", "*.pdf", Scope::flat(inbox.path()), OperationMode::Move)
        .with_destination(out.path())
        .with_policy(ConflictPolicy::Override);
    let engine = engine_for(vec![rule]);

    let batch = engine
        .run_pass(&Scope::flat(inbox.path()), PassTrigger::Manual)
        .unwrap();

    assert_eq!(batch.summary().moved, 1);
    inbox.child("report.pdf").assert(predicate::path::missing());
    out.child("report.pdf").assert("new report");

    temp.close().unwrap();
}

#[test]
fn higher_priority_rule_wins() {
    let temp = TempDir::new().unwrap();
    let inbox = temp.child("in");
    inbox.child("photo.jpg").write_str("jpeg").unwrap();

    let scope = Scope::flat(inbox.path());
    let images = TaskRule::new(1, "Images", "*", scope.clone(), OperationMode::Move)
        .with_destination(temp.child("images").path())
        .with_priority(5);
    let photos = TaskRule::new(2, "Photos", "*.jpg", scope.clone(), OperationMode::Move)
        .with_destination(temp.child("photos").path())
        .with_priority(1);
    let engine = engine_for(vec![images, photos]);

    let batch = engine.run_pass(&scope, PassTrigger::Manual).unwrap();

    assert_eq!(batch.reports.len(), 1);
    assert_eq!(batch.reports[0].rule_id, Some(2));
    temp.child("photos/photo.jpg").assert(predicate::path::is_file());
    temp.child("images").assert(predicate::path::missing());
}

#[test]
fn failed_file_does_not_stop_the_pass() {
    let temp = TempDir::new().unwrap();
    let inbox = temp.child("in");
    inbox.child("notes.txt").write_str("notes").unwrap();
    inbox.child("paper.pdf").write_str("paper").unwrap();
    // A regular file where the text rule expects a folder
    temp.child("blocked").write_str("not a folder").unwrap();

    let scope = Scope::flat(inbox.path());
    let text = TaskRule::new(1, "Text", "*.txt", scope.clone(), OperationMode::Move)
        .with_destination(temp.child("blocked/inner").path());
    let pdfs = TaskRule::new(2, "PDFs", "*.pdf", scope.clone(), OperationMode::Move)
        .with_destination(temp.child("docs").path());
    let engine = engine_for(vec![text, pdfs]);

    let batch = engine.run_pass(&scope, PassTrigger::Manual).unwrap();
    let summary = batch.summary();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.moved, 1);
    assert_eq!(batch.failures().count(), 1);
    inbox.child("notes.txt").assert("notes");
    temp.child("docs/paper.pdf").assert("paper");
}

#[test]
fn counter_policy_picks_the_next_free_name() {
    let temp = TempDir::new().unwrap();
    let inbox = temp.child("in");
    let out = temp.child("out");
    inbox.child("a.txt").write_str("third").unwrap();
    out.child("a.txt").write_str("first").unwrap();
    out.child("a(1).txt").write_str("second").unwrap();

    let scope = Scope::flat(inbox.path());
    let rule = TaskRule::new(1, "Text", "*.txt", scope.clone(), OperationMode::Copy)
        .with_destination(out.path())
        .with_policy(ConflictPolicy::RenameAppendCounter);
    let engine = engine_for(vec![rule]);

    let batch = engine.run_pass(&scope, PassTrigger::Manual).unwrap();

    match &batch.reports[0].outcome {
        OperationOutcome::Copied { destination } => {
            assert_eq!(destination, &out.child("a(2).txt").to_path_buf());
        }
        other => panic!("expected copy, got {other:?}"),
    }
    out.child("a.txt").assert("first");
    out.child("a(1).txt").assert("second");
    out.child("a(2).txt").assert("third");
    inbox.child("a.txt").assert("third");
}

#[test]
fn rules_from_config_file_apply_size_filter() {
    let temp = TempDir::new().unwrap();
    let inbox = temp.child("in");
    inbox.child("big.log").write_binary(&[b'x'; 4096]).unwrap();
    inbox.child("small.log").write_str("tiny").unwrap();

    let config_json = serde_json::json!({
        "groups": [{
            "name": "Logs",
            "rules": [{
                "id": 7,
                "name": "Big logs",
                "pattern": "*.log",
                "source": { "path": inbox.path() },
                "operation": "delete",
                "filter": {
                    "size": { "selected": true, "operator": ">", "value": "2", "unit": "KB" }
                }
            }]
        }]
    });
    let config_file = temp.child("config.json");
    config_file.write_str(&config_json.to_string()).unwrap();

    let config = OrganizerConfig::load(config_file.path()).unwrap();
    let engine = OrganizeEngine::new(&config, null_sender()).unwrap();
    let batch = engine.run_all(PassTrigger::Manual);

    let summary = batch.summary();
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.unmatched, 1);
    inbox.child("big.log").assert(predicate::path::missing());
    inbox.child("small.log").assert(predicate::path::exists());
}

#[test]
fn pass_events_track_every_file() {
    let temp = TempDir::new().unwrap();
    let inbox = temp.child("in");
    inbox.child("one.txt").touch().unwrap();
    inbox.child("two.txt").touch().unwrap();

    let (sender, receiver) = EventChannel::new();
    let scope = Scope::flat(inbox.path());
    let config = OrganizerConfig {
        groups: vec![TaskGroup {
            name: "Cleanup".into(),
            enabled: true,
            rules: vec![TaskRule::new(
                1,
                "Drop text",
                "*.txt",
                scope.clone(),
                OperationMode::Delete,
            )],
        }],
        ..Default::default()
    };
    let engine = OrganizeEngine::new(&config, sender).unwrap();
    engine.run_pass(&scope, PassTrigger::Manual).unwrap();
    drop(engine);

    let events: Vec<Event> = receiver.iter().collect();
    let processed = events
        .iter()
        .filter(|e| matches!(e, Event::Pass(PassEvent::FileProcessed { .. })))
        .count();
    assert_eq!(processed, 2);
    assert!(matches!(
        events.last(),
        Some(Event::Pass(PassEvent::Completed { .. }))
    ));
}

#[test]
fn concurrent_nested_passes_handle_each_file_once() {
    let temp = TempDir::new().unwrap();
    let inbox = temp.child("in");
    let sub = inbox.child("sub");
    for i in 0..200 {
        sub.child(format!("f{i}.txt")).write_str("x").unwrap();
    }

    let outer = TaskRule::new(1, "Outer", "*", Scope::recursive(inbox.path()), OperationMode::Move)
        .with_destination(temp.child("out").path());
    let inner = TaskRule::new(2, "Inner", "*.txt", Scope::flat(sub.path()), OperationMode::Move)
        .with_destination(temp.child("out/sub").path());
    let engine = Arc::new(engine_for(vec![outer, inner]));

    let passes: Vec<_> = [Scope::recursive(inbox.path()), Scope::flat(sub.path())]
        .into_iter()
        .map(|scope| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.run_pass(&scope, PassTrigger::Manual).unwrap())
        })
        .collect();

    let (mut moved, mut failed) = (0, 0);
    for pass in passes {
        let summary = pass.join().unwrap().summary();
        moved += summary.moved;
        failed += summary.failed;
    }

    assert_eq!(moved, 200);
    assert_eq!(failed, 0);
    assert_eq!(std::fs::read_dir(sub.path()).unwrap().count(), 0);
}
