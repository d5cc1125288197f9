//! # CLI Module
//!
//! Command-line interface for the file organizer.
//!
//! ## Usage
//! ```bash
//! # One pass over every rule scope
//! tidy run
//!
//! # One pass over a single folder, JSON report
//! tidy run --scope ~/Downloads --output json
//!
//! # Watch folders and run schedules until Enter is pressed
//! tidy watch
//!
//! # Compile every rule and report problems
//! tidy check --config ./tidy.json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use file_tidy::config::OrganizerConfig;
use file_tidy::core::engine::OrganizeEngine;
use file_tidy::core::organize::{BatchResult, OperationOutcome};
use file_tidy::core::rules::RuleSnapshot;
use file_tidy::core::scanner::Scope;
use file_tidy::core::schedule::{ScheduleTiming, ScheduleTrigger};
use file_tidy::core::watcher::WatchRegistry;
use file_tidy::error::{ConfigError, Result};
use file_tidy::events::{
    Event, EventChannel, EventReceiver, PassEvent, PassTrigger, ScheduleEvent, WatchEvent,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// File Tidy - organize folders by rules
#[derive(Parser, Debug)]
#[command(name = "tidy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to <config dir>/file-tidy/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one organize pass
    Run {
        /// Only organize this folder instead of every rule scope
        #[arg(short, long)]
        scope: Option<PathBuf>,

        /// Include subfolders of --scope
        #[arg(short, long, requires = "scope")]
        recursive: bool,
    },
    /// Watch folders and run schedules until Enter is pressed
    Watch,
    /// Compile every rule and report configuration errors
    Check,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
    /// Minimal output (one line per changed file)
    Minimal,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { scope, recursive } => {
            let scope = scope.map(|path| Scope::new(path, recursive));
            run_once(config, scope, cli.output)
        }
        Commands::Watch => run_watch(config, cli.output),
        Commands::Check => run_check(config, cli.output),
    }
}

fn load_config(path: Option<&Path>) -> Result<OrganizerConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => OrganizerConfig::default_path().ok_or(ConfigError::NoConfigPath)?,
    };
    Ok(OrganizerConfig::load(path)?)
}

fn run_once(config: OrganizerConfig, scope: Option<Scope>, output: OutputFormat) -> Result<()> {
    let term = Term::stderr();
    if matches!(output, OutputFormat::Pretty) {
        print_header(&term);
    }

    let (sender, receiver) = EventChannel::new();
    let engine = OrganizeEngine::new(&config, sender)?;

    let progress = if matches!(output, OutputFormat::Pretty) {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {pos} files {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let progress_clone = progress.clone();
    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            let Some(pb) = progress_clone.as_ref() else {
                continue;
            };
            match event {
                Event::Pass(PassEvent::FileProcessed { report, .. }) => {
                    pb.inc(1);
                    pb.set_message(file_label(&report.source));
                }
                Event::Pass(PassEvent::ScanError { message, .. }) => {
                    pb.println(format!("  {} {}", style("!").yellow(), message));
                }
                _ => {}
            }
        }
    });

    let result = match scope {
        Some(scope) => engine.run_pass(&scope, PassTrigger::Manual),
        None => Ok(engine.run_all(PassTrigger::Manual)),
    };

    // Dropping the engine drops its sender and ends the event thread
    drop(engine);
    event_thread.join().ok();
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let batch = result?;
    match output {
        OutputFormat::Pretty => print_pretty_batch(&term, "Pass complete", &batch),
        OutputFormat::Json => print_json(&batch),
        OutputFormat::Minimal => print_minimal_batch(&batch),
    }

    Ok(())
}

fn run_watch(config: OrganizerConfig, output: OutputFormat) -> Result<()> {
    let term = Term::stderr();
    if matches!(output, OutputFormat::Pretty) {
        print_header(&term);
    }

    let (sender, receiver) = EventChannel::new();
    let engine = Arc::new(OrganizeEngine::new(&config, sender.clone())?);
    // Closed once shutdown returns; passes left running past the deadline
    // keep their senders, so the printer cannot wait for disconnection.
    let (stop_printer, printer_stop) = crossbeam_channel::bounded::<()>(0);
    let event_thread = spawn_watch_printer(receiver, printer_stop, output);

    let registry = WatchRegistry::new(Arc::clone(&engine), sender.clone());
    for spec in &config.watches {
        if let Err(e) = registry.register(spec.clone()) {
            term.write_line(&format!("  {} {}", style("✗").red(), e)).ok();
        }
    }

    // Cron expressions need an external evaluator; the CLI has none.
    let (cron, schedules): (Vec<_>, Vec<_>) = config
        .schedules
        .iter()
        .cloned()
        .partition(|spec| matches!(spec.timing, ScheduleTiming::Cron { .. }));
    for spec in &cron {
        term.write_line(&format!(
            "  {} skipped {}: no cron evaluator",
            style("!").yellow(),
            spec
        ))
        .ok();
    }

    let mut trigger = ScheduleTrigger::new(Arc::clone(&engine), sender);
    trigger.start(schedules)?;

    if matches!(output, OutputFormat::Pretty) {
        term.write_line(&format!(
            "{} Watching {} folder(s). Press Enter to stop.",
            style("●").green(),
            registry.watched_paths().len()
        ))
        .ok();
    }
    let _ = Term::stdout().read_line();

    registry.stop_all();
    let shutdown = trigger.shutdown(config.shutdown_deadline());

    drop(trigger);
    drop(registry);
    drop(engine);
    drop(stop_printer);
    event_thread.join().ok();

    if let Some(batch) = shutdown {
        match output {
            OutputFormat::Pretty => print_pretty_batch(&term, "Shutdown pass complete", &batch),
            OutputFormat::Json => print_json(&batch),
            OutputFormat::Minimal => print_minimal_batch(&batch),
        }
    }

    Ok(())
}

fn spawn_watch_printer(
    receiver: EventReceiver,
    stop: crossbeam_channel::Receiver<()>,
    output: OutputFormat,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let term = Term::stderr();
        for event in receiver.iter_until(&stop) {
            match output {
                OutputFormat::Json => {
                    if let Ok(line) = serde_json::to_string(&event) {
                        println!("{line}");
                    }
                }
                OutputFormat::Minimal => {
                    if let Event::Pass(PassEvent::FileProcessed { report, .. }) = &event {
                        if let Some(line) = minimal_line(&report.source, &report.outcome) {
                            println!("{line}");
                        }
                    }
                }
                OutputFormat::Pretty => match event {
                    Event::Watch(WatchEvent::Started { path, .. }) => {
                        term.write_line(&format!("  {} {}", style("watching").dim(), display_path(&path)))
                            .ok();
                    }
                    Event::Watch(WatchEvent::Error { message }) => {
                        term.write_line(&format!("  {} {}", style("✗").red(), message)).ok();
                    }
                    Event::Pass(PassEvent::FileProcessed { report, .. }) => {
                        if !matches!(report.outcome, OperationOutcome::Unmatched) {
                            term.write_line(&format!(
                                "  {} {}",
                                outcome_marker(&report.outcome),
                                describe(&report.source, &report.outcome)
                            ))
                            .ok();
                        }
                    }
                    Event::Schedule(ScheduleEvent::Registered { description, .. }) => {
                        term.write_line(&format!("  {} {}", style("scheduled").dim(), description))
                            .ok();
                    }
                    Event::Schedule(ScheduleEvent::ShutdownTimedOut { deadline_ms }) => {
                        term.write_line(&format!(
                            "  {} shutdown passes still running after {}ms",
                            style("!").yellow(),
                            deadline_ms
                        ))
                        .ok();
                    }
                    _ => {}
                },
            }
        }
    })
}

fn run_check(config: OrganizerConfig, output: OutputFormat) -> Result<()> {
    let snapshot =
        RuleSnapshot::compile(&config.groups, &config.snapshot_settings());

    let mut schedule_errors = Vec::new();
    for (id, spec) in config.schedules.iter().enumerate() {
        if let Err(e) = spec.interval().and_then(|_| spec.cron_expression()) {
            schedule_errors.push(format!("schedule {id}: {e}"));
        }
    }
    let missing_watches: Vec<&Path> = config
        .watches
        .iter()
        .map(|w| w.path.as_path())
        .filter(|p| !p.is_dir())
        .collect();

    match output {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "rules": snapshot.rules().len(),
                "active_rules": snapshot.active_count(),
                "rule_errors": snapshot.errors(),
                "schedule_errors": schedule_errors,
                "missing_watch_folders": missing_watches,
            });
            if let Ok(text) = serde_json::to_string_pretty(&report) {
                println!("{text}");
            }
        }
        OutputFormat::Minimal => {
            for error in snapshot.errors() {
                println!("rule {}: {}", error.rule_id, error.error);
            }
            for error in &schedule_errors {
                println!("{error}");
            }
        }
        OutputFormat::Pretty => {
            let term = Term::stderr();
            print_header(&term);
            term.write_line(&format!(
                "  {} rules compiled, {} active",
                style(snapshot.rules().len()).cyan(),
                style(snapshot.active_count()).cyan()
            ))
            .ok();
            for error in snapshot.errors() {
                term.write_line(&format!(
                    "  {} {} / {}: {}",
                    style("✗").red(),
                    error.group,
                    style(&error.rule_name).bold(),
                    error.error
                ))
                .ok();
            }
            for error in &schedule_errors {
                term.write_line(&format!("  {} {}", style("✗").red(), error)).ok();
            }
            for path in &missing_watches {
                term.write_line(&format!(
                    "  {} watch folder missing: {}",
                    style("!").yellow(),
                    display_path(path)
                ))
                .ok();
            }
            if snapshot.errors().is_empty() && schedule_errors.is_empty() {
                term.write_line(&format!("{} Configuration OK", style("✓").green().bold()))
                    .ok();
            }
        }
    }

    let failures = snapshot.errors().len() + schedule_errors.len();
    if failures > 0 {
        return Err(ConfigError::InvalidRules { count: failures }.into());
    }
    Ok(())
}

fn print_header(term: &Term) {
    term.write_line(&format!(
        "{} {}",
        style("File Tidy").bold().cyan(),
        style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
    ))
    .ok();
    term.write_line("").ok();
}

fn print_pretty_batch(term: &Term, title: &str, batch: &BatchResult) {
    let summary = batch.summary();

    term.write_line(&format!("{} {}", style("✓").green().bold(), title)).ok();
    term.write_line("").ok();
    term.write_line(&format!(
        "  {} files in {:.1}s",
        style(summary.total()).cyan(),
        batch.duration_ms as f64 / 1000.0
    ))
    .ok();

    for (label, count) in [
        ("moved", summary.moved),
        ("copied", summary.copied),
        ("renamed", summary.renamed),
        ("deleted", summary.deleted),
        ("skipped", summary.skipped),
        ("unmatched", summary.unmatched),
    ] {
        if count > 0 {
            term.write_line(&format!("  {} {}", style(count).cyan(), label)).ok();
        }
    }
    if summary.failed > 0 {
        term.write_line(&format!("  {} failed", style(summary.failed).red())).ok();
    }
    term.write_line("").ok();

    let failures: Vec<_> = batch.failures().collect();
    if !failures.is_empty() {
        term.write_line(&format!("{}", style("Failures:").bold().underlined())).ok();
        for report in failures {
            term.write_line(&format!(
                "  {} {}",
                style("✗").red(),
                describe(&report.source, &report.outcome)
            ))
            .ok();
        }
        term.write_line("").ok();
    }

    for error in &batch.scan_errors {
        term.write_line(&format!("  {} {}", style("!").yellow(), error)).ok();
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    if let Ok(text) = serde_json::to_string_pretty(value) {
        println!("{text}");
    }
}

fn print_minimal_batch(batch: &BatchResult) {
    for report in &batch.reports {
        if let Some(line) = minimal_line(&report.source, &report.outcome) {
            println!("{line}");
        }
    }
}

fn minimal_line(source: &Path, outcome: &OperationOutcome) -> Option<String> {
    match outcome {
        OperationOutcome::Moved { destination }
        | OperationOutcome::Copied { destination }
        | OperationOutcome::Renamed { destination } => {
            Some(format!("{}\t{}", source.display(), destination.display()))
        }
        OperationOutcome::Deleted => Some(format!("{}\t-", source.display())),
        _ => None,
    }
}

fn outcome_marker(outcome: &OperationOutcome) -> String {
    match outcome {
        OperationOutcome::Failed { .. } => style("✗").red().to_string(),
        OperationOutcome::Skipped { .. } => style("○").dim().to_string(),
        _ => style("✓").green().to_string(),
    }
}

fn describe(source: &Path, outcome: &OperationOutcome) -> String {
    let source = display_path(source);
    match outcome {
        OperationOutcome::Moved { destination } => {
            format!("{source} → {}", display_path(destination))
        }
        OperationOutcome::Copied { destination } => {
            format!("{source} ⇉ {}", display_path(destination))
        }
        OperationOutcome::Renamed { destination } => {
            format!("{source} → {}", file_label(destination))
        }
        OperationOutcome::Deleted => format!("{source} deleted"),
        OperationOutcome::Skipped { reason } => format!("{source} skipped ({reason})"),
        OperationOutcome::Failed { reason } => format!("{source}: {reason}"),
        OperationOutcome::Unmatched => format!("{source} unmatched"),
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Shorten paths under the home folder to `~/...`
fn display_path(path: &Path) -> String {
    match dirs::home_dir().and_then(|home| path.strip_prefix(&home).ok().map(Path::to_path_buf)) {
        Some(relative) => format!("~/{}", relative.display()),
        None => path.display().to_string(),
    }
}
