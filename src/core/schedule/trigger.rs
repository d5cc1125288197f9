//! Timer threads that dispatch scheduled passes.

use super::{CronEvaluator, ScheduleSpec, ScheduleTiming};
use crate::core::engine::OrganizeEngine;
use crate::core::organize::BatchResult;
use crate::error::ScheduleError;
use crate::events::{Event, EventSender, PassTrigger, ScheduleEvent};
use chrono::Local;
use crossbeam_channel::{after, bounded, select, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fires organize passes from schedules
pub struct ScheduleTrigger {
    engine: Arc<OrganizeEngine>,
    evaluator: Option<Arc<dyn CronEvaluator>>,
    events: EventSender,
    specs: Vec<ScheduleSpec>,
    timers: Vec<JoinHandle<()>>,
    /// Dropped to wake and end every timer thread
    stop_tx: Option<Sender<()>>,
    stop_rx: Receiver<()>,
    stopped: Arc<AtomicBool>,
}

impl ScheduleTrigger {
    pub fn new(engine: Arc<OrganizeEngine>, events: EventSender) -> Self {
        let (stop_tx, stop_rx) = bounded(0);
        Self {
            engine,
            evaluator: None,
            events,
            specs: Vec::new(),
            timers: Vec::new(),
            stop_tx: Some(stop_tx),
            stop_rx,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Supply the collaborator that evaluates cron expressions
    pub fn with_cron_evaluator(mut self, evaluator: Arc<dyn CronEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Register `specs` and start their timers.
    ///
    /// Every spec is validated before any timer starts, so an invalid spec
    /// leaves nothing running. Startup schedules are dispatched right away.
    pub fn start(&mut self, specs: Vec<ScheduleSpec>) -> Result<(), ScheduleError> {
        for spec in &specs {
            spec.interval()?;
            if let Some(expression) = spec.cron_expression()? {
                let evaluator = self
                    .evaluator
                    .as_ref()
                    .ok_or_else(|| ScheduleError::NoCronEvaluator {
                        expression: expression.clone(),
                    })?;
                evaluator
                    .next_fire(&expression, Local::now())
                    .map_err(|reason| ScheduleError::EvaluationFailed { expression, reason })?;
            }
        }

        let offset = self.specs.len();
        self.specs.extend(specs);

        for id in offset..self.specs.len() {
            let spec = self.specs[id].clone();
            info!(id, schedule = %spec, "Schedule registered");
            self.events.send(Event::Schedule(ScheduleEvent::Registered {
                id,
                description: spec.to_string(),
            }));

            let timing = spec.timing.clone();
            match timing {
                ScheduleTiming::OnStartup => self.dispatch(id, &spec, PassTrigger::Startup),
                ScheduleTiming::OnShutdown => {}
                ScheduleTiming::Interval { .. } => {
                    if let Some(interval) = spec.interval()? {
                        self.spawn_interval(id, spec, interval);
                    }
                }
                ScheduleTiming::Cron { .. } => {
                    if let Some(expression) = spec.cron_expression()? {
                        self.spawn_cron(id, spec, expression);
                    }
                }
            }
        }

        Ok(())
    }

    /// Run a schedule's passes now, on the calling thread
    pub fn trigger_now(&self, id: usize) -> Result<BatchResult, ScheduleError> {
        let spec = self.specs.get(id).ok_or(ScheduleError::UnknownSchedule(id))?;
        Ok(run_spec(&self.engine, spec, PassTrigger::Manual))
    }

    pub fn schedules(&self) -> &[ScheduleSpec] {
        &self.specs
    }

    /// Unregister every timer; queued passes that have not started are dropped.
    pub fn stop_all(&mut self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        self.stop_tx.take();
        for timer in self.timers.drain(..) {
            let _ = timer.join();
        }

        debug!("Schedules stopped");
        self.events.send(Event::Schedule(ScheduleEvent::Stopped));
    }

    /// Stop all timers, then run the shutdown schedules.
    ///
    /// Waits at most `deadline`. On timeout the passes keep running in the
    /// background and `None` is returned.
    pub fn shutdown(&mut self, deadline: Duration) -> Option<BatchResult> {
        self.stop_all();

        let shutdown_specs: Vec<ScheduleSpec> = self
            .specs
            .iter()
            .filter(|spec| spec.timing == ScheduleTiming::OnShutdown)
            .cloned()
            .collect();
        if shutdown_specs.is_empty() {
            return None;
        }

        let (done_tx, done_rx) = bounded(1);
        let engine = Arc::clone(&self.engine);
        let spawned = thread::Builder::new()
            .name("tidy-shutdown".into())
            .spawn(move || {
                let mut batch = BatchResult::default();
                for spec in &shutdown_specs {
                    batch.absorb(run_spec(&engine, spec, PassTrigger::Shutdown));
                }
                let _ = done_tx.send(batch);
            });
        if let Err(e) = spawned {
            warn!(error = %e, "Failed to start shutdown passes");
            return None;
        }

        match done_rx.recv_timeout(deadline) {
            Ok(batch) => Some(batch),
            Err(_) => {
                warn!(deadline_ms = deadline.as_millis() as u64, "Shutdown passes timed out");
                self.events.send(Event::Schedule(ScheduleEvent::ShutdownTimedOut {
                    deadline_ms: deadline.as_millis() as u64,
                }));
                None
            }
        }
    }

    /// Queue the schedule's passes on the engine pool
    fn dispatch(&self, id: usize, spec: &ScheduleSpec, trigger: PassTrigger) {
        dispatch(&self.engine, &self.events, &self.stopped, id, spec, trigger);
    }

    fn spawn_interval(&mut self, id: usize, spec: ScheduleSpec, interval: Duration) {
        let engine = Arc::clone(&self.engine);
        let events = self.events.clone();
        let stopped = Arc::clone(&self.stopped);
        let stop_rx = self.stop_rx.clone();

        let timer = thread::Builder::new()
            .name(format!("tidy-interval-{id}"))
            .spawn(move || loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(after(interval)) -> _ => {
                        dispatch(&engine, &events, &stopped, id, &spec, PassTrigger::Interval);
                    }
                }
            });
        self.keep_timer(id, timer);
    }

    fn spawn_cron(&mut self, id: usize, spec: ScheduleSpec, expression: String) {
        let Some(evaluator) = self.evaluator.clone() else {
            return;
        };
        let engine = Arc::clone(&self.engine);
        let events = self.events.clone();
        let stopped = Arc::clone(&self.stopped);
        let stop_rx = self.stop_rx.clone();

        let timer = thread::Builder::new()
            .name(format!("tidy-cron-{id}"))
            .spawn(move || loop {
                let now = Local::now();
                let next = match evaluator.next_fire(&expression, now) {
                    Ok(Some(next)) => next,
                    Ok(None) => {
                        debug!(id, %expression, "Cron schedule has no further fire times");
                        break;
                    }
                    Err(message) => {
                        warn!(id, %expression, error = %message, "Cron evaluation failed");
                        events.try_send(Event::Schedule(ScheduleEvent::Error { id, message }));
                        break;
                    }
                };
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

                select! {
                    recv(stop_rx) -> _ => break,
                    recv(after(wait)) -> _ => {
                        dispatch(&engine, &events, &stopped, id, &spec, PassTrigger::Cron);
                    }
                }
            });
        self.keep_timer(id, timer);
    }

    fn keep_timer(&mut self, id: usize, timer: std::io::Result<JoinHandle<()>>) {
        match timer {
            Ok(handle) => self.timers.push(handle),
            Err(e) => {
                warn!(id, error = %e, "Failed to start schedule timer");
                self.events.send(Event::Schedule(ScheduleEvent::Error {
                    id,
                    message: e.to_string(),
                }));
            }
        }
    }
}

impl Drop for ScheduleTrigger {
    fn drop(&mut self) {
        self.stop_all();
    }
}

fn dispatch(
    engine: &Arc<OrganizeEngine>,
    events: &EventSender,
    stopped: &Arc<AtomicBool>,
    id: usize,
    spec: &ScheduleSpec,
    trigger: PassTrigger,
) {
    if stopped.load(Ordering::SeqCst) {
        return;
    }
    events.try_send(Event::Schedule(ScheduleEvent::Fired { id, trigger }));

    let job_engine = Arc::clone(engine);
    let stopped = Arc::clone(stopped);
    let spec = spec.clone();
    engine.spawn(move || {
        if stopped.load(Ordering::SeqCst) {
            debug!(id, "Scheduled pass dropped after stop");
            return;
        }
        run_spec(&job_engine, &spec, trigger);
    });
}

fn run_spec(engine: &OrganizeEngine, spec: &ScheduleSpec, trigger: PassTrigger) -> BatchResult {
    if spec.scopes.is_empty() {
        engine.run_all(trigger)
    } else {
        engine.run_scopes(&spec.scopes, trigger)
    }
}
