//! Session orchestration: binds [`Clock`] ticks to task-list mutation and
//! statistics recording.
//!
//! The session state machine is `Idle -> Working -> (Break | Idle)`. All
//! mutation -- tick handling and user-initiated task edits alike -- funnels
//! through one mutex, so no two completion passes can interleave and a delete
//! can never race an in-flight interval completion. Each countdown run also
//! carries a sequence number; ticks that arrive after their run has been
//! superseded or stopped are discarded before they can touch state.
//!
//! Side effects at the end of a work interval are strictly ordered: the
//! finished-count increment and statistics recording happen first, then the
//! completion notification, and only then the last-task decision, which must
//! see the post-increment done flag.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::error::CoreError;
use crate::events::Event;
use crate::stats::{slot_of, StatisticsStore, Summary};
use crate::storage::{Config, Database};
use crate::task::{Task, TaskCategory, TaskList};
use crate::timer::{Clock, Phase};

/// Completion notification sink.
///
/// Implementations deliver "interval complete" to the user (system
/// notification, sound, haptics) and must be fire-and-forget: the call runs
/// on the timer's execution context and must never block it.
pub trait Notifier: Send + Sync {
    fn notify_completion(&self, task_title: &str);
}

/// Notifier that does nothing. Useful for tests and headless use.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify_completion(&self, _task_title: &str) {}
}

/// Coarse session state, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Working,
    Break,
}

/// Point-in-time snapshot of everything a frontend renders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub phase: Phase,
    pub active_index: Option<usize>,
    pub work_minutes: u32,
    pub tasks: Vec<Task>,
}

struct Inner {
    todos: TaskList,
    stats: StatisticsStore,
    clock: Clock,
    config: Config,
    db: Option<Database>,
    notifier: Arc<dyn Notifier>,
    state: SessionState,
    last_phase: Phase,
    /// Bumped whenever a run is started, stopped, or superseded. Tick
    /// handlers compare against the run they were spawned for.
    run_seq: u64,
    /// Guards the per-run completion side effects against a repeated
    /// terminal tick.
    recorded_this_run: bool,
}

impl Inner {
    fn persist_tasks(&mut self) {
        if let Some(db) = self.db.as_mut() {
            if let Err(e) = db.save_tasks(self.todos.tasks()) {
                log::warn!("failed to persist tasks, in-memory state stays authoritative: {e}");
            }
        }
    }

    fn persist_interval(&mut self, category: TaskCategory, at: chrono::DateTime<Local>) {
        if let Some(db) = self.db.as_mut() {
            if let Err(e) = db.record_interval(at.date_naive(), slot_of(at.time()), category) {
                log::warn!("failed to persist statistics, will catch up on next save: {e}");
            }
        }
    }

    fn persist_config(&self) {
        if self.db.is_none() {
            // Fully in-memory session; nothing is written anywhere.
            return;
        }
        if let Err(e) = self.config.save() {
            log::warn!("failed to persist config: {e}");
        }
    }
}

/// The glue a frontend runs: starts and stops countdowns, applies completion
/// side effects, and advances through the task list.
///
/// Methods that can start a countdown (`start`, and the task edits that
/// restart one for a moved cursor) must be called from within a Tokio
/// runtime.
pub struct Orchestrator {
    inner: Arc<Mutex<Inner>>,
    events: broadcast::Sender<Event>,
}

impl Orchestrator {
    /// Build a fully in-memory session (no persistence). Used by tests and
    /// embedders that manage their own storage.
    pub fn new(config: Config, notifier: Arc<dyn Notifier>) -> Self {
        Self::build(TaskList::new(), StatisticsStore::new(), None, config, notifier)
    }

    /// Build a session over the given database, loading persisted tasks and
    /// statistics.
    ///
    /// # Errors
    /// Returns an error if the initial load fails.
    pub fn with_database(
        db: Database,
        config: Config,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, CoreError> {
        let tasks = db.load_tasks()?;
        let stats = db.load_statistics()?;
        Ok(Self::build(
            TaskList::from_tasks(tasks),
            stats,
            Some(db),
            config,
            notifier,
        ))
    }

    fn build(
        todos: TaskList,
        stats: StatisticsStore,
        db: Option<Database>,
        config: Config,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                todos,
                stats,
                clock: Clock::new(),
                config,
                db,
                notifier,
                state: SessionState::Idle,
                last_phase: Phase::Idle,
                run_seq: 0,
                recorded_this_run: false,
            })),
            events,
        }
    }

    /// Subscribe to session events. Slow subscribers may lag and miss old
    /// events; the timer loop never waits for them.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    // ── Session control ──────────────────────────────────────────────

    /// Start (or restart) the countdown for the active task.
    ///
    /// Returns false, without starting anything, when no active task exists;
    /// that is a caller error, not a fault. Must be called from within a
    /// Tokio runtime.
    pub fn start(&self) -> bool {
        let mut inner = self.lock();
        if inner.todos.active_index().is_none() {
            log::warn!("session start requested with no active task");
            return false;
        }
        start_run(&self.inner, &self.events, &mut inner);
        true
    }

    /// Cancel any in-flight countdown and settle to idle. Idempotent.
    pub fn stop(&self) {
        let mut inner = self.lock();
        stop_run(&self.events, &mut inner);
    }

    /// Change the work-interval length (1..=60 minutes). Takes effect on the
    /// next countdown; an in-progress run keeps its duration.
    ///
    /// # Errors
    /// Returns an error when the value is out of range.
    pub fn set_work_minutes(&self, minutes: u32) -> Result<(), CoreError> {
        let mut inner = self.lock();
        inner.config.set_work_minutes(minutes)?;
        inner.persist_config();
        Ok(())
    }

    // ── Task list ────────────────────────────────────────────────────

    /// Append a new task.
    ///
    /// # Errors
    /// Returns a validation error for an empty title or zero target.
    pub fn add_task(
        &self,
        title: &str,
        target_intervals: u32,
        category: TaskCategory,
    ) -> Result<Task, CoreError> {
        let mut inner = self.lock();
        let task = inner.todos.add(title, target_intervals, category)?.clone();
        inner.persist_tasks();
        let _ = self.events.send(Event::TaskListChanged { at: Utc::now() });
        Ok(task)
    }

    /// Delete a task by id. Returns the removed task, or `None` for an
    /// unknown id.
    pub fn delete_task(&self, id: &Uuid) -> Option<Task> {
        let mut inner = self.lock();
        let before = inner.todos.active_task().map(|t| t.id);
        let removed = inner.todos.delete(id)?;
        inner.persist_tasks();
        let _ = self.events.send(Event::TaskListChanged { at: Utc::now() });
        reconcile_cursor(&self.inner, &self.events, &mut inner, before);
        Some(removed)
    }

    /// Delete a task by list position.
    pub fn delete_task_at(&self, index: usize) -> Option<Task> {
        let mut inner = self.lock();
        let before = inner.todos.active_task().map(|t| t.id);
        let removed = inner.todos.delete_at(index)?;
        inner.persist_tasks();
        let _ = self.events.send(Event::TaskListChanged { at: Utc::now() });
        reconcile_cursor(&self.inner, &self.events, &mut inner, before);
        Some(removed)
    }

    /// Clear the whole task list and stop the session.
    pub fn reset_all(&self) {
        let mut inner = self.lock();
        inner.todos.reset_all();
        inner.persist_tasks();
        let _ = self.events.send(Event::TaskListChanged { at: Utc::now() });
        stop_run(&self.events, &mut inner);
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn tasks(&self) -> Vec<Task> {
        self.lock().todos.tasks().to_vec()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.lock().todos.active_index()
    }

    pub fn phase(&self) -> Phase {
        self.lock().last_phase
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn status(&self) -> SessionStatus {
        let inner = self.lock();
        SessionStatus {
            state: inner.state,
            phase: inner.last_phase,
            active_index: inner.todos.active_index(),
            work_minutes: inner.config.timer.work_minutes,
            tasks: inner.todos.tasks().to_vec(),
        }
    }

    pub fn statistics_summary(&self) -> Summary {
        self.lock().stats.summary()
    }

    pub fn statistics(&self) -> StatisticsStore {
        self.lock().stats.clone()
    }

    /// Drop all statistics counters, in memory and on disk.
    pub fn reset_statistics(&self) {
        let mut inner = self.lock();
        inner.stats.reset();
        if let Some(db) = inner.db.as_mut() {
            if let Err(e) = db.clear_statistics() {
                log::warn!("failed to clear persisted statistics: {e}");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Run lifecycle ────────────────────────────────────────────────────
//
// These are free functions over the shared state so the tick-consumer task
// can drive the same transitions as the public API.

fn start_run(
    inner_arc: &Arc<Mutex<Inner>>,
    events: &broadcast::Sender<Event>,
    inner: &mut Inner,
) {
    let Some(task) = inner.todos.active_task() else {
        return;
    };
    let (task_id, task_title) = (task.id, task.title.clone());
    let work_seconds = inner.config.work_seconds();

    inner.run_seq = inner.run_seq.wrapping_add(1);
    inner.recorded_this_run = false;
    inner.state = SessionState::Working;
    inner.last_phase = Phase::Running(work_seconds);
    let rx = inner.clock.start(work_seconds, false);

    log::debug!("work run started for '{task_title}' ({work_seconds}s)");
    let _ = events.send(Event::SessionStarted {
        task_id,
        task_title,
        work_seconds,
        at: Utc::now(),
    });
    tokio::spawn(consume_ticks(
        inner_arc.clone(),
        events.clone(),
        rx,
        inner.run_seq,
    ));
}

fn stop_run(events: &broadcast::Sender<Event>, inner: &mut Inner) {
    inner.clock.stop();
    inner.run_seq = inner.run_seq.wrapping_add(1);
    if inner.state != SessionState::Idle {
        go_idle(events, inner);
    }
}

fn go_idle(events: &broadcast::Sender<Event>, inner: &mut Inner) {
    inner.state = SessionState::Idle;
    inner.last_phase = Phase::Idle;
    let _ = events.send(Event::Tick {
        phase: Phase::Idle,
        at: Utc::now(),
    });
    let _ = events.send(Event::SessionIdle { at: Utc::now() });
}

/// Re-check the cursor after a structural task-list change. A countdown is
/// keyed to the task it was started for: if the cursor moved while a run was
/// in flight, the run restarts for the new active task, and if the cursor is
/// gone the session stops within the tick.
fn reconcile_cursor(
    inner_arc: &Arc<Mutex<Inner>>,
    events: &broadcast::Sender<Event>,
    inner: &mut Inner,
    active_before: Option<Uuid>,
) {
    let active_after = inner.todos.active_task().map(|t| t.id);
    if active_before == active_after {
        return;
    }
    match active_after {
        None => stop_run(events, inner),
        Some(_) => {
            if inner.state != SessionState::Idle {
                start_run(inner_arc, events, inner);
            }
        }
    }
}

async fn consume_ticks(
    inner_arc: Arc<Mutex<Inner>>,
    events: broadcast::Sender<Event>,
    mut rx: mpsc::Receiver<Phase>,
    run_id: u64,
) {
    while let Some(phase) = rx.recv().await {
        if !on_tick(&inner_arc, &events, run_id, phase) {
            return;
        }
    }
}

/// Handle one clock tick under the session lock. Returns false once the run
/// this consumer was spawned for has been superseded.
fn on_tick(
    inner_arc: &Arc<Mutex<Inner>>,
    events: &broadcast::Sender<Event>,
    run_id: u64,
    phase: Phase,
) -> bool {
    let mut inner = inner_arc.lock().unwrap_or_else(PoisonError::into_inner);
    if inner.run_seq != run_id {
        return false;
    }
    inner.last_phase = phase;
    let _ = events.send(Event::Tick {
        phase,
        at: Utc::now(),
    });
    match phase {
        Phase::Running(0) => work_finished(events, &mut inner),
        Phase::OnBreak(0) => break_finished(inner_arc, events, &mut inner),
        _ => {}
    }
    true
}

/// The terminal work tick: record, notify, then decide what the break does.
fn work_finished(events: &broadcast::Sender<Event>, inner: &mut Inner) {
    if inner.recorded_this_run {
        return;
    }
    inner.recorded_this_run = true;

    let Some(task) = inner.todos.record_interval_completed() else {
        log::warn!("work interval finished with no active task");
        stop_run(events, inner);
        return;
    };

    let now = Local::now();
    inner.stats.record(task.category, now);
    inner.persist_tasks();
    inner.persist_interval(task.category, now);

    inner.notifier.notify_completion(&task.title);
    let _ = events.send(Event::IntervalCompleted {
        task_id: task.id,
        task_title: task.title.clone(),
        finished_intervals: task.finished_intervals,
        target_intervals: task.target_intervals,
        at: Utc::now(),
    });
    if task.is_done {
        let _ = events.send(Event::TaskCompleted {
            task_id: task.id,
            task_title: task.title.clone(),
            at: Utc::now(),
        });
    }

    // Last-task decision on post-increment state: when no other unfinished
    // task remains there is nothing to rest for, so the break is skipped and
    // the session settles immediately.
    if inner.todos.is_last_task() {
        inner.clock.stop();
        inner.run_seq = inner.run_seq.wrapping_add(1);
        if task.is_done {
            inner.todos.advance();
        }
        go_idle(events, inner);
    } else {
        inner.state = SessionState::Break;
        log::debug!("break started after '{}'", task.title);
    }
}

/// The terminal break tick: move the cursor past a finished task, then roll
/// straight into the next work run.
fn break_finished(
    inner_arc: &Arc<Mutex<Inner>>,
    events: &broadcast::Sender<Event>,
    inner: &mut Inner,
) {
    if inner.todos.active_task().is_some_and(|t| t.is_done) {
        inner.todos.advance();
    }
    if inner.todos.active_index().is_some() {
        start_run(inner_arc, events, inner);
    } else {
        inner.run_seq = inner.run_seq.wrapping_add(1);
        go_idle(events, inner);
    }
}
