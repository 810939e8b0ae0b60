//! Integration tests for the session orchestrator.
//!
//! These drive full work/break cycles against a paused Tokio clock, so the
//! countdowns run in virtual time and the tests complete immediately.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use floato_core::events::Event;
use floato_core::session::{Notifier, Orchestrator, SessionState};
use floato_core::storage::Config;
use floato_core::task::TaskCategory;
use floato_core::timer::Phase;
use tokio::sync::broadcast;

struct RecordingNotifier {
    titles: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            titles: Mutex::new(Vec::new()),
        })
    }

    fn titles(&self) -> Vec<String> {
        self.titles.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_completion(&self, task_title: &str) {
        self.titles.lock().unwrap().push(task_title.to_string());
    }
}

fn orchestrator_with_minutes(minutes: u32) -> (Orchestrator, Arc<RecordingNotifier>) {
    let mut config = Config::default();
    config.set_work_minutes(minutes).unwrap();
    let notifier = RecordingNotifier::new();
    (Orchestrator::new(config, notifier.clone()), notifier)
}

async fn wait_for(
    rx: &mut broadcast::Receiver<Event>,
    pred: impl Fn(&Event) -> bool,
) -> Event {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(100_000), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed");
        if pred(&event) {
            return event;
        }
    }
}

fn is_session_started(event: &Event) -> bool {
    matches!(event, Event::SessionStarted { .. })
}

#[tokio::test(start_paused = true)]
async fn two_tasks_advance_only_at_break_end() {
    let (orch, notifier) = orchestrator_with_minutes(1);
    orch.add_task("alpha", 1, TaskCategory::Work).unwrap();
    orch.add_task("beta", 1, TaskCategory::Study).unwrap();
    let mut rx = orch.subscribe();

    assert!(orch.start());
    wait_for(&mut rx, is_session_started).await;

    // The terminal work tick is observable before completion side effects.
    wait_for(&mut rx, |e| matches!(e, Event::Tick { phase: Phase::Running(0), .. })).await;
    let completed = wait_for(&mut rx, |e| matches!(e, Event::IntervalCompleted { .. })).await;
    match completed {
        Event::IntervalCompleted {
            task_title,
            finished_intervals,
            target_intervals,
            ..
        } => {
            assert_eq!(task_title, "alpha");
            assert_eq!((finished_intervals, target_intervals), (1, 1));
        }
        _ => unreachable!(),
    }
    wait_for(&mut rx, |e| matches!(e, Event::TaskCompleted { .. })).await;

    // Beta is still unfinished, so a break runs, and the just-finished task
    // stays current for the whole of it.
    wait_for(&mut rx, |e| matches!(e, Event::Tick { phase: Phase::OnBreak(_), .. })).await;
    assert_eq!(orch.active_index(), Some(0));
    assert_eq!(orch.state(), SessionState::Break);
    assert!(orch.tasks()[0].is_done);

    // Only the break's terminal tick moves the cursor, straight into beta.
    let started = wait_for(&mut rx, is_session_started).await;
    match started {
        Event::SessionStarted { task_title, .. } => assert_eq!(task_title, "beta"),
        _ => unreachable!(),
    }
    assert_eq!(orch.active_index(), Some(1));
    assert_eq!(orch.state(), SessionState::Working);
    assert_eq!(notifier.titles(), vec!["alpha".to_string()]);

    orch.stop();
}

#[tokio::test(start_paused = true)]
async fn last_task_skips_break_and_goes_idle() {
    let (orch, notifier) = orchestrator_with_minutes(1);
    orch.add_task("only", 1, TaskCategory::Personal).unwrap();
    let mut rx = orch.subscribe();

    assert!(orch.start());
    wait_for(&mut rx, |e| matches!(e, Event::IntervalCompleted { .. })).await;

    // No break tick may appear between completion and idle.
    loop {
        let event = wait_for(&mut rx, |_| true).await;
        match event {
            Event::Tick { phase: Phase::OnBreak(_), .. } => panic!("break ran for the last task"),
            Event::SessionIdle { .. } => break,
            _ => {}
        }
    }

    assert_eq!(orch.state(), SessionState::Idle);
    assert_eq!(orch.phase(), Phase::Idle);
    assert_eq!(orch.active_index(), None);
    assert!(orch.tasks()[0].is_done);
    assert_eq!(notifier.titles(), vec!["only".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn unfinished_last_task_stays_current_after_idle() {
    let (orch, _notifier) = orchestrator_with_minutes(1);
    orch.add_task("long haul", 3, TaskCategory::Work).unwrap();
    let mut rx = orch.subscribe();

    assert!(orch.start());
    wait_for(&mut rx, |e| matches!(e, Event::IntervalCompleted { .. })).await;
    wait_for(&mut rx, |e| matches!(e, Event::SessionIdle { .. })).await;

    // One of three intervals done; the cursor stays put for the next start.
    let tasks = orch.tasks();
    assert_eq!(tasks[0].finished_intervals, 1);
    assert!(!tasks[0].is_done);
    assert_eq!(orch.active_index(), Some(0));

    // A second start picks the same task up again.
    assert!(orch.start());
    wait_for(&mut rx, is_session_started).await;
    orch.stop();
}

#[tokio::test(start_paused = true)]
async fn reset_mid_run_settles_idle_within_a_tick() {
    let (orch, _notifier) = orchestrator_with_minutes(1);
    orch.add_task("alpha", 3, TaskCategory::Work).unwrap();
    orch.add_task("beta", 1, TaskCategory::Hobby).unwrap();
    let mut rx = orch.subscribe();

    assert!(orch.start());
    wait_for(&mut rx, |e| matches!(e, Event::Tick { phase: Phase::Running(_), .. })).await;

    orch.reset_all();
    wait_for(&mut rx, |e| matches!(e, Event::SessionIdle { .. })).await;
    assert_eq!(orch.state(), SessionState::Idle);
    assert_eq!(orch.phase(), Phase::Idle);
    assert!(orch.tasks().is_empty());

    // The cancelled run must not tick again.
    let residual = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match rx.recv().await {
                Ok(Event::Tick { phase: Phase::Running(_), .. }) => break true,
                Ok(_) => {}
                Err(_) => break false,
            }
        }
    })
    .await;
    assert!(
        matches!(residual, Err(_) | Ok(false)),
        "stale run kept ticking"
    );
}

#[tokio::test(start_paused = true)]
async fn deleting_active_task_restarts_for_new_cursor() {
    let (orch, _notifier) = orchestrator_with_minutes(1);
    orch.add_task("alpha", 2, TaskCategory::Work).unwrap();
    orch.add_task("beta", 1, TaskCategory::Health).unwrap();
    let mut rx = orch.subscribe();

    assert!(orch.start());
    wait_for(&mut rx, is_session_started).await;
    wait_for(&mut rx, |e| matches!(e, Event::Tick { .. })).await;

    let removed = orch.delete_task_at(0).unwrap();
    assert_eq!(removed.title, "alpha");

    let started = wait_for(&mut rx, is_session_started).await;
    match started {
        Event::SessionStarted { task_title, .. } => assert_eq!(task_title, "beta"),
        _ => unreachable!(),
    }
    assert_eq!(orch.active_index(), Some(0));
    orch.stop();
}

#[tokio::test(start_paused = true)]
async fn start_without_tasks_is_a_noop() {
    let (orch, _notifier) = orchestrator_with_minutes(1);
    assert!(!orch.start());
    assert_eq!(orch.state(), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn work_duration_change_applies_to_next_run() {
    let (orch, _notifier) = orchestrator_with_minutes(1);
    orch.add_task("alpha", 2, TaskCategory::Work).unwrap();
    let mut rx = orch.subscribe();

    assert!(orch.start());
    let first = wait_for(&mut rx, |e| matches!(e, Event::Tick { .. })).await;
    match first {
        Event::Tick { phase, .. } => assert_eq!(phase, Phase::Running(59)),
        _ => unreachable!(),
    }

    orch.set_work_minutes(2).unwrap();
    orch.stop();
    wait_for(&mut rx, |e| matches!(e, Event::SessionIdle { .. })).await;

    assert!(orch.start());
    let started = wait_for(&mut rx, is_session_started).await;
    match started {
        Event::SessionStarted { work_seconds, .. } => assert_eq!(work_seconds, 120),
        _ => unreachable!(),
    }
    let first = wait_for(&mut rx, |e| matches!(e, Event::Tick { .. })).await;
    match first {
        Event::Tick { phase, .. } => assert_eq!(phase, Phase::Running(119)),
        _ => unreachable!(),
    }
    orch.stop();

    assert!(orch.set_work_minutes(0).is_err());
    assert!(orch.set_work_minutes(61).is_err());
}

#[tokio::test(start_paused = true)]
async fn completions_land_in_statistics() {
    let (orch, _notifier) = orchestrator_with_minutes(1);
    orch.add_task("alpha", 1, TaskCategory::Work).unwrap();
    orch.add_task("beta", 1, TaskCategory::Work).unwrap();
    let mut rx = orch.subscribe();

    assert!(orch.start());
    // Both intervals complete; the second one ends the session.
    wait_for(&mut rx, |e| matches!(e, Event::IntervalCompleted { .. })).await;
    wait_for(&mut rx, |e| matches!(e, Event::IntervalCompleted { .. })).await;
    wait_for(&mut rx, |e| matches!(e, Event::SessionIdle { .. })).await;

    let summary = orch.statistics_summary();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.today, 2);
    let stats = orch.statistics();
    assert_eq!(
        stats.category_breakdown_today().get(&TaskCategory::Work),
        Some(&2)
    );
}
