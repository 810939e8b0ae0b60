//! Session events.
//!
//! Every observable state change produces an [`Event`] on the orchestrator's
//! broadcast channel. UI layers subscribe and render from the stream instead
//! of binding to shared mutable state; slow subscribers may lag and drop old
//! events without affecting the timer loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timer::Phase;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A work countdown began for the active task.
    SessionStarted {
        task_id: Uuid,
        task_title: String,
        work_seconds: u32,
        at: DateTime<Utc>,
    },
    /// One clock tick; emitted once per second while a run is in flight.
    Tick { phase: Phase, at: DateTime<Utc> },
    /// A work interval finished and was recorded against the active task.
    IntervalCompleted {
        task_id: Uuid,
        task_title: String,
        finished_intervals: u32,
        target_intervals: u32,
        at: DateTime<Utc>,
    },
    /// The active task reached its interval target.
    TaskCompleted {
        task_id: Uuid,
        task_title: String,
        at: DateTime<Utc>,
    },
    /// The session settled to idle: no run in flight, nothing counting down.
    SessionIdle { at: DateTime<Utc> },
    /// Tasks were added, deleted, or reset.
    TaskListChanged { at: DateTime<Utc> },
}
