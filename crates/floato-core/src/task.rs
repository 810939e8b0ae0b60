//! Task model and the ordered task list with its active-task cursor.
//!
//! The list processes tasks top to bottom: [`TaskList::advance`] only ever
//! scans forward, so an unfinished task earlier in the list is not revisited
//! from a later position. Deletion and reset recompute the cursor from the
//! front; those are the only paths that can move it backward.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Category of a task. Colors and icons are display hints for UI layers and
/// carry no behavioral weight in the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskCategory {
    Work,
    Study,
    Personal,
    Health,
    Hobby,
}

impl TaskCategory {
    pub const ALL: [TaskCategory; 5] = [
        TaskCategory::Work,
        TaskCategory::Study,
        TaskCategory::Personal,
        TaskCategory::Health,
        TaskCategory::Hobby,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Work => "work",
            TaskCategory::Study => "study",
            TaskCategory::Personal => "personal",
            TaskCategory::Health => "health",
            TaskCategory::Hobby => "hobby",
        }
    }

    /// Display color for UI layers.
    pub fn color_hex(&self) -> &'static str {
        match self {
            TaskCategory::Work => "#00b1b0",
            TaskCategory::Study => "#fec84d",
            TaskCategory::Personal => "#ff8370",
            TaskCategory::Health => "#2a9d8f",
            TaskCategory::Hobby => "#e42256",
        }
    }

    /// Symbol name for UI layers.
    pub fn icon_name(&self) -> &'static str {
        match self {
            TaskCategory::Work => "inset.filled.rectangle.and.person.filled",
            TaskCategory::Study => "books.vertical.fill",
            TaskCategory::Personal => "figure.wave",
            TaskCategory::Health => "stethoscope.circle",
            TaskCategory::Hobby => "figure.basketball",
        }
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "work" => Ok(TaskCategory::Work),
            "study" => Ok(TaskCategory::Study),
            "personal" => Ok(TaskCategory::Personal),
            "health" => Ok(TaskCategory::Health),
            "hobby" => Ok(TaskCategory::Hobby),
            other => Err(ValidationError::UnknownCategory(other.to_string())),
        }
    }
}

/// One user-defined unit of work, measured in target pomodoro intervals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub category: TaskCategory,
    pub target_intervals: u32,
    pub finished_intervals: u32,
    pub is_done: bool,
}

impl Task {
    fn new(title: String, target_intervals: u32, category: TaskCategory) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            category,
            target_intervals,
            finished_intervals: 0,
            is_done: false,
        }
    }

    /// Intervals still needed to finish this task.
    pub fn remaining_intervals(&self) -> u32 {
        self.target_intervals.saturating_sub(self.finished_intervals)
    }
}

/// Ordered task collection with completion tracking and an active-task cursor.
///
/// The cursor is derived state: when `Some`, it points at a not-done task.
/// The one sanctioned exception is the window between
/// [`record_interval_completed`](TaskList::record_interval_completed) and
/// [`advance`](TaskList::advance), where the just-finished task stays current
/// so the session layer can keep displaying it through the break.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskList {
    tasks: Vec<Task>,
    active_index: Option<usize>,
}

impl TaskList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a list from persisted tasks. Normalizes each task's done flag
    /// against its counts and points the cursor at the first not-done task.
    pub fn from_tasks(mut tasks: Vec<Task>) -> Self {
        for task in &mut tasks {
            task.finished_intervals = task.finished_intervals.min(task.target_intervals);
            task.is_done = task.finished_intervals >= task.target_intervals;
        }
        let active_index = tasks.iter().position(|t| !t.is_done);
        Self { tasks, active_index }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active_index
    }

    pub fn active_task(&self) -> Option<&Task> {
        self.active_index.and_then(|i| self.tasks.get(i))
    }

    /// Append a new task.
    ///
    /// Rejects empty (or whitespace-only) titles and a zero interval target.
    /// If the cursor was absent, it lands on the first not-done task, which
    /// after an add to an otherwise all-done list is the new item.
    pub fn add(
        &mut self,
        title: &str,
        target_intervals: u32,
        category: TaskCategory,
    ) -> Result<&Task, ValidationError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if target_intervals == 0 {
            return Err(ValidationError::NonPositiveTarget(target_intervals));
        }
        let index = self.tasks.len();
        self.tasks
            .push(Task::new(title.to_string(), target_intervals, category));
        if self.active_index.is_none() {
            self.active_index = self.first_unfinished_from(0);
        }
        Ok(&self.tasks[index])
    }

    /// Remove a task by id. Recomputes the cursor from the front of the list.
    pub fn delete(&mut self, id: &Uuid) -> Option<Task> {
        let index = self.tasks.iter().position(|t| &t.id == id)?;
        self.delete_at(index)
    }

    /// Remove a task by position. Recomputes the cursor from the front.
    pub fn delete_at(&mut self, index: usize) -> Option<Task> {
        if index >= self.tasks.len() {
            return None;
        }
        let removed = self.tasks.remove(index);
        self.active_index = self.first_unfinished_from(0);
        Some(removed)
    }

    /// Apply one completed work interval to the active task.
    ///
    /// Increments the finished count (clamped to the target) and flips the
    /// done flag when the target is reached. Deliberately does not move the
    /// cursor -- advancing is a separate step so the just-finished task stays
    /// current while a break runs. Returns a snapshot of the updated task, or
    /// `None` when the cursor is absent or stale (a logged caller error, not
    /// a fatal condition).
    pub fn record_interval_completed(&mut self) -> Option<Task> {
        let index = self.active_index?;
        let task = match self.tasks.get_mut(index) {
            Some(task) => task,
            None => {
                log::warn!("active index {index} is out of bounds, ignoring interval completion");
                self.active_index = self.first_unfinished_from(0);
                return None;
            }
        };
        task.finished_intervals = (task.finished_intervals + 1).min(task.target_intervals);
        if task.finished_intervals >= task.target_intervals {
            task.is_done = true;
        }
        Some(task.clone())
    }

    /// Move the cursor forward to the next not-done task, or to `None` when
    /// nothing unfinished remains between here and the end of the list.
    pub fn advance(&mut self) {
        let Some(current) = self.active_index else {
            return;
        };
        self.active_index = self.first_unfinished_from(current + 1);
    }

    /// True when every task other than the active one is already done -- the
    /// active task is the last remaining unit of work. Also true for an
    /// absent cursor.
    pub fn is_last_task(&self) -> bool {
        let Some(active) = self.active_index else {
            return true;
        };
        self.tasks
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != active)
            .all(|(_, t)| t.is_done)
    }

    /// Clear all tasks and the cursor.
    pub fn reset_all(&mut self) {
        self.tasks.clear();
        self.active_index = None;
    }

    fn first_unfinished_from(&self, start: usize) -> Option<usize> {
        self.tasks
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, t)| !t.is_done)
            .map(|(i, _)| i)
    }
}
