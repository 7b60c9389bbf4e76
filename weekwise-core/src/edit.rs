//! Edit surfaces that turn user input into task patches
//!
//! The expanded-card editor and a drag-and-drop drop both end up as a
//! [`TaskPatch`] holding only the fields that actually change.

use serde::{Deserialize, Serialize};

use crate::calendar::DayKey;
use crate::error::{CoreError, Result};
use crate::task::{Task, TaskId, TaskPatch, parse_time};

/// Raw values of the expanded-card editor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditForm {
    pub title: String,
    /// `YYYY-MM-DD` or blank
    pub date: String,
    /// `HH:MM` or blank
    pub time: String,
    pub description: String,
    pub is_completed: bool,
}

impl EditForm {
    /// Prefill the editor from the current record
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            date: task
                .date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            time: task
                .time
                .map(|t| t.format("%H:%M").to_string())
                .unwrap_or_default(),
            description: task.description.clone().unwrap_or_default(),
            is_completed: task.is_completed,
        }
    }

    /// Patch with the fields that differ from `original`
    ///
    /// Blank date, time and description mean "unset". A blank title or a
    /// malformed date/time is a validation error.
    pub fn diff(&self, original: &Task) -> Result<TaskPatch> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(CoreError::validation("title", "Title must not be blank"));
        }

        let date = match self.date.trim() {
            "" => None,
            raw => Some(raw.parse::<DayKey>()?.date()),
        };
        let time = match self.time.trim() {
            "" => None,
            raw => Some(parse_time(raw)?),
        };
        let description = match self.description.trim() {
            "" => None,
            _ => Some(self.description.clone()),
        };

        let mut patch = TaskPatch::new();
        if title != original.title {
            patch = patch.title(title);
        }
        if date != original.date {
            patch = patch.date(date);
        }
        if time != original.time {
            patch = patch.time(time);
        }
        if description != original.description {
            patch = patch.description(description);
        }
        if self.is_completed != original.is_completed {
            patch = patch.completed(self.is_completed);
        }
        Ok(patch)
    }
}

/// A task card released over a day column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropEvent {
    pub task_id: TaskId,
    pub day: DayKey,
}

impl DropEvent {
    pub fn new(task_id: TaskId, day: DayKey) -> Self {
        Self { task_id, day }
    }

    /// Move to the destination day, time of day is kept
    pub fn patch_for(&self, task: &Task) -> TaskPatch {
        let destination = Some(self.day.date());
        if task.date == destination {
            TaskPatch::new()
        } else {
            TaskPatch::new().date(destination)
        }
    }
}
