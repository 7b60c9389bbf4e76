//! Task domain model and the in-memory task index
//!
//! Pure domain logic with no I/O operations.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::calendar::DayKey;
use crate::error::{CoreError, Result};

/// Identifier assigned by the persistence collaborator
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        TaskId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading characters used when listing tasks in a terminal
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        TaskId(id.to_string())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        TaskId(id)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the signed-in user that owns the tasks
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `HH:MM` serde representation for optional times
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => s.serialize_str(&t.format("%H:%M").to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => super::parse_time(s)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Parse `HH:MM` or `HH:MM:SS`, truncating to minute precision
pub fn parse_time(input: &str) -> Result<NaiveTime> {
    let input = input.trim();
    NaiveTime::parse_from_str(input, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(input, "%H:%M:%S"))
        .map(truncate_to_minute)
        .map_err(|_| CoreError::validation("time", format!("'{}' is not an HH:MM time", input)))
}

/// Drop seconds and sub-second precision
pub fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    use chrono::Timelike;
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

/// A single task
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default, with = "hhmm")]
    pub time: Option<NaiveTime>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_completed: bool,
}

impl Task {
    /// Create an open, unscheduled task
    pub fn new(id: impl Into<TaskId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            date: None,
            time: None,
            description: None,
            is_completed: false,
        }
    }

    /// Builder method to set the scheduled day
    pub fn with_date(mut self, date: Option<NaiveDate>) -> Self {
        self.date = date;
        self
    }

    /// Builder method to set the time of day
    pub fn with_time(mut self, time: Option<NaiveTime>) -> Self {
        self.time = time;
        self
    }

    /// Builder method to set the description
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Builder method to set completion status
    pub fn with_completed(mut self, completed: bool) -> Self {
        self.is_completed = completed;
        self
    }

    /// Toggle completion status
    pub fn toggle_complete(&mut self) {
        self.is_completed = !self.is_completed;
    }

    pub fn day_key(&self) -> Option<DayKey> {
        self.date.map(DayKey::from)
    }

    /// Replace the fields named by `patch`, returns whether anything changed
    pub fn apply(&mut self, patch: &TaskPatch) -> bool {
        let before = self.clone();
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(time) = patch.time {
            self.time = time;
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(completed) = patch.is_completed {
            self.is_completed = completed;
        }
        *self != before
    }
}

/// Fields sent to the persistence collaborator to create a task
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub user_id: UserId,
    pub is_completed: bool,
    pub date: Option<NaiveDate>,
    #[serde(with = "hhmm")]
    pub time: Option<NaiveTime>,
    pub description: Option<String>,
}

impl NewTask {
    /// Validated creation fields; the title is trimmed and must not be blank
    pub fn new(title: &str, user_id: UserId) -> Result<Self> {
        let title = title.trim();
        if title.is_empty() {
            return Err(CoreError::validation("title", "Title must not be blank"));
        }
        Ok(Self {
            title: title.to_string(),
            user_id,
            is_completed: false,
            date: None,
            time: None,
            description: None,
        })
    }

    pub fn with_schedule(mut self, date: Option<NaiveDate>, time: Option<NaiveTime>) -> Self {
        self.date = date;
        self.time = time;
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.trim().is_empty());
        self
    }

    /// Materialize the record once the collaborator has assigned an id
    pub fn into_task(self, id: TaskId) -> Task {
        Task {
            id,
            title: self.title,
            date: self.date,
            time: self.time,
            description: self.description,
            is_completed: self.is_completed,
        }
    }
}

/// Partial update; `Some(None)` clears an optional field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub date: Option<Option<NaiveDate>>,
    pub time: Option<Option<NaiveTime>>,
    pub description: Option<Option<String>>,
    pub is_completed: Option<bool>,
}

impl TaskPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn date(mut self, date: Option<NaiveDate>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn time(mut self, time: Option<NaiveTime>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.is_completed = Some(completed);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.date.is_none()
            && self.time.is_none()
            && self.description.is_none()
            && self.is_completed.is_none()
    }

    /// Names of the fields this patch touches
    pub fn fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.date.is_some() {
            fields.push("date");
        }
        if self.time.is_some() {
            fields.push("time");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.is_completed.is_some() {
            fields.push("is_completed");
        }
        fields
    }
}

/// Records taken out of the index together with their former positions
pub type Removed = Vec<(usize, Task)>;

/// Ordered in-memory collection of tasks, unique by id
///
/// This is a pure domain model with no I/O operations; the mutation
/// reconciler owns when changes are committed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TaskIndex {
    tasks: Vec<Task>,
}

impl TaskIndex {
    /// Create a new empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from a bulk read, keeping the first record of any duplicated id
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let mut index = Self::new();
        for task in tasks {
            if !index.contains(&task.id) {
                index.tasks.push(task);
            }
        }
        index
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| &t.id == id)
    }

    /// Get or return error if task not found
    pub fn get_or_err(&self, id: &TaskId) -> Result<&Task> {
        self.get(id).ok_or_else(|| CoreError::TaskNotFound(id.clone()))
    }

    /// Put a freshly created record at the front of the index
    ///
    /// A record whose id is already present replaces the old one in place.
    pub fn insert_front(&mut self, task: Task) {
        match self.position(&task.id) {
            Some(pos) => self.tasks[pos] = task,
            None => self.tasks.insert(0, task),
        }
    }

    /// Replace fields of the task with `id`; no-op when absent
    ///
    /// Returns whether the task was found.
    pub fn replace(&mut self, id: &TaskId, patch: &TaskPatch) -> bool {
        match self.tasks.iter_mut().find(|t| &t.id == id) {
            Some(task) => {
                task.apply(patch);
                true
            }
            None => false,
        }
    }

    /// Set completion and return the previous value, `None` when absent
    pub fn set_completed(&mut self, id: &TaskId, completed: bool) -> Option<bool> {
        let task = self.tasks.iter_mut().find(|t| &t.id == id)?;
        let previous = task.is_completed;
        task.is_completed = completed;
        Some(previous)
    }

    /// Remove every task matching `predicate`
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&Task) -> bool) -> Removed {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.tasks.len());
        for (pos, task) in std::mem::take(&mut self.tasks).into_iter().enumerate() {
            if predicate(&task) {
                removed.push((pos, task));
            } else {
                kept.push(task);
            }
        }
        self.tasks = kept;
        removed
    }

    /// Put removed records back at their former positions
    ///
    /// Records whose id reappeared in the meantime are skipped.
    pub fn restore(&mut self, mut removed: Removed) -> usize {
        removed.sort_by_key(|(pos, _)| *pos);
        let mut restored = 0;
        for (pos, task) in removed {
            if self.contains(&task.id) {
                continue;
            }
            let at = pos.min(self.tasks.len());
            self.tasks.insert(at, task);
            restored += 1;
        }
        restored
    }

    /// Count completed tasks
    pub fn count_completed(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_completed).count()
    }

    /// Resolve a full id or a unique id prefix
    pub fn resolve(&self, prefix: &str) -> Result<TaskId> {
        let prefix = prefix.trim();
        if let Some(task) = self.tasks.iter().find(|t| t.id.as_str() == prefix) {
            return Ok(task.id.clone());
        }

        let matches: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| !prefix.is_empty() && t.id.as_str().starts_with(prefix))
            .collect();

        match matches.as_slice() {
            [only] => Ok(only.id.clone()),
            [] => Err(CoreError::TaskNotFound(TaskId::from(prefix))),
            many => Err(CoreError::AmbiguousId {
                prefix: prefix.to_string(),
                matches: many.len(),
            }),
        }
    }

    /// Group scheduled tasks by day, see [`group_by_date`]
    pub fn group_by_date(&self) -> BTreeMap<DayKey, Vec<&Task>> {
        group_by_date(self.tasks.iter())
    }
}

/// Group tasks by their day key
///
/// Unscheduled tasks are left out; order within a day follows the input.
pub fn group_by_date<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> BTreeMap<DayKey, Vec<&'a Task>> {
    let mut grouped: BTreeMap<DayKey, Vec<&Task>> = BTreeMap::new();
    for task in tasks {
        if let Some(key) = task.day_key() {
            grouped.entry(key).or_default().push(task);
        }
    }
    grouped
}
