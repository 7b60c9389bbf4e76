//! Task filtering and sorting pipeline
//!
//! One projection is shared by the week, list and search views:
//! visibility filter, then search filter, then sort. The week view groups
//! by day before sorting, so each day column is ordered on its own.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::calendar::{WeekWindow, is_today};
use crate::error::CoreError;
use crate::task::{Task, TaskIndex, group_by_date};
use crate::view::DayColumn;

/// Which view the user has selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Week,
    All,
    Search,
}

impl FromStr for ViewMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "week" => Ok(Self::Week),
            "all" => Ok(Self::All),
            "search" => Ok(Self::Search),
            other => Err(CoreError::parse(format!("Unknown view '{}'", other))),
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Week => "week",
            Self::All => "all",
            Self::Search => "search",
        })
    }
}

/// Sort order for tasks
///
/// In the week view the date variants compare time of day, since the
/// date is fixed within a day column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortKey {
    #[serde(rename = "none")]
    Unsorted,
    #[default]
    #[serde(rename = "date-asc")]
    DateAsc,
    #[serde(rename = "date-desc")]
    DateDesc,
    #[serde(rename = "title-asc")]
    TitleAsc,
}

impl FromStr for SortKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Self::Unsorted),
            "date-asc" | "time-asc" | "asc" => Ok(Self::DateAsc),
            "date-desc" | "time-desc" | "desc" => Ok(Self::DateDesc),
            "title-asc" | "title" => Ok(Self::TitleAsc),
            other => Err(CoreError::parse(format!("Unknown sort order '{}'", other))),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unsorted => "none",
            Self::DateAsc => "date-asc",
            Self::DateDesc => "date-desc",
            Self::TitleAsc => "title-asc",
        })
    }
}

/// Ephemeral view state owned by the view host
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewParams {
    pub mode: ViewMode,
    pub week_offset: i64,
    pub sort: SortKey,
    pub show_completed: bool,
    pub show_descriptions: bool,
    pub search_query: String,
}

impl ViewParams {
    pub fn new(mode: ViewMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_week_offset(mut self, week_offset: i64) -> Self {
        self.week_offset = week_offset;
        self
    }

    pub fn with_sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_completed(mut self, show: bool) -> Self {
        self.show_completed = show;
        self
    }

    pub fn with_descriptions(mut self, show: bool) -> Self {
        self.show_descriptions = show;
        self
    }

    pub fn with_search(mut self, query: impl Into<String>) -> Self {
        self.search_query = query.into();
        self
    }

    /// Trimmed query, `None` when blank
    pub fn query(&self) -> Option<&str> {
        let query = self.search_query.trim();
        (!query.is_empty()).then_some(query)
    }

    /// Check if a task survives the visibility and search filters
    pub fn matches(&self, task: &Task) -> bool {
        if task.is_completed && !self.show_completed {
            return false;
        }

        // An empty query in search mode keeps everything
        if let Some(query) = self.query() {
            let needle = query.to_lowercase();
            let in_title = task.title.to_lowercase().contains(&needle);
            let in_description = task
                .description
                .as_ref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !in_title && !in_description {
                return false;
            }
        }

        true
    }
}

/// Collation key: diacritics folded to their base letters, then lowercased
fn title_key(title: &str) -> String {
    deunicode::deunicode(title).to_lowercase()
}

/// Alphabetical order where "Éclair" sits between "apple" and "Zebra"
///
/// Ties on the folded key fall back to the lowercased, then the raw title.
fn compare_titles(a: &Task, b: &Task) -> Ordering {
    title_key(&a.title)
        .cmp(&title_key(&b.title))
        .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
        .then_with(|| a.title.cmp(&b.title))
}

/// Stable sort of the whole list; date variants compare the day
fn sort_list(tasks: &mut [&Task], sort: SortKey) {
    match sort {
        SortKey::Unsorted => {}
        SortKey::TitleAsc => tasks.sort_by(|a, b| compare_titles(a, b)),
        // None orders before Some, like a missing value compared as ""
        SortKey::DateAsc => tasks.sort_by(|a, b| a.date.cmp(&b.date)),
        SortKey::DateDesc => tasks.sort_by(|a, b| b.date.cmp(&a.date)),
    }
}

/// Stable sort of one day column; date variants compare the time of day
fn sort_day(tasks: &mut [&Task], sort: SortKey) {
    match sort {
        SortKey::Unsorted => {}
        SortKey::TitleAsc => tasks.sort_by(|a, b| compare_titles(a, b)),
        SortKey::DateAsc => tasks.sort_by(|a, b| a.time.cmp(&b.time)),
        SortKey::DateDesc => tasks.sort_by(|a, b| b.time.cmp(&a.time)),
    }
}

/// Filter then sort globally, as the list and search views do
pub fn project<'a>(tasks: impl IntoIterator<Item = &'a Task>, params: &ViewParams) -> Vec<&'a Task> {
    let mut visible: Vec<&Task> = tasks.into_iter().filter(|t| params.matches(t)).collect();
    sort_list(&mut visible, params.sort);
    trace!(visible = visible.len(), sort = %params.sort, "projected task list");
    visible
}

/// Filter, group by day, then sort each day of the window independently
pub fn project_week<'a>(
    tasks: impl IntoIterator<Item = &'a Task>,
    params: &ViewParams,
    window: &WeekWindow,
    today: chrono::NaiveDate,
) -> Vec<DayColumn<'a>> {
    let visible = tasks.into_iter().filter(|t| params.matches(t));
    let mut grouped = group_by_date(visible);

    let columns: Vec<DayColumn<'a>> = window
        .days
        .iter()
        .map(|day| {
            let mut tasks = grouped.remove(&day.key).unwrap_or_default();
            sort_day(&mut tasks, params.sort);
            DayColumn {
                day: *day,
                is_today: is_today(day.key.date(), today),
                tasks,
            }
        })
        .collect();

    trace!(
        week = %window.label(),
        scheduled = columns.iter().map(|c| c.tasks.len()).sum::<usize>(),
        "projected week"
    );
    columns
}

/// Extension trait for TaskIndex to project it directly
pub trait ProjectExt {
    /// Tasks filtered and sorted for the list or search view
    fn project(&self, params: &ViewParams) -> Vec<&Task>;

    /// Day columns for the week in `params`
    fn project_week(&self, params: &ViewParams, today: chrono::NaiveDate) -> Vec<DayColumn<'_>>;
}

impl ProjectExt for TaskIndex {
    fn project(&self, params: &ViewParams) -> Vec<&Task> {
        project(self.iter(), params)
    }

    fn project_week(&self, params: &ViewParams, today: chrono::NaiveDate) -> Vec<DayColumn<'_>> {
        let window = WeekWindow::new(params.week_offset, today);
        project_week(self.iter(), params, &window, today)
    }
}
