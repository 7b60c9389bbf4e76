//! View selection and composition
//!
//! The host asks for one [`Projection`] per render pass; the three
//! presentation adapters only ever see the result.

use chrono::NaiveDate;

use crate::calendar::{WeekDay, WeekWindow};
use crate::query::{ViewMode, ViewParams, project, project_week};
use crate::task::Task;

/// The projection that will be rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Week,
    All,
    Search,
}

/// One day of the week view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayColumn<'a> {
    pub day: WeekDay,
    pub is_today: bool,
    pub tasks: Vec<&'a Task>,
}

/// Render-ready output of a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection<'a> {
    Week {
        window: WeekWindow,
        columns: Vec<DayColumn<'a>>,
    },
    All(Vec<&'a Task>),
    Search {
        query: String,
        tasks: Vec<&'a Task>,
    },
}

impl<'a> Projection<'a> {
    /// Every task card in display order
    pub fn cards(&self) -> Vec<&'a Task> {
        match self {
            Self::Week { columns, .. } => columns.iter().flat_map(|c| c.tasks.iter().copied()).collect(),
            Self::All(tasks) | Self::Search { tasks, .. } => tasks.clone(),
        }
    }

    pub fn kind(&self) -> ViewKind {
        match self {
            Self::Week { .. } => ViewKind::Week,
            Self::All(_) => ViewKind::All,
            Self::Search { .. } => ViewKind::Search,
        }
    }

    /// Number of task cards the projection will show
    pub fn task_count(&self) -> usize {
        match self {
            Self::Week { columns, .. } => columns.iter().map(|c| c.tasks.len()).sum(),
            Self::All(tasks) | Self::Search { tasks, .. } => tasks.len(),
        }
    }
}

/// A non-blank query always wins, whatever the selected mode
pub fn select_view(params: &ViewParams) -> ViewKind {
    if params.query().is_some() {
        return ViewKind::Search;
    }
    match params.mode {
        ViewMode::Week => ViewKind::Week,
        ViewMode::All => ViewKind::All,
        ViewMode::Search => ViewKind::Search,
    }
}

/// Compute the projection chosen by [`select_view`]
///
/// `today` is the snapshot for the whole pass.
pub fn compose<'a>(tasks: &'a [Task], params: &ViewParams, today: NaiveDate) -> Projection<'a> {
    match select_view(params) {
        ViewKind::Week => {
            let window = WeekWindow::new(params.week_offset, today);
            let columns = project_week(tasks, params, &window, today);
            Projection::Week { window, columns }
        }
        ViewKind::All => Projection::All(project(tasks, params)),
        ViewKind::Search => Projection::Search {
            query: params.search_query.trim().to_string(),
            tasks: project(tasks, params),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SortKey;

    fn tasks() -> Vec<Task> {
        let day = NaiveDate::from_ymd_opt(2024, 5, 2);
        vec![
            Task::new("1", "Buy milk").with_date(day),
            Task::new("2", "Walk dog").with_date(day),
            Task::new("3", "Milk the budget"),
        ]
    }

    #[test]
    fn test_query_takes_precedence() {
        let params = ViewParams::new(ViewMode::Week).with_search("milk");
        assert_eq!(select_view(&params), ViewKind::Search);

        let params = ViewParams::new(ViewMode::All).with_search("milk");
        assert_eq!(select_view(&params), ViewKind::Search);

        let params = ViewParams::new(ViewMode::Week).with_search("   ");
        assert_eq!(select_view(&params), ViewKind::Week);

        assert_eq!(select_view(&ViewParams::new(ViewMode::All)), ViewKind::All);
        assert_eq!(select_view(&ViewParams::new(ViewMode::Search)), ViewKind::Search);
    }

    #[test]
    fn test_compose_search_from_week_mode() {
        let tasks = tasks();
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let params = ViewParams::new(ViewMode::Week)
            .with_search("milk")
            .with_sort(SortKey::TitleAsc);

        match compose(&tasks, &params, today) {
            Projection::Search { query, tasks } => {
                assert_eq!(query, "milk");
                let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
                assert_eq!(titles, vec!["Buy milk", "Milk the budget"]);
            }
            other => panic!("expected search projection, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_compose_week_and_all() {
        let tasks = tasks();
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

        let week = compose(&tasks, &ViewParams::new(ViewMode::Week), today);
        assert_eq!(week.kind(), ViewKind::Week);
        assert_eq!(week.task_count(), 2);
        let ids: Vec<&str> = week.cards().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        if let Projection::Week { window, columns } = &week {
            assert_eq!(window.label(), "Apr 29 - May 5");
            assert_eq!(columns[3].tasks.len(), 2);
        }

        let all = compose(&tasks, &ViewParams::new(ViewMode::All), today);
        assert_eq!(all.kind(), ViewKind::All);
        assert_eq!(all.task_count(), 3);
    }
}
