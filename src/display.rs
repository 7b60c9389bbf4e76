//! Terminal presentation of a composed projection
//!
//! Three thin adapters, one per projection kind. None of them filter or
//! sort; they only lay out what `compose` produced.

use chrono::NaiveDate;
use colored::*;

use weekwise_core::calendar::{format_date_human, today_label};
use weekwise_core::{DayColumn, Projection, Task, WeekWindow};

pub const EMPTY_LIST: &str = "No tasks to show.";
pub const EMPTY_SEARCH: &str = "No tasks matched your search.";

/// Rendering switches for one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayOptions {
    pub show_descriptions: bool,
    pub use_color: bool,
}

/// Check if terminal supports colors
pub fn supports_color() -> bool {
    atty::is(atty::Stream::Stdout)
}

/// Where a task card is shown; week columns already name the day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    DayColumn,
    List,
}

/// Format a task card for a list or search result
pub fn format_task(task: &Task, today: NaiveDate, opts: DisplayOptions) -> String {
    format_card(task, today, opts, Placement::List)
}

fn format_card(task: &Task, today: NaiveDate, opts: DisplayOptions, placement: Placement) -> String {
    let checkbox = if task.is_completed { "[✓]" } else { "[ ]" };

    let id_str = if opts.use_color {
        format!("({})", task.id.short()).cyan().to_string()
    } else {
        format!("({})", task.id.short())
    };

    let title = if !opts.use_color {
        task.title.clone()
    } else if task.is_completed {
        task.title.green().strikethrough().to_string()
    } else {
        task.title.clone()
    };

    let time = task.time.map(|t| t.format("%H:%M").to_string());
    let when = match (placement, task.date) {
        (Placement::DayColumn, _) => time,
        (Placement::List, Some(date)) => {
            let date_str = format_date_human(date, today);
            let overdue = date < today && !task.is_completed;
            let text = match time {
                Some(time) => format!("{} {}", date_str, time),
                None => date_str,
            };
            Some(if opts.use_color && overdue {
                text.red().to_string()
            } else if opts.use_color {
                text.yellow().to_string()
            } else {
                text
            })
        }
        (Placement::List, None) => None,
    };

    let mut line = match when {
        Some(when) => format!("{} {} {} {}", checkbox, when, title, id_str),
        None => format!("{} {} {}", checkbox, title, id_str),
    };

    if opts.show_descriptions
        && let Some(description) = task.description.as_deref().filter(|d| !d.trim().is_empty())
    {
        let description = if opts.use_color {
            description.dimmed().to_string()
        } else {
            description.to_string()
        };
        line.push_str(&format!("\n      {}", description));
    }
    line
}

/// Render whichever projection the selector picked
pub fn render_projection(projection: &Projection<'_>, today: NaiveDate, opts: DisplayOptions) -> String {
    match projection {
        Projection::Week { window, columns } => render_week(window, columns, today, opts),
        Projection::All(tasks) => render_list(tasks, today, opts),
        Projection::Search { query, tasks } => render_search(query, tasks, today, opts),
    }
}

fn render_week(window: &WeekWindow, columns: &[DayColumn<'_>], today: NaiveDate, opts: DisplayOptions) -> String {
    let mut lines = vec![format!("Week of {}", window.label())];
    if window.contains(today) {
        lines.push(format!("Today is {}", today_label(today)));
    }

    for column in columns {
        let header = format!("{} {}", column.day.name, column.day.day_of_month);
        lines.push(String::new());
        lines.push(match (column.is_today, opts.use_color) {
            (true, true) => format!("{} (today)", header).bold().blue().to_string(),
            (true, false) => format!("{} (today)", header),
            (false, true) => header.bold().to_string(),
            (false, false) => header,
        });
        for task in &column.tasks {
            lines.push(format!("  {}", format_card(task, today, opts, Placement::DayColumn)));
        }
    }

    if columns.iter().all(|c| c.tasks.is_empty()) {
        lines.push(String::new());
        lines.push(EMPTY_LIST.to_string());
    }
    lines.join("\n")
}

fn render_list(tasks: &[&Task], today: NaiveDate, opts: DisplayOptions) -> String {
    if tasks.is_empty() {
        return EMPTY_LIST.to_string();
    }
    tasks
        .iter()
        .map(|task| format_task(task, today, opts))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_search(query: &str, tasks: &[&Task], today: NaiveDate, opts: DisplayOptions) -> String {
    if tasks.is_empty() {
        return EMPTY_SEARCH.to_string();
    }
    let mut lines = vec![format!("Results for \"{}\"", query)];
    lines.extend(tasks.iter().map(|task| format_task(task, today, opts)));
    lines.join("\n")
}

/// Format a summary line for a rendered projection
pub fn format_summary(shown: usize, completed: usize, use_color: bool) -> String {
    let done = if use_color {
        format!("{} done", completed).green().to_string()
    } else {
        format!("{} done", completed)
    };
    format!("[{} shown | {}]", shown, done)
}
