use chrono::{Local, NaiveDate, TimeZone};
use chrono_english::{Dialect, parse_date_string};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use weekwise_core::calendar::parse_date;
use weekwise_core::{DayKey, SortKey, ViewMode};

use crate::error::{AppError, Result};

#[derive(Parser)]
#[command(name = "weekwise")]
#[command(about = concat!(
    "+---+---+---+---+---+---+---+\n",
    "| M | T | W | T | F | S | S |\n",
    "+---+---+---+---+---+---+---+\n",
    "~A week at a time, one column per day~"
))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_version = concat!(
    "v",
    env!("CARGO_PKG_VERSION"),
    "\nCodeName: ",
    env!("CODENAME")
))]
pub struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Less log output (-q warn, -qq errors only)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Shows the week, the full list, or search results
    Show {
        /// View to render (week, all, search)
        #[arg(long, value_name = "VIEW")]
        view: Option<ViewMode>,
        /// Week offset from the current week
        #[arg(long, short = 'w', allow_negative_numbers = true, default_value_t = 0)]
        week: i64,
        /// Sort order (none, date-asc, date-desc, title-asc)
        #[arg(long, value_name = "ORDER")]
        sort: Option<SortKey>,
        /// Include completed tasks
        #[arg(long, overrides_with = "hide_completed")]
        completed: bool,
        /// Hide completed tasks
        #[arg(long)]
        hide_completed: bool,
        /// Show task descriptions
        #[arg(long, short = 'd')]
        descriptions: bool,
        /// Filter tasks containing text (case-insensitive)
        #[arg(long, short = 's', value_name = "TERM")]
        search: Option<String>,
        /// Disable colors
        #[arg(long)]
        no_color: bool,
    },

    /// Adds a task from free text, e.g. "Lunch tomorrow 1pm"
    Add {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
        /// View the task is added from; week view lands undated tasks on today's weekday
        #[arg(long, value_name = "VIEW")]
        view: Option<ViewMode>,
        /// Week offset of the week view
        #[arg(long, short = 'w', allow_negative_numbers = true, default_value_t = 0)]
        week: i64,
    },

    /// Toggles task completion status
    Toggle {
        /// Task id or unique id prefix
        id: String,
    },

    /// Edit a task's fields; blank values clear date, time and description
    Edit {
        /// Task id or unique id prefix
        id: String,
        /// New title
        #[arg(long, value_name = "TITLE")]
        title: Option<String>,
        /// New day (YYYY-MM-DD, blank to clear)
        #[arg(long, value_name = "DATE")]
        date: Option<String>,
        /// New time (HH:MM, blank to clear)
        #[arg(long, value_name = "TIME")]
        time: Option<String>,
        /// New description (blank to clear)
        #[arg(long, value_name = "TEXT")]
        description: Option<String>,
        /// Mark as completed
        #[arg(long, conflicts_with = "open")]
        done: bool,
        /// Mark as open
        #[arg(long)]
        open: bool,
    },

    /// Move a task to another day, keeping its time
    Move {
        /// Task id or unique id prefix
        id: String,
        /// Destination day
        #[arg(required = true, num_args = 1..)]
        day: Vec<String>,
    },

    /// Clear completed tasks
    Clear {
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Reload tasks from the store
    Refresh,

    /// Restore tasks from the backup file
    Recover {
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },
}

/// Resolve a destination day
///
/// Tries a `YYYY-MM-DD` key, then the built-in date grammar, then a
/// free-form English expression.
pub fn parse_day(words: &[String], today: NaiveDate) -> Result<DayKey> {
    let input = words.join(" ");

    if let Ok(key) = input.parse::<DayKey>() {
        return Ok(key);
    }
    if let Ok(date) = parse_date(&input, today) {
        return Ok(DayKey::new(date));
    }

    // Relative expressions count from the same `today` as the built-in grammar
    let base = today
        .and_hms_opt(12, 0, 0)
        .and_then(|noon| Local.from_local_datetime(&noon).single())
        .ok_or_else(|| AppError::parse(format!("No local time for {}", today)))?;

    debug!(input = %input, "falling back to english date parsing");
    parse_date_string(&input, base, Dialect::Us)
        .map(|dt| DayKey::new(dt.date_naive()))
        .map_err(|_| AppError::parse(format!("Could not understand the day '{}'", input.trim())))
}

/// Set up the global tracing subscriber
///
/// `RUST_LOG` wins over the flags when set.
pub fn init_tracing(verbose: u8, quiet: u8) -> Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| AppError::config_with_source("Invalid RUST_LOG filter", e))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn words(input: &str) -> Vec<String> {
        input.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_parse_day() {
        assert_eq!(parse_day(&words("2024-05-03"), today()).unwrap().to_string(), "2024-05-03");
        assert_eq!(parse_day(&words("next friday"), today()).unwrap().to_string(), "2024-05-03");
        assert_eq!(parse_day(&words("in 2 days"), today()).unwrap().to_string(), "2024-05-03");
        assert!(parse_day(&words("whenever really"), today()).is_err());
    }

    #[test]
    fn test_parse_day_english_fallback_counts_from_today() {
        // Not in the built-in grammar, so chrono-english resolves it
        assert_eq!(parse_day(&words("2 weeks ago"), today()).unwrap().to_string(), "2024-04-17");
        assert_eq!(parse_day(&words("3 weeks"), today()).unwrap().to_string(), "2024-05-22");
    }

    #[test]
    fn test_init_tracing_twice_is_ok() {
        assert!(init_tracing(0, 1).is_ok());
        assert!(init_tracing(3, 0).is_ok());
    }

    #[test]
    fn test_cli_parses_show_flags() {
        let cli = Cli::try_parse_from([
            "weekwise", "-vv", "show", "--view", "all", "--week", "-2", "--sort", "title-asc", "-s", "milk",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Show {
                view, week, sort, search, ..
            } => {
                assert_eq!(view, Some(ViewMode::All));
                assert_eq!(week, -2);
                assert_eq!(sort, Some(SortKey::TitleAsc));
                assert_eq!(search.as_deref(), Some("milk"));
            }
            _ => panic!("expected show"),
        }
    }

    #[test]
    fn test_edit_done_and_open_conflict() {
        assert!(Cli::try_parse_from(["weekwise", "edit", "ab", "--done", "--open"]).is_err());
    }
}
