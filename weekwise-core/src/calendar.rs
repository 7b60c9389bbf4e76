//! Calendar math for the week view
//!
//! Every function here takes the "today" snapshot as an argument instead
//! of reading the clock, so one render pass always sees a single day even
//! when it straddles midnight.
//!
//! Also hosts the explicit date grammar used by command-line flags:
//! - ISO dates: "2026-01-25"
//! - Human dates: "Jan 25", "January 25 2026", "25 Jan 2026", "01/25"
//! - Relative: "today", "tomorrow", "monday", "next friday"
//! - Offset: "in 3 days", "in 1 week"

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Weeks beyond this distance from today are clamped so date arithmetic stays total
pub const MAX_WEEK_OFFSET: i64 = 520_000;

/// Short weekday labels, Monday first
pub const WEEKDAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

static ORDINAL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})(?:st|nd|rd|th)\b").expect("Invalid ordinal regex pattern")
});

/// A calendar day used as a grouping key, rendered as `YYYY-MM-DD`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn new(date: NaiveDate) -> Self {
        DayKey(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for DayKey {
    fn from(date: NaiveDate) -> Self {
        DayKey(date)
    }
}

impl From<DayKey> for NaiveDate {
    fn from(key: DayKey) -> Self {
        key.0
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DayKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(DayKey)
            .map_err(|_| CoreError::validation("date", format!("'{}' is not a YYYY-MM-DD day", s)))
    }
}

/// One column header of the week view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekDay {
    pub name: &'static str,
    pub day_of_month: u32,
    pub key: DayKey,
}

impl WeekDay {
    fn from_date(date: NaiveDate) -> Self {
        Self {
            name: WEEKDAY_NAMES[date.weekday().num_days_from_monday() as usize],
            day_of_month: date.day(),
            key: DayKey(date),
        }
    }
}

/// The seven days currently in view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekWindow {
    pub week_offset: i64,
    pub start: NaiveDate,
    pub days: [WeekDay; 7],
}

impl WeekWindow {
    pub fn new(week_offset: i64, today: NaiveDate) -> Self {
        let start = start_of_week(week_offset, today);
        Self {
            week_offset,
            start,
            days: week_days(start),
        }
    }

    pub fn end(&self) -> NaiveDate {
        self.days[6].key.date()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end()
    }

    pub fn label(&self) -> String {
        week_label(self.start)
    }
}

fn shift_days(date: NaiveDate, days: i64) -> NaiveDate {
    let shifted = if days >= 0 {
        date.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    };
    shifted.unwrap_or(if days >= 0 { NaiveDate::MAX } else { NaiveDate::MIN })
}

/// Monday of the week containing `today + week_offset` weeks
pub fn start_of_week(week_offset: i64, today: NaiveDate) -> NaiveDate {
    let offset = week_offset.clamp(-MAX_WEEK_OFFSET, MAX_WEEK_OFFSET);
    let from_monday = i64::from(today.weekday().num_days_from_monday());
    shift_days(today, offset * 7 - from_monday)
}

/// Monday..Sunday starting at `start`
pub fn week_days(start: NaiveDate) -> [WeekDay; 7] {
    std::array::from_fn(|i| WeekDay::from_date(shift_days(start, i as i64)))
}

/// Calendar-day equality, time of day is irrelevant
pub fn is_today(date: NaiveDate, today: NaiveDate) -> bool {
    date.year() == today.year() && date.month() == today.month() && date.day() == today.day()
}

/// Today's weekday projected into the viewed week
pub fn today_key_in_week(week_offset: i64, today: NaiveDate) -> DayKey {
    let start = start_of_week(week_offset, today);
    DayKey(shift_days(
        start,
        i64::from(today.weekday().num_days_from_monday()),
    ))
}

/// "May 6 - May 12"
pub fn week_label(start: NaiveDate) -> String {
    let end = shift_days(start, 6);
    format!("{} - {}", start.format("%b %-d"), end.format("%b %-d"))
}

/// "Monday, Oct 19"
pub fn today_label(today: NaiveDate) -> String {
    today.format("%A, %b %-d").to_string()
}

/// Parse a date expression relative to `today`
///
/// Supports multiple formats:
/// - ISO: "2026-01-25"
/// - Human: "Jan 25", "January 25", "Jan 25 2026", "25 Jan 2026", "Jan 25th, 2026"
/// - Slashes: "01/25", "01/25/2026"
/// - Relative: "today", "tonight", "tomorrow", "yesterday"
/// - Weekdays: "monday" (next occurrence, today included), "next monday", "this monday"
/// - Offset: "in 3 days", "in 1 week", "in 2 weeks"
pub fn parse_date(input: &str, today: NaiveDate) -> Result<NaiveDate> {
    let normalized = normalize(input);

    if let Some(date) = try_parse_relative(&normalized, today) {
        return Ok(date);
    }

    if let Some(date) = try_parse_weekday(&normalized, today) {
        return Ok(date);
    }

    if let Some(date) = try_parse_offset(&normalized, today) {
        return Ok(date);
    }

    if let Ok(date) = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d") {
        return Ok(date);
    }

    let with_year = [
        "%b %d %Y", // Jan 25 2026, January 25 2026
        "%d %b %Y", // 25 Jan 2026
        "%m/%d/%Y", // 01/25/2026
    ];
    for format in &with_year {
        if let Ok(date) = NaiveDate::parse_from_str(&normalized, format) {
            return Ok(date);
        }
    }

    // No year given: the next occurrence on or after today. Feb 29 can be
    // up to eight years out when a century year skips the leap day.
    let year = today.year();
    let without_year = [("%b %d %Y", ' '), ("%d %b %Y", ' '), ("%m/%d/%Y", '/')];
    for (format, separator) in &without_year {
        for candidate_year in year..=year.saturating_add(8) {
            let candidate = format!("{}{}{}", normalized, separator, candidate_year);
            if let Ok(date) = NaiveDate::parse_from_str(&candidate, format) {
                if date >= today {
                    return Ok(date);
                }
            }
        }
    }

    Err(CoreError::parse(format!(
        "Could not parse date '{}'. Try formats like: 'tomorrow', 'Jan 25', '2026-01-25', 'next monday', 'in 3 days'",
        input.trim()
    )))
}

fn normalize(input: &str) -> String {
    let lowered = input.trim().to_lowercase().replace(',', " ");
    let lowered = ORDINAL_REGEX.replace_all(&lowered, "$1");
    lowered
        .split_whitespace()
        .map(|word| if word == "sept" { "sep" } else { word })
        .collect::<Vec<_>>()
        .join(" ")
}

fn try_parse_relative(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    match input {
        "today" | "tonight" => Some(today),
        "tomorrow" => today.checked_add_days(Days::new(1)),
        "yesterday" => today.checked_sub_days(Days::new(1)),
        _ => None,
    }
}

/// Parse a full or abbreviated weekday name
pub fn weekday_from_name(name: &str) -> Option<Weekday> {
    match name {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" | "tues" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" | "thur" | "thurs" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

fn try_parse_weekday(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    // "next friday" always lands after today, a bare "friday" may be today
    let (weekday_str, skip_today) = if let Some(stripped) = input.strip_prefix("next ") {
        (stripped, true)
    } else if let Some(stripped) = input.strip_prefix("this ") {
        (stripped, false)
    } else {
        (input, false)
    };

    let target = weekday_from_name(weekday_str.trim())?;
    let days = (i64::from(target.num_days_from_monday())
        - i64::from(today.weekday().num_days_from_monday())
        + 7)
        % 7;
    let days = if days == 0 && skip_today { 7 } else { days };

    today.checked_add_days(Days::new(days as u64))
}

fn try_parse_offset(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    let rest = input.strip_prefix("in ")?.trim();
    let parts: Vec<&str> = rest.split_whitespace().collect();

    if parts.len() != 2 {
        return None;
    }

    let num: u64 = parts[0].parse().ok()?;

    match parts[1] {
        "day" | "days" => today.checked_add_days(Days::new(num)),
        "week" | "weeks" => today.checked_add_days(Days::new(num.checked_mul(7)?)),
        _ => None,
    }
}

/// Format a date for human-readable list output
///
/// Returns strings like: "Today", "Tomorrow", "Mon Jan 27", "Overdue (3 days ago)"
pub fn format_date_human(date: NaiveDate, today: NaiveDate) -> String {
    let diff = date.signed_duration_since(today).num_days();

    match diff {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        -1 => "Yesterday".to_string(),
        2..=6 => date.format("%a %b %d").to_string(),
        7..=365 => date.format("%b %d").to_string(),
        _ if diff < 0 => format!("Overdue ({} days ago)", -diff),
        _ => date.format("%Y-%m-%d").to_string(),
    }
}
