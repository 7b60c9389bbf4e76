//! Quick-add draft parsing
//!
//! Free text typed into the quick-add box is scanned for a date and a
//! time expression. The text itself is kept verbatim as the title; the
//! extracted schedule travels alongside it.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calendar::{parse_date, today_key_in_week};
use crate::error::Result;
use crate::query::{ViewMode, ViewParams};
use crate::task::{NewTask, UserId};

// Regex patterns are compile-time constants - invalid patterns are programming errors
static DATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    let month = "january|jan|february|feb|march|mar|april|apr|may|june|jun|july|jul|august|aug|september|sept|sep|october|oct|november|nov|december|dec";
    let weekday = "monday|tuesday|wednesday|thursday|friday|saturday|sunday";
    Regex::new(&format!(
        r"\b(?:today|tonight|tomorrow|yesterday|(?:(?:next|this)\s+)?(?:{weekday})|in\s+\d+\s+(?:days?|weeks?)|\d{{4}}-\d{{2}}-\d{{2}}|(?:{month})\s+\d{{1,2}}(?:st|nd|rd|th)?(?:,?\s+\d{{4}})?|\d{{1,2}}(?:st|nd|rd|th)?\s+(?:{month})(?:\s+\d{{4}})?|\d{{1,2}}/\d{{1,2}}(?:/\d{{4}})?)\b"
    ))
    .expect("Invalid date regex pattern")
});

static TIME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:(?P<h12>\d{1,2})(?::(?P<m12>\d{2}))?\s*(?P<ampm>am|pm)|(?P<h24>[01]?\d|2[0-3]):(?P<m24>[0-5]\d)|(?P<word>noon|midday|midnight))\b",
    )
    .expect("Invalid time regex pattern")
});

/// Parsed, unsaved quick-add input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub title: String,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
}

impl Draft {
    /// Decide the day a draft lands on before it is persisted
    ///
    /// In the week view an unscheduled draft goes to today's weekday of the
    /// viewed week. Elsewhere only a time-without-date gets a day (today).
    pub fn placed(mut self, params: &ViewParams, today: NaiveDate) -> Self {
        if self.date.is_none() {
            if params.mode == ViewMode::Week && params.query().is_none() {
                self.date = Some(today_key_in_week(params.week_offset, today).date());
            } else if self.time.is_some() {
                self.date = Some(today);
            }
        }
        self
    }

    /// Creation fields for the persistence collaborator
    pub fn into_new_task(self, user_id: UserId) -> Result<NewTask> {
        let date = self.date;
        // A time only means something together with a day
        let time = self.time.filter(|_| date.is_some());
        Ok(NewTask::new(&self.title, user_id)?.with_schedule(date, time))
    }
}

/// Parse quick-add text, `None` for blank input
pub fn parse_draft(text: &str, today: NaiveDate) -> Option<Draft> {
    let title = text.trim();
    if title.is_empty() {
        return None;
    }

    let lowered = title.to_lowercase();
    let date = extract_date(&lowered, today);
    let time = extract_time(&lowered);
    debug!(?date, ?time, "parsed quick-add draft");

    Some(Draft {
        title: title.to_string(),
        date,
        time,
    })
}

fn extract_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    DATE_REGEX
        .find_iter(text)
        .find_map(|m| parse_date(m.as_str(), today).ok())
}

fn extract_time(text: &str) -> Option<NaiveTime> {
    TIME_REGEX.captures_iter(text).find_map(|caps| time_from(&caps))
}

fn time_from(caps: &Captures<'_>) -> Option<NaiveTime> {
    let number = |name: &str| caps.name(name).and_then(|m| m.as_str().parse::<u32>().ok());

    if let Some(word) = caps.name("word") {
        let hour = if word.as_str() == "midnight" { 0 } else { 12 };
        return NaiveTime::from_hms_opt(hour, 0, 0);
    }

    if let Some(hour) = number("h24") {
        return NaiveTime::from_hms_opt(hour, number("m24")?, 0);
    }

    let hour = number("h12")?;
    let minute = number("m12").unwrap_or(0);
    if !(1..=12).contains(&hour) {
        return None;
    }
    let hour = match caps.name("ampm")?.as_str() {
        "am" => hour % 12,
        _ => hour % 12 + 12,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Keys the quick-add box reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftKey {
    Enter,
    Escape,
    Other,
}

/// What the quick-add box asks its host to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftEvent {
    Commit(Draft),
    Cancel,
    Ignored,
}

/// Live state of the quick-add box
#[derive(Debug, Clone, Default)]
pub struct DraftInput {
    text: String,
    preview: Option<Draft>,
}

impl DraftInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the buffer and refresh the preview parse
    pub fn set_text(&mut self, text: impl Into<String>, today: NaiveDate) {
        self.text = text.into();
        self.preview = parse_draft(&self.text, today);
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The parse a commit would produce right now
    pub fn preview(&self) -> Option<&Draft> {
        self.preview.as_ref()
    }

    /// Put a rejected draft back so the user can retry
    pub fn restore(&mut self, draft: Draft) {
        self.text = draft.title.clone();
        self.preview = Some(draft);
    }

    /// Enter commits the current parse, Escape cancels
    pub fn handle_key(&mut self, key: DraftKey) -> DraftEvent {
        match key {
            DraftKey::Enter => match self.preview.take() {
                Some(draft) => {
                    self.text.clear();
                    DraftEvent::Commit(draft)
                }
                // Blank input: nothing to submit
                None => DraftEvent::Ignored,
            },
            DraftKey::Escape => {
                self.text.clear();
                self.preview = None;
                DraftEvent::Cancel
            }
            DraftKey::Other => DraftEvent::Ignored,
        }
    }
}
