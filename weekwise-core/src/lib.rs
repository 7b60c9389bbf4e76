//! Weekwise Core - Pure view composition logic for the weekly planner
//!
//! This crate contains no I/O operations. Persistence, identity and
//! the mutation reconciler live in the `weekwise` crate.

pub mod calendar;
pub mod draft;
pub mod edit;
pub mod error;
pub mod query;
pub mod task;
pub mod view;

pub use calendar::{DayKey, WeekDay, WeekWindow};
pub use draft::{Draft, DraftEvent, DraftInput, DraftKey, parse_draft};
pub use edit::{DropEvent, EditForm};
pub use error::{CoreError, Result};
pub use query::{SortKey, ViewMode, ViewParams, project, project_week};
pub use task::{NewTask, Task, TaskId, TaskIndex, TaskPatch, UserId};
pub use view::{DayColumn, Projection, ViewKind, compose, select_view};
