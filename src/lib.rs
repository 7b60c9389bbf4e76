//! Weekwise - a weekly task planner
//!
//! View composition lives in `weekwise-core`. This crate adds the
//! persistence and identity collaborators, the mutation reconciler,
//! global shortcuts and the terminal front end.

pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod reconciler;
pub mod session;
pub mod shortcuts;
pub mod store;

pub use config::Config;
pub use error::{AppError, Result};
pub use reconciler::{MutationState, ReconcileError, Reconciler, Rejected, Settled};
pub use session::{ConfiguredSession, Session};
pub use store::{JsonFileStore, StoreError, TaskStore};
