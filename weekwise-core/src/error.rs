//! Core error types for Weekwise domain logic
//!
//! These errors represent domain-level failures, not I/O or persistence errors.

use thiserror::Error;

use crate::task::TaskId;

/// Core domain errors
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Task {0} not found")]
    TaskNotFound(TaskId),

    #[error("Task id prefix '{prefix}' matches {matches} tasks")]
    AmbiguousId { prefix: String, matches: usize },

    #[error("Parse error: {message}")]
    Parse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },
}

impl CoreError {
    /// Create a parse error with a message
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            source: None,
        }
    }

    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether this error was raised before any collaborator was involved
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::Parse { .. })
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
