//! Error types for recurrence-engine operations.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecurrenceError {
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, RecurrenceError>;
