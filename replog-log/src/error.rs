//! Error types for the event log.

use replog_types::LogId;
use thiserror::Error;

/// Result type for event log operations.
pub type LogResult<T> = Result<T, LogError>;

/// Errors that can occur in event log operations.
#[derive(Debug, Clone, Error)]
pub enum LogError {
    /// The log cannot hold any more events.
    #[error("log {log_id} is full ({capacity} events)")]
    CapacityExceeded { log_id: LogId, capacity: usize },

    /// The log has been closed and accepts no further writes or subscribers.
    #[error("log {0} is closed")]
    Closed(LogId),

    /// The event cannot be stored in its current form.
    #[error("invalid event: {0}")]
    InvalidEvent(String),
}
