//! Error types for CRDT services.

use replog_log::LogError;
use thiserror::Error;

/// Result type for CRDT operations.
pub type CrdtResult<T> = Result<T, CrdtError>;

/// Errors that can occur in CRDT operations.
#[derive(Debug, Clone, Error)]
pub enum CrdtError {
    /// The operation was rejected by the CRDT's update function.
    /// Only the request carrying it fails; state is unchanged.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The event log could not record the operation.
    #[error("append failed: {0}")]
    AppendFailed(#[from] LogError),

    /// The service's owner task is no longer running.
    #[error("CRDT service stopped")]
    ServiceStopped,
}
