//! Causal event model for replog.
//!
//! This crate defines the value types every other replog crate builds on:
//! - Log, emitter, aggregate and request identifiers
//! - [`VectorClock`] causal timestamps
//! - [`DurableEvent`], the immutable causally stamped envelope
//! - [`ReplicationFilter`], the application hook gating replication
//!
//! Nothing here performs I/O. Storage, delivery and replication are the
//! business of the event log (`replog-log`).

mod event;
pub mod filter;
mod ids;
mod timestamp;
mod vector_clock;

pub use event::{CausalId, DurableEvent, UNDEFINED_SEQUENCE_NR};
pub use filter::{AcceptAll, ReplicationFilter, ReplicationFilterExt};
pub use ids::{AggregateId, EmitterId, LogId, RequestId};
pub use timestamp::system_time_millis;
pub use vector_clock::{CausalOrder, VectorClock};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid identifier: {0}")]
    InvalidId(String),
}
