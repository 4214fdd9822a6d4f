//! Event log for replog.
//!
//! # Architecture
//!
//! - **Log**: the [`EventLog`] contract every backend implements
//! - **Memory**: [`InMemoryEventLog`], a reference backend without durability
//! - **Replication**: [`Replicator`], which ships causally novel,
//!   filter-accepted events between logs
//!
//! ## Event flow
//!
//! 1. An emitter appends an unprepared [`DurableEvent`](replog_types::DurableEvent)
//! 2. The log stamps causal identity and physical coordinates (`prepare`)
//! 3. The stored event is delivered to every subscriber it routes to,
//!    including the writer itself
//! 4. Replication copies it to other logs, which re-stamp only the
//!    physical coordinates
//!
//! # Example
//!
//! ```
//! use replog_log::{EventLogConfig, InMemoryEventLog, ReplicationConfig, Replicator};
//! use replog_types::LogId;
//!
//! let log: InMemoryEventLog<String> = InMemoryEventLog::with_config(
//!     LogId::from("L1"),
//!     EventLogConfig {
//!         capacity: Some(10_000),
//!     },
//! );
//! let replicator = Replicator::with_config(ReplicationConfig { batch_size: 128 });
//! assert_eq!(replicator.progress(&LogId::from("L1"), &LogId::from("L2")), 1);
//! # let _ = log;
//! ```

mod error;
mod event_log;
mod memory;
pub mod replication;

pub use error::{LogError, LogResult};
pub use event_log::{EventLog, EventStream};
pub use memory::{EventLogConfig, InMemoryEventLog};
pub use replication::{ReplicationConfig, ReplicationReport, Replicator};
