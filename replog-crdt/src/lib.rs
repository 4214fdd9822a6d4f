//! Operation-based CRDT services for replog.
//!
//! A service keeps replicated data types consistent across sites by routing
//! every operation through an event log:
//!
//! 1. [`CrdtService::update`] appends the operation as an event whose
//!    emitter aggregate id is the target identifier
//! 2. The log stamps it and delivers it back, together with events
//!    replicated from other sites
//! 3. Every delivered operation is folded into the identifier's state with
//!    [`CrdtServiceOps::update`], in delivery order
//! 4. The client request resolves with the value observed right after its
//!    own operation was folded
//!
//! The fold is where variants differ: [`CounterOps`] adds deltas,
//! [`LwwRegisterOps`] keeps the last writer.
//!
//! # Example
//!
//! ```no_run
//! use replog_crdt::{CounterOps, CounterService, CrdtServiceConfig};
//! use replog_log::InMemoryEventLog;
//! use replog_types::{AggregateId, LogId};
//! use std::sync::Arc;
//!
//! # async fn run() -> replog_crdt::CrdtResult<()> {
//! let log: Arc<InMemoryEventLog<i64>> = Arc::new(InMemoryEventLog::new(LogId::from("L1")));
//! let counters: CounterService<i64> =
//!     CounterService::start(CounterOps::new(), log, CrdtServiceConfig::default()).await?;
//!
//! let id = AggregateId::from("visits");
//! counters.increment(id.clone(), 5).await?;
//! assert_eq!(counters.value(&id), 5);
//! # Ok(())
//! # }
//! ```

mod counter;
mod error;
mod lww_register;
mod ops;
mod service;

pub use counter::{Additive, CounterOps, CounterService};
pub use error::{CrdtError, CrdtResult};
pub use lww_register::{LwwOperation, LwwRegisterOps, LwwRegisterService, Versioned};
pub use ops::CrdtServiceOps;
pub use service::{CrdtService, CrdtServiceConfig, DEFAULT_COMMAND_BUFFER};
