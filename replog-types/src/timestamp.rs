//! Wall-clock timestamps.
//!
//! Physical time is only ever an informational hint on an event. Causal
//! ordering is carried entirely by [`VectorClock`](crate::VectorClock).

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current wall-clock time in milliseconds since the Unix epoch.
///
/// A system clock set before the epoch reads as 0.
#[must_use]
pub fn system_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
