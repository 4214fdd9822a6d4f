//! Replication between event logs.
//!
//! A sweep reads the source log in batches and ships every event that is
//! [`replicable`](replog_types::DurableEvent::replicable) to the target:
//! causally novel with respect to the target's current version and accepted
//! by the application's filter. The replicator remembers how far it has
//! scanned each (source, target) pair, so repeated sweeps only look at new
//! source events.

use crate::error::LogResult;
use crate::memory::InMemoryEventLog;
use crate::EventLog;
use replog_types::{LogId, ReplicationFilter};
use std::collections::HashMap;
use tracing::{debug, info};

/// Default number of source events read per batch.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Configuration for replication sweeps.
#[derive(Debug, Clone)]
pub struct ReplicationConfig {
    /// Maximum events read from the source per batch.
    pub batch_size: usize,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Outcome of one replication sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplicationReport {
    /// Source events examined.
    pub scanned: usize,
    /// Events written to the target.
    pub shipped: usize,
    /// Events held back: already known to the target or rejected by the filter.
    pub skipped: usize,
}

/// Drives replication sweeps between in-memory logs.
#[derive(Debug, Default)]
pub struct Replicator {
    config: ReplicationConfig,
    /// Next source sequence number to scan, per (source, target) pair.
    progress: HashMap<(LogId, LogId), u64>,
}

impl Replicator {
    /// Creates a replicator with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ReplicationConfig::default())
    }

    /// Creates a replicator with a custom configuration.
    pub fn with_config(config: ReplicationConfig) -> Self {
        Self {
            config,
            progress: HashMap::new(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// Returns the next source sequence number a sweep from `source` to
    /// `target` will scan.
    pub fn progress(&self, source: &LogId, target: &LogId) -> u64 {
        self.progress
            .get(&(source.clone(), target.clone()))
            .copied()
            .unwrap_or(1)
    }

    /// Ships every replicable event from `source` to `target`.
    pub async fn replicate<P, F>(
        &mut self,
        source: &InMemoryEventLog<P>,
        target: &InMemoryEventLog<P>,
        filter: &F,
    ) -> LogResult<ReplicationReport>
    where
        P: Clone + Send + Sync + 'static,
        F: ReplicationFilter<P> + ?Sized,
    {
        let key = (source.log_id().clone(), target.log_id().clone());
        let mut from = self.progress.get(&key).copied().unwrap_or(1);
        let mut report = ReplicationReport::default();

        loop {
            let batch = source.read(from, self.config.batch_size.max(1)).await;
            let Some(last) = batch.last() else {
                break;
            };
            let next_from = last.local_sequence_nr() + 1;

            let target_version = target.version().await;
            let candidates: Vec<_> = batch
                .iter()
                .filter(|event| event.replicable(&target_version, filter))
                .cloned()
                .collect();
            let written = target.write_replicated(candidates).await?;

            report.scanned += batch.len();
            report.shipped += written.len();
            report.skipped += batch.len() - written.len();
            debug!(
                "Replication {} -> {}: batch from #{} shipped {}/{}",
                key.0,
                key.1,
                from,
                written.len(),
                batch.len()
            );

            from = next_from;
            self.progress.insert(key.clone(), from);
        }

        if report.shipped > 0 {
            info!(
                "Replicated {} events {} -> {} ({} skipped)",
                report.shipped, key.0, key.1, report.skipped
            );
        }
        Ok(report)
    }
}
