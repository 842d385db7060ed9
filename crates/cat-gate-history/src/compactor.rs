// SPDX-License-Identifier: Apache-2.0
//! The background history compactor (C7).

use crate::RemovalHistory;
use std::time::{Duration, Instant};
use tracing::debug;

/// Periodically evicts stale entries from a [`RemovalHistory`].
///
/// Intended to run as its own `tokio` task under leader election, matching
/// the one-task-per-concern layout the controller's manager bootstrap uses
/// for the reconciler pool, the admission server, and this compactor.
pub struct Compactor {
    history: RemovalHistory,
    gc_interval: Duration,
    retention: Duration,
}

impl Compactor {
    /// Builds a compactor over `history` that sweeps every `gc_interval` and
    /// evicts entries older than `retention`.
    pub fn new(history: RemovalHistory, gc_interval: Duration, retention: Duration) -> Self {
        Self {
            history,
            gc_interval,
            retention,
        }
    }

    /// Runs a single eviction sweep against the current instant. Exposed
    /// separately from [`Compactor::run`] so it can be exercised without a
    /// `tokio::time::interval`.
    pub fn sweep_once(&self) -> usize {
        let evicted = self.history.evict_older_than(Instant::now(), self.retention);
        if evicted > 0 {
            debug!(evicted, "compacted removal-history entries");
        }
        evicted
    }

    /// Runs the compaction loop until `shutdown` resolves. Tolerates
    /// concurrent writers to `history`; it is the sole source of deletions
    /// (§4.7).
    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.gc_interval);
        // The first tick fires immediately; skip it so the compactor's
        // first real sweep happens a full interval after startup.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once();
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}
