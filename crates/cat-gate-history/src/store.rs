// SPDX-License-Identifier: Apache-2.0
//! The removal-history map itself (C6).

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;

/// Mapping from image-set fingerprint to the wall-clock instant at which the
/// reconciler last removed a gate for that fingerprint.
///
/// Entries are advisory only (invariant 4 of the design doc): write-only at
/// reconcile Step 7, read-only at Step 3, and deleted solely by
/// [`crate::Compactor`]. No ordering is guaranteed between writers for the
/// same key — last write wins, which is fine because the value is only ever
/// used as a lower bound on "how recent".
#[derive(Debug, Clone, Default)]
pub struct RemovalHistory {
    entries: Arc<DashMap<String, Instant>>,
}

impl RemovalHistory {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `now` as the most recent removal instant for `fingerprint`,
    /// overwriting any prior entry.
    pub fn record_removal(&self, fingerprint: &str, now: Instant) {
        self.entries.insert(fingerprint.to_string(), now);
    }

    /// Returns the instant of the most recent removal for `fingerprint`, if
    /// any entry exists.
    pub fn last_removal(&self, fingerprint: &str) -> Option<Instant> {
        self.entries.get(fingerprint).map(|entry| *entry)
    }

    /// Number of entries currently tracked. Exposed for the compactor and
    /// for tests; not part of the reconcile decision.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True iff no entries are tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry whose last-removal instant is older than
    /// `retention`, relative to `now`. Returns the number of entries
    /// evicted. Called by [`crate::Compactor`]; exposed so it can be unit
    /// tested as a single sweep without a running timer.
    pub fn evict_older_than(&self, now: Instant, retention: std::time::Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_fingerprint, instant| now.saturating_duration_since(*instant) <= retention);
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::time::Duration;

    #[test]
    fn last_write_wins_for_the_same_fingerprint() {
        let history = RemovalHistory::new();
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(5);
        history.record_removal("fp", t0);
        history.record_removal("fp", t1);
        assert_eq!(history.last_removal("fp"), Some(t1));
    }

    #[test]
    fn missing_fingerprint_has_no_history() {
        let history = RemovalHistory::new();
        assert_eq!(history.last_removal("unknown"), None);
    }

    #[test]
    fn evict_older_than_removes_only_stale_entries() {
        let history = RemovalHistory::new();
        // Back-dating relative to `Instant::now()` risks underflow panics on
        // short-lived monotonic clocks (e.g. sandboxed CI), so anchor the
        // "old" instant far enough in the future instead and treat it as the
        // reference point.
        let old = Instant::now();
        let fresh = old + Duration::from_secs(47 * 3600);
        let now = old + Duration::from_secs(48 * 3600);
        history.record_removal("stale", old);
        history.record_removal("fresh", fresh);

        let evicted = history.evict_older_than(now, Duration::from_secs(24 * 3600));

        assert_eq!(evicted, 1);
        assert_eq!(history.len(), 1);
        assert!(history.last_removal("fresh").is_some());
        assert!(history.last_removal("stale").is_none());
    }
}
