//! Timer snapshot save/restore with staleness and corruption guards.
//!
//! Restore fails closed: any entry that is unparseable, structurally
//! invalid, stale, or already spent after elapsed-time compensation is
//! deleted and reported as absent. Storage failures are logged and never
//! propagate into the timer engine.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::clock::Clock;

use super::store::SnapshotStore;

/// Persisted timer state. The field names are the external contract
/// (`{timeRemaining, totalTime, timestamp, isRunning, isPaused}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    /// Seconds left in the countdown.
    pub time_remaining: u64,
    /// Original allotted duration in seconds.
    pub total_time: u64,
    /// Epoch milliseconds at the time of the write.
    pub timestamp: u64,
    pub is_running: bool,
    pub is_paused: bool,
}

/// One timer's view of the snapshot store: a key, a clock and the
/// staleness limit.
pub struct PersistenceStore {
    store: Arc<dyn SnapshotStore>,
    key: String,
    clock: Arc<dyn Clock>,
    max_age_ms: u64,
    enabled: bool,
}

impl PersistenceStore {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        key: impl Into<String>,
        clock: Arc<dyn Clock>,
        max_age_ms: u64,
        enabled: bool,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            clock,
            max_age_ms,
            enabled,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Write a snapshot stamped with the current time. No-op when
    /// persistence is disabled; failures are logged, never raised.
    pub fn save(&self, mut snapshot: TimerSnapshot) {
        if !self.enabled {
            return;
        }
        snapshot.timestamp = self.clock.now_ms();
        let json = match serde_json::to_string(&snapshot) {
            Ok(json) => json,
            Err(e) => {
                error!(key = %self.key, error = %e, "failed to serialize timer snapshot");
                return;
            }
        };
        if let Err(e) = self.store.put(&self.key, &json) {
            error!(key = %self.key, error = %e, "failed to persist timer snapshot");
        } else {
            debug!(key = %self.key, remaining = snapshot.time_remaining, "timer snapshot saved");
        }
    }

    /// Read back the snapshot, compensating for wall-clock time elapsed
    /// while unloaded. Returns `None` (after deleting the entry) when the
    /// snapshot is corrupt, stale, or spent.
    pub fn restore(&self) -> Option<TimerSnapshot> {
        if !self.enabled {
            return None;
        }
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                error!(key = %self.key, error = %e, "failed to read timer snapshot");
                return None;
            }
        };

        let mut snapshot: TimerSnapshot = match serde_json::from_str(&raw) {
            Ok(s) => s,
            Err(e) => {
                warn!(key = %self.key, error = %e, "discarding unparseable timer snapshot");
                self.clear();
                return None;
            }
        };

        if snapshot.total_time == 0 {
            warn!(key = %self.key, "discarding timer snapshot with zero total time");
            self.clear();
            return None;
        }

        let now = self.clock.now_ms();
        let age_ms = now.saturating_sub(snapshot.timestamp);
        if age_ms > self.max_age_ms {
            warn!(key = %self.key, age_ms, "discarding stale timer snapshot");
            self.clear();
            return None;
        }

        // A running timer kept counting down while the page was unloaded.
        if snapshot.is_running && !snapshot.is_paused {
            let elapsed_secs = age_ms / 1000;
            snapshot.time_remaining = snapshot.time_remaining.saturating_sub(elapsed_secs);
        }

        if snapshot.time_remaining == 0 {
            warn!(key = %self.key, "discarding spent timer snapshot");
            self.clear();
            return None;
        }

        Some(snapshot)
    }

    /// Delete the persisted entry. Safe to call when none exists.
    pub fn clear(&self) {
        if let Err(e) = self.store.delete(&self.key) {
            error!(key = %self.key, error = %e, "failed to clear timer snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::store::MemoryStore;

    const DAY_MS: u64 = 24 * 60 * 60 * 1000;

    fn harness(now_ms: u64) -> (Arc<MemoryStore>, Arc<ManualClock>, PersistenceStore) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(now_ms));
        let persistence = PersistenceStore::new(
            store.clone(),
            "exam_timer:test",
            clock.clone(),
            DAY_MS,
            true,
        );
        (store, clock, persistence)
    }

    fn snapshot(remaining: u64, running: bool, paused: bool) -> TimerSnapshot {
        TimerSnapshot {
            time_remaining: remaining,
            total_time: 3600,
            timestamp: 0,
            is_running: running,
            is_paused: paused,
        }
    }

    #[test]
    fn save_then_restore_paused_is_lossless() {
        let (_, _, persistence) = harness(1_000_000);
        persistence.save(snapshot(1200, false, true));
        let restored = persistence.restore().unwrap();
        assert_eq!(restored.time_remaining, 1200);
        assert_eq!(restored.total_time, 3600);
        assert!(restored.is_paused);
    }

    #[test]
    fn running_snapshot_compensates_elapsed_time() {
        let (_, clock, persistence) = harness(1_000_000);
        persistence.save(snapshot(600, true, false));
        clock.advance_secs(90);
        let restored = persistence.restore().unwrap();
        assert_eq!(restored.time_remaining, 510);
    }

    #[test]
    fn paused_snapshot_skips_compensation() {
        let (_, clock, persistence) = harness(1_000_000);
        persistence.save(snapshot(600, true, true));
        clock.advance_secs(90);
        let restored = persistence.restore().unwrap();
        assert_eq!(restored.time_remaining, 600);
    }

    #[test]
    fn spent_snapshot_is_deleted_and_restore_is_idempotent() {
        let (store, clock, persistence) = harness(1_000_000);
        persistence.save(snapshot(60, true, false));
        clock.advance_secs(120);
        assert!(persistence.restore().is_none());
        assert!(store.is_empty());
        // Second call: still none, no further side effects.
        assert!(persistence.restore().is_none());
    }

    #[test]
    fn stale_snapshot_just_past_limit_is_rejected() {
        let (store, clock, persistence) = harness(10 * DAY_MS);
        persistence.save(snapshot(7200, true, true));
        clock.advance_ms(DAY_MS + 1000);
        assert!(persistence.restore().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn snapshot_just_inside_limit_is_accepted() {
        let (_, clock, persistence) = harness(10 * DAY_MS);
        // Large remaining so nearly a day of compensation leaves time over.
        persistence.save(TimerSnapshot {
            time_remaining: 2 * DAY_MS / 1000,
            total_time: 2 * DAY_MS / 1000,
            timestamp: 0,
            is_running: true,
            is_paused: false,
        });
        clock.advance_ms(DAY_MS - 1000);
        let restored = persistence.restore().unwrap();
        assert_eq!(
            restored.time_remaining,
            2 * DAY_MS / 1000 - (DAY_MS - 1000) / 1000
        );
    }

    #[test]
    fn corrupt_entry_is_deleted() {
        let (store, _, persistence) = harness(1_000_000);
        store.put("exam_timer:test", "not json at all").unwrap();
        assert!(persistence.restore().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn entry_missing_required_fields_is_deleted() {
        let (store, _, persistence) = harness(1_000_000);
        store
            .put("exam_timer:test", r#"{"timeRemaining": 100}"#)
            .unwrap();
        assert!(persistence.restore().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn zero_total_time_is_rejected() {
        let (store, _, persistence) = harness(1_000_000);
        store
            .put(
                "exam_timer:test",
                r#"{"timeRemaining":10,"totalTime":0,"timestamp":1000000,"isRunning":false,"isPaused":true}"#,
            )
            .unwrap();
        assert!(persistence.restore().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn disabled_persistence_never_touches_the_store() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(1_000_000));
        let persistence =
            PersistenceStore::new(store.clone(), "exam_timer:test", clock, DAY_MS, false);
        persistence.save(snapshot(600, true, false));
        assert!(store.is_empty());
        assert!(persistence.restore().is_none());
    }

    #[test]
    fn external_field_names_are_camel_case() {
        let (store, _, persistence) = harness(1_000_000);
        persistence.save(snapshot(600, true, false));
        let raw = store.get("exam_timer:test").unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["timeRemaining"], 600);
        assert_eq!(json["totalTime"], 3600);
        assert_eq!(json["timestamp"], 1_000_000);
        assert_eq!(json["isRunning"], true);
        assert_eq!(json["isPaused"], false);
    }
}
