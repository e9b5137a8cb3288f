use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use dashmap::DashMap;
use tracing::trace;

use super::timestamp::RawTimestamp;
use crate::errors::CoreError;

pub const DEFAULT_RETENTION_SECS: i64 = 15 * 60;
pub const DEFAULT_CAPACITY: usize = 900;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub entity_key: String,
    pub state_label: String,
    pub timestamp: DateTime<Utc>,
}

/// Arrival-ordered observations for one entity key.
#[derive(Debug, Default, Clone)]
pub struct Window {
    entries: VecDeque<Observation>,
}

impl Window {
    pub fn entries(&self) -> &VecDeque<Observation> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recently recorded (by arrival) observation.
    pub fn latest(&self) -> Option<&Observation> {
        self.entries.back()
    }

    /// Age is measured from the incoming timestamp, so a stray future-dated entry
    /// never pushes out the observations that follow it.
    fn push(&mut self, obs: Observation, retention: Duration, capacity: usize) -> usize {
        let cutoff = obs.timestamp.checked_sub_signed(retention);
        self.entries.push_back(obs);

        let before = self.entries.len();

        // Arrival order is not timestamp order, so stale entries can sit behind fresh ones.
        if let Some(cutoff) = cutoff {
            self.entries.retain(|o| o.timestamp >= cutoff);
        }

        while self.entries.len() > capacity {
            self.entries.pop_front();
        }

        before - self.entries.len()
    }
}

/// Per-entity trailing window of raw state observations.
///
/// Each key has its own lock; recording for one camera never waits on another.
#[derive(Debug)]
pub struct WindowedStateStore {
    windows: DashMap<String, Arc<Mutex<Window>>>,
    retention: Duration,
    capacity: usize,
    reference_offset: FixedOffset,
}

impl Default for WindowedStateStore {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_RETENTION_SECS), DEFAULT_CAPACITY)
    }
}

impl WindowedStateStore {
    pub fn new(retention: Duration, capacity: usize) -> Self {
        Self {
            windows: DashMap::new(),
            retention,
            capacity: capacity.max(1),
            reference_offset: Utc.fix(),
        }
    }

    pub fn with_reference_offset(mut self, offset: FixedOffset) -> Self {
        self.reference_offset = offset;
        self
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn reference_offset(&self) -> FixedOffset {
        self.reference_offset
    }

    fn slot(&self, entity_key: &str) -> Arc<Mutex<Window>> {
        if let Some(existing) = self.windows.get(entity_key) {
            return existing.clone();
        }
        self.windows
            .entry(entity_key.to_string())
            .or_default()
            .clone()
    }

    /// Appends an observation and evicts stale / excess entries for that key.
    pub fn record(&self, entity_key: &str, state_label: &str, timestamp: DateTime<Utc>) {
        let slot = self.slot(entity_key);
        let mut window = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let evicted = window.push(
            Observation {
                entity_key: entity_key.to_string(),
                state_label: state_label.to_string(),
                timestamp,
            },
            self.retention,
            self.capacity,
        );

        if evicted > 0 {
            trace!(entity_key, evicted, retained = window.len(), "Evicted stale observations");
        }
    }

    /// Normalizes a collaborator timestamp to UTC before recording it.
    pub fn record_raw(
        &self,
        entity_key: &str,
        state_label: &str,
        timestamp: RawTimestamp,
    ) -> Result<DateTime<Utc>, CoreError> {
        let ts = timestamp.normalize(&self.reference_offset)?;
        self.record(entity_key, state_label, ts);
        Ok(ts)
    }

    /// Runs `f` against the entity's window under its lock. `None` for unseen keys.
    pub fn with_window<T>(&self, entity_key: &str, f: impl FnOnce(&Window) -> T) -> Option<T> {
        let slot = self.windows.get(entity_key)?.clone();
        let window = slot.lock().unwrap_or_else(PoisonError::into_inner);
        Some(f(&window))
    }

    pub fn snapshot(&self, entity_key: &str) -> Vec<Observation> {
        self.with_window(entity_key, |w| w.entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn entity_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.windows.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn evicts_entries_older_than_retention() {
        let store = WindowedStateStore::new(Duration::minutes(15), 900);
        store.record("Hall 8", "quiet", t0());
        store.record("Hall 8", "busy", t0() + Duration::minutes(10));
        store.record("Hall 8", "busy", t0() + Duration::minutes(16));

        let labels: Vec<_> = store
            .snapshot("Hall 8")
            .into_iter()
            .map(|o| o.state_label)
            .collect();
        assert_eq!(labels, vec!["busy", "busy"]);
    }

    #[test]
    fn entry_exactly_at_retention_is_kept() {
        let store = WindowedStateStore::new(Duration::minutes(15), 900);
        store.record("Kitchen", "quiet", t0());
        store.record("Kitchen", "quiet", t0() + Duration::minutes(15));
        assert_eq!(store.snapshot("Kitchen").len(), 2);
    }

    #[test]
    fn capacity_is_a_hard_cap() {
        let store = WindowedStateStore::new(Duration::minutes(15), 5);
        for i in 0..12 {
            store.record("Stage", &format!("state {i}"), t0() + Duration::seconds(i));
        }
        let snap = store.snapshot("Stage");
        assert_eq!(snap.len(), 5);
        assert_eq!(snap[0].state_label, "state 7");
        assert_eq!(snap[4].state_label, "state 11");
    }

    #[test]
    fn late_arrival_is_evicted_by_the_next_fresh_record() {
        let store = WindowedStateStore::new(Duration::minutes(15), 900);
        store.record("Field", "busy", t0() + Duration::minutes(30));
        store.record("Field", "quiet", t0());
        store.record("Field", "busy", t0() + Duration::minutes(20));

        let labels: Vec<_> = store
            .snapshot("Field")
            .into_iter()
            .map(|o| o.state_label)
            .collect();
        assert_eq!(labels, vec!["busy", "busy"]);
    }

    #[test]
    fn future_dated_entry_does_not_evict_current_observations() {
        let store = WindowedStateStore::new(Duration::minutes(15), 900);
        store.record("Field", "quiet", t0() + Duration::days(365));
        for i in 0..5 {
            store.record("Field", "crowd gathering", t0() + Duration::seconds(i));
        }

        let snap = store.snapshot("Field");
        assert_eq!(snap.len(), 6);
        assert_eq!(
            snap.iter().filter(|o| o.state_label == "crowd gathering").count(),
            5
        );
    }

    #[test]
    fn timestamp_at_chrono_minimum_is_recorded_without_overflow() {
        let store = WindowedStateStore::new(Duration::minutes(15), 900);
        store.record("Field", "quiet", DateTime::<Utc>::MIN_UTC);
        store.record("Field", "busy", DateTime::<Utc>::MIN_UTC + Duration::seconds(5));
        assert_eq!(store.snapshot("Field").len(), 2);
    }

    #[test]
    fn window_bounds_hold_for_irregular_sequences() {
        let store = WindowedStateStore::new(Duration::minutes(15), 50);
        let offsets = [0i64, 7, 3, 200, 199, 950, 951, 30, 2000, 1990, 1500, 2100];
        for round in 0..10 {
            for (i, off) in offsets.iter().enumerate() {
                let ts = t0() + Duration::seconds(off + round * 97 + i as i64);
                store.record("Walkway", "person present", ts);

                let snap = store.snapshot("Walkway");
                assert!(snap.len() <= 50);
                assert!(snap
                    .iter()
                    .all(|o| ts - o.timestamp <= store.retention()));
            }
        }
    }

    #[test]
    fn naive_timestamps_are_normalized_before_recording() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let store = WindowedStateStore::default().with_reference_offset(offset);
        let raw = RawTimestamp::parse("2024-05-01 14:00:00").unwrap();

        let recorded = store.record_raw("Temple", "quiet", raw).unwrap();
        assert_eq!(recorded, t0());
        assert_eq!(store.snapshot("Temple")[0].timestamp, t0());
    }

    #[test]
    fn unseen_key_has_no_window() {
        let store = WindowedStateStore::default();
        assert!(store.with_window("nowhere", |w| w.len()).is_none());
        assert!(store.snapshot("nowhere").is_empty());
    }

    #[test]
    fn concurrent_records_on_distinct_keys() {
        let store = Arc::new(WindowedStateStore::new(Duration::minutes(15), 900));
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        store.record(&format!("cam {n}"), "busy", t0() + Duration::seconds(i));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.entity_keys().len(), 8);
        assert!(store
            .entity_keys()
            .iter()
            .all(|k| store.snapshot(k).len() == 100));
    }
}
