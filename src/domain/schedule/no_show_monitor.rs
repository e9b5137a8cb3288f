use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::no_show_rule::{report_grace, NoShowRule, Occurrence};
use crate::core::state::window::windowed_state_store::WindowedStateStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoShowAlert {
    pub entity_key: String,
    pub check_time: String,
    pub message: String,
}

#[derive(Debug, Default)]
struct Ledger {
    /// Occurrences where the expected activity was seen
    satisfied: HashSet<(usize, NaiveDate)>,
    /// Occurrences already reported as no-shows
    reported: HashSet<(usize, NaiveDate)>,
}

impl Ledger {
    fn prune(&mut self, before: NaiveDate) {
        self.satisfied.retain(|(_, d)| *d >= before);
        self.reported.retain(|(_, d)| *d >= before);
    }
}

/// Checks scheduled expectations against the observation windows.
///
/// Activity is looked for on every check while an occurrence is running, since the
/// window only retains the last few minutes. An occurrence that ends without it is
/// reported once.
pub struct NoShowMonitor {
    rules: Vec<NoShowRule>,
    store: Arc<WindowedStateStore>,
    offset: FixedOffset,
    ledger: Mutex<Ledger>,
}

impl NoShowMonitor {
    pub fn new(rules: Vec<NoShowRule>, store: Arc<WindowedStateStore>) -> Self {
        let offset = store.reference_offset();
        Self {
            rules,
            store,
            offset,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    pub fn rules(&self) -> &[NoShowRule] {
        &self.rules
    }

    pub fn check(&self, now: DateTime<Utc>) -> Vec<NoShowAlert> {
        let local = now.with_timezone(&self.offset).naive_local();
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        let mut alerts = Vec::new();

        for (idx, rule) in self.rules.iter().enumerate() {
            let Some(occ) = rule.latest_occurrence(local) else {
                continue;
            };
            let id = (idx, occ.date);
            if ledger.satisfied.contains(&id) || ledger.reported.contains(&id) {
                continue;
            }

            if self.activity_within(rule, &occ) {
                debug!(entity_key = %rule.entity_key, check_time = %rule.check_time(), "Expected activity seen");
                ledger.satisfied.insert(id);
                continue;
            }

            if local > occ.end && local - occ.end <= report_grace() {
                let alert = NoShowAlert {
                    entity_key: rule.entity_key.clone(),
                    check_time: rule.check_time(),
                    message: format!(
                        "No {} detected for {} between {} and {}",
                        rule.expected_phrases.join(" / "),
                        rule.entity_key,
                        rule.start.format("%H:%M"),
                        rule.end.format("%H:%M"),
                    ),
                };
                info!(entity_key = %alert.entity_key, check_time = %alert.check_time, "No-show detected");
                ledger.reported.insert(id);
                alerts.push(alert);
            }
        }

        ledger.prune(local.date() - Duration::days(2));
        alerts
    }

    fn activity_within(&self, rule: &NoShowRule, occ: &Occurrence) -> bool {
        let to_utc = |local: NaiveDateTime| {
            self.offset
                .from_local_datetime(&local)
                .single()
                .map(|ts| ts.with_timezone(&Utc))
        };
        let (Some(since), Some(until)) = (to_utc(occ.start), to_utc(occ.end)) else {
            return false;
        };

        self.store
            .with_window(&rule.entity_key, |w| {
                w.entries().iter().any(|o| {
                    o.timestamp >= since && o.timestamp <= until && rule.matches(&o.state_label)
                })
            })
            .unwrap_or(false)
    }
}
