use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::facility_message::{AlertRecord, FacilityMessage, FacilityResult};
use crate::core::clock::Clock;
use crate::core::state::alerts::alert_coordinator::AlertCoordinator;
use crate::core::state::window::timestamp::RawTimestamp;
use crate::core::state::window::windowed_state_store::WindowedStateStore;
use crate::domain::aggregation::state_aggregator::StateAggregator;
use crate::domain::alert::alert_classifier::AlertClassifier;
use crate::errors::CoreError;

pub const DEFAULT_FACILITY_KEY: &str = "facility";

/// Runs one decoded message through windowing, aggregation and alert evaluation.
pub struct FacilityStateProcessor {
    store: Arc<WindowedStateStore>,
    aggregator: StateAggregator,
    classifier: Arc<AlertClassifier>,
    alerts: Arc<AlertCoordinator>,
    clock: Arc<dyn Clock>,
    facility_key: String,
}

impl FacilityStateProcessor {
    pub fn new(
        store: Arc<WindowedStateStore>,
        aggregator: StateAggregator,
        classifier: Arc<AlertClassifier>,
        alerts: Arc<AlertCoordinator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            aggregator,
            classifier,
            alerts,
            clock,
            facility_key: DEFAULT_FACILITY_KEY.to_string(),
        }
    }

    pub fn with_facility_key(mut self, key: impl Into<String>) -> Self {
        self.facility_key = key.into();
        self
    }

    pub fn facility_key(&self) -> &str {
        &self.facility_key
    }

    pub fn store(&self) -> &Arc<WindowedStateStore> {
        &self.store
    }

    pub fn alerts(&self) -> &Arc<AlertCoordinator> {
        &self.alerts
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Decodes and processes a raw message. Never fails: bad input becomes an empty
    /// result with a diagnostic.
    pub fn process(&self, raw: &str) -> FacilityResult {
        let outcome = FacilityMessage::parse(raw).and_then(|msg| {
            let now = self.clock.now();
            self.process_message(msg, now)
        });

        match outcome {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "Discarding facility message");
                FacilityResult::empty(&err)
            }
        }
    }

    /// Processes an already-decoded message observed at `now` unless it carries its
    /// own timestamp.
    pub fn process_message(
        &self,
        msg: FacilityMessage,
        now: DateTime<Utc>,
    ) -> Result<FacilityResult, CoreError> {
        let observed_at = match msg.timestamp.as_deref() {
            Some(raw) => RawTimestamp::parse(raw)?.normalize(&self.store.reference_offset())?,
            None => now,
        };

        let mut camera_states = BTreeMap::new();
        let mut alerts = Vec::new();

        for (camera, label) in &msg.camera_states {
            if camera == &self.facility_key {
                warn!(camera = %camera, "Camera key collides with facility key; skipped");
                continue;
            }
            let dominant = self.observe(camera, label, observed_at, &mut alerts);
            camera_states.insert(camera.clone(), dominant);
        }

        let facility_state =
            self.observe(&self.facility_key, &msg.facility_state, observed_at, &mut alerts);

        if !alerts.is_empty() {
            info!(count = alerts.len(), facility_state = %facility_state, "Alert transitions produced");
        }

        Ok(FacilityResult {
            facility_state,
            camera_states,
            alerts,
            diagnostic: None,
        })
    }

    fn observe(
        &self,
        entity_key: &str,
        label: &str,
        at: DateTime<Utc>,
        alerts: &mut Vec<AlertRecord>,
    ) -> String {
        let label = label.trim();
        if !label.is_empty() {
            self.store.record(entity_key, label, at);
        }

        let dominant = self.aggregator.dominant_state(&self.store, entity_key);
        let is_alerting = self.classifier.is_alerting(entity_key, &dominant);
        debug!(entity_key, dominant = %dominant, is_alerting, "Aggregated state");

        if let Some(event) = self.alerts.update_state(entity_key, is_alerting, at) {
            alerts.push(AlertRecord {
                entity_key: entity_key.to_string(),
                event,
                state_label: dominant.clone(),
            });
        }
        dominant
    }
}
