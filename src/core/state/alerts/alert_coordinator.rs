use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use super::alert_state::{AlertEvent, AlertState, FlapSettings};

/// Owns one [`AlertState`] per entity key; the only producer of alert events.
#[derive(Debug, Default)]
pub struct AlertCoordinator {
    states: DashMap<String, Arc<Mutex<AlertState>>>,
    settings: FlapSettings,
}

impl AlertCoordinator {
    pub fn new(settings: FlapSettings) -> Self {
        Self {
            states: DashMap::new(),
            settings,
        }
    }

    pub fn settings(&self) -> FlapSettings {
        self.settings
    }

    pub fn update_state(
        &self,
        entity_key: &str,
        is_alerting: bool,
        now: DateTime<Utc>,
    ) -> Option<AlertEvent> {
        let slot = match self.states.get(entity_key) {
            Some(existing) => existing.clone(),
            None => self
                .states
                .entry(entity_key.to_string())
                .or_insert_with(|| {
                    debug!(entity_key, "Tracking new alert entity");
                    Arc::new(Mutex::new(AlertState::new(self.settings, now)))
                })
                .clone(),
        };

        let mut state = slot.lock().unwrap_or_else(PoisonError::into_inner);
        state.update(is_alerting, now)
    }

    /// Copy of the entity's current alert state, if it has been seen.
    pub fn snapshot(&self, entity_key: &str) -> Option<AlertState> {
        let slot = self.states.get(entity_key)?.clone();
        let state = slot.lock().unwrap_or_else(PoisonError::into_inner);
        Some(state.clone())
    }

    /// Keys currently alerting, sorted.
    pub fn alerting_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .states
            .iter()
            .filter(|e| {
                e.value()
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .is_alerting
            })
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        keys
    }
}
