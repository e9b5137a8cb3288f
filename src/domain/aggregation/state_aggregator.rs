use std::sync::Arc;

use crate::core::state::window::windowed_state_store::{Window, WindowedStateStore};

use super::aggregation_config::AggregationConfig;

pub const UNKNOWN_STATE: &str = "Unknown";

/// Computes the dominant (weighted most frequent) relevant label of an entity's window.
#[derive(Debug, Clone)]
pub struct StateAggregator {
    config: Arc<AggregationConfig>,
}

impl StateAggregator {
    pub fn new(config: Arc<AggregationConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    pub fn dominant_state(&self, store: &WindowedStateStore, entity_key: &str) -> String {
        store
            .with_window(entity_key, |window| self.dominant_in(entity_key, window))
            .unwrap_or_else(|| UNKNOWN_STATE.to_string())
    }

    /// Empty window yields "Unknown"; a window with nothing relevant yields its latest label.
    pub fn dominant_in(&self, entity_key: &str, window: &Window) -> String {
        let Some(latest) = window.latest() else {
            return UNKNOWN_STATE.to_string();
        };

        let profile = self.config.profile(entity_key);

        // First-seen order is kept so ties resolve to the earliest label.
        let mut tally: Vec<(&str, f64)> = Vec::new();
        for obs in window.entries().iter().filter(|o| profile.is_relevant(&o.state_label)) {
            let weight = profile.weight_for(&obs.state_label);
            match tally.iter_mut().find(|(label, _)| *label == obs.state_label) {
                Some(entry) => entry.1 += weight,
                None => tally.push((obs.state_label.as_str(), weight)),
            }
        }

        let mut best: Option<(&str, f64)> = None;
        for (label, total) in tally {
            match best {
                Some((_, top)) if total <= top => {}
                _ => best = Some((label, total)),
            }
        }

        best.map(|(label, _)| label.to_string())
            .unwrap_or_else(|| latest.state_label.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregation::aggregation_config::AggregationProfile;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn feed(store: &WindowedStateStore, key: &str, labels: &[&str]) {
        for (i, label) in labels.iter().enumerate() {
            store.record(key, label, t0() + Duration::seconds(i as i64));
        }
    }

    #[test]
    fn unseen_entity_is_unknown() {
        let agg = StateAggregator::new(Arc::new(AggregationConfig::default()));
        let store = WindowedStateStore::default();
        assert_eq!(agg.dominant_state(&store, "Greenhouse"), UNKNOWN_STATE);
    }

    #[test]
    fn repeated_relevant_label_dominates_single_irrelevant() {
        let agg = StateAggregator::new(Arc::new(AggregationConfig::default()));
        for n in 1..6 {
            let store = WindowedStateStore::default();
            let mut labels = vec!["person present"; n];
            labels.push("camera lens is foggy");
            feed(&store, "Deck", &labels);
            assert_eq!(agg.dominant_state(&store, "Deck"), "person present");
        }
    }

    #[test]
    fn irrelevant_only_window_surfaces_latest_label() {
        let agg = StateAggregator::new(Arc::new(AggregationConfig::default()));
        let store = WindowedStateStore::default();
        feed(&store, "Walk-in", &["door ajar", "lights flickering"]);
        assert_eq!(agg.dominant_state(&store, "Walk-in"), "lights flickering");
    }

    #[test]
    fn override_weight_dampens_noisy_label() {
        let labels = ["busy", "quiet", "busy", "quiet", "busy"];

        let plain = StateAggregator::new(Arc::new(AggregationConfig::default()));
        let store = WindowedStateStore::default();
        feed(&store, "Hall 8", &labels);
        assert_eq!(plain.dominant_state(&store, "Hall 8"), "busy");

        let mut config = AggregationConfig::default();
        config.override_mut("Hall 8").set_weight("busy", 0.5);
        let damped = StateAggregator::new(Arc::new(config));
        assert_eq!(damped.dominant_state(&store, "Hall 8"), "quiet");
        // Other entities keep the default weighting.
        feed(&store, "Kitchen", &labels);
        assert_eq!(damped.dominant_state(&store, "Kitchen"), "busy");
    }

    #[test]
    fn ties_go_to_first_seen_label() {
        let agg = StateAggregator::new(Arc::new(AggregationConfig::default()));
        let store = WindowedStateStore::default();
        feed(&store, "Pavillion", &["quiet", "busy", "busy", "quiet"]);
        assert_eq!(agg.dominant_state(&store, "Pavillion"), "quiet");
    }

    #[test]
    fn per_entity_relevance_phrases_replace_default() {
        let mut config = AggregationConfig::default();
        config
            .overrides
            .insert("Stage".into(), AggregationProfile::new(["kirtan"]));
        let agg = StateAggregator::new(Arc::new(config));

        let store = WindowedStateStore::default();
        feed(&store, "Stage", &["busy", "busy", "kirtan in progress"]);
        assert_eq!(agg.dominant_state(&store, "Stage"), "kirtan in progress");
    }
}
