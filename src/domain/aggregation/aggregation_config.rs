use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::alert::alert_classifier::AlertClassifier;

/// Phrases the description pipeline uses for states worth tracking.
pub const DEFAULT_RELEVANCE_PHRASES: [&str; 7] = [
    "busy",
    "festival happening",
    "crowd gathering",
    "night-time",
    "quiet",
    "person present",
    "people eating",
];

pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Relevance phrases and label weights applied to one entity (or to all by default).
///
/// Phrases are stored lower-cased; matching is a case-insensitive substring test.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationProfile {
    pub relevance_phrases: Vec<String>,
    /// Ordered `(substring, weight)` pairs; the first substring found in a label wins.
    pub state_weights: Vec<(String, f64)>,
}

impl AggregationProfile {
    pub fn new<I, S>(relevance_phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut profile = Self::default();
        for phrase in relevance_phrases {
            profile.add_relevance_phrase(phrase.as_ref());
        }
        profile
    }

    pub fn with_weight(mut self, substring: &str, weight: f64) -> Self {
        self.set_weight(substring, weight);
        self
    }

    pub fn add_relevance_phrase(&mut self, phrase: &str) {
        let phrase = phrase.trim().to_lowercase();
        if !phrase.is_empty() && !self.relevance_phrases.contains(&phrase) {
            self.relevance_phrases.push(phrase);
        }
    }

    pub fn set_weight(&mut self, substring: &str, weight: f64) {
        let substring = substring.trim().to_lowercase();
        if substring.is_empty() {
            return;
        }
        match self.state_weights.iter_mut().find(|(s, _)| *s == substring) {
            Some(existing) => existing.1 = weight,
            None => self.state_weights.push((substring, weight)),
        }
    }

    pub fn is_relevant(&self, label: &str) -> bool {
        let label = label.to_lowercase();
        self.relevance_phrases.iter().any(|p| label.contains(p.as_str()))
    }

    pub fn weight_for(&self, label: &str) -> f64 {
        let label = label.to_lowercase();
        self.state_weights
            .iter()
            .find(|(s, _)| label.contains(s.as_str()))
            .map(|(_, w)| *w)
            .unwrap_or(DEFAULT_WEIGHT)
    }
}

/// Default profile plus per-entity overrides. Read-only after startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationConfig {
    pub default: AggregationProfile,
    pub overrides: HashMap<String, AggregationProfile>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            default: AggregationProfile::new(DEFAULT_RELEVANCE_PHRASES),
            overrides: HashMap::new(),
        }
    }
}

impl AggregationConfig {
    /// Profile for `entity_key`, falling back to the default one.
    pub fn profile(&self, entity_key: &str) -> &AggregationProfile {
        self.overrides.get(entity_key).unwrap_or(&self.default)
    }

    /// Mutable override for `entity_key`, seeded from the default relevance phrases.
    pub fn override_mut(&mut self, entity_key: &str) -> &mut AggregationProfile {
        let seed = AggregationProfile {
            relevance_phrases: self.default.relevance_phrases.clone(),
            state_weights: Vec::new(),
        };
        self.overrides.entry(entity_key.to_string()).or_insert(seed)
    }

    /// Adds every phrase that can raise an alert to the matching relevance set, so an
    /// alerting label is never filtered out of the tally.
    pub fn include_alert_phrases(&mut self, classifier: &AlertClassifier) {
        for phrase in classifier.default_phrases() {
            self.default.add_relevance_phrase(phrase);
            for profile in self.overrides.values_mut() {
                profile.add_relevance_phrase(phrase);
            }
        }
        for (entity_key, phrases) in classifier.entity_phrase_sets() {
            let profile = self.override_mut(entity_key);
            for phrase in phrases {
                profile.add_relevance_phrase(phrase);
            }
        }
    }
}
