use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_ALERT_PHRASES: [&str; 3] = ["festival happening", "crowd gathering", "door open"];

/// Trigger phrase table deciding whether a dominant state counts as alerting.
///
/// Entities with their own phrase set use only that set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertClassifier {
    default_phrases: Vec<String>,
    entity_phrases: HashMap<String, Vec<String>>,
}

impl Default for AlertClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_PHRASES)
    }
}

fn normalize<I, S>(phrases: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for p in phrases {
        let p = p.as_ref().trim().to_lowercase();
        if !p.is_empty() && !out.contains(&p) {
            out.push(p);
        }
    }
    out
}

impl AlertClassifier {
    pub fn new<I, S>(default_phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            default_phrases: normalize(default_phrases),
            entity_phrases: HashMap::new(),
        }
    }

    pub fn with_entity_phrases<I, S>(mut self, entity_key: &str, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_entity_phrases(entity_key, phrases);
        self
    }

    pub fn set_entity_phrases<I, S>(&mut self, entity_key: &str, phrases: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.entity_phrases
            .insert(entity_key.to_string(), normalize(phrases));
    }

    pub fn default_phrases(&self) -> &[String] {
        &self.default_phrases
    }

    /// Entities with their own phrase set, and that set.
    pub fn entity_phrase_sets(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entity_phrases
            .iter()
            .map(|(key, phrases)| (key.as_str(), phrases.as_slice()))
    }

    pub fn phrases_for(&self, entity_key: &str) -> &[String] {
        self.entity_phrases
            .get(entity_key)
            .unwrap_or(&self.default_phrases)
    }

    pub fn is_alerting(&self, entity_key: &str, state_label: &str) -> bool {
        let label = state_label.to_lowercase();
        self.phrases_for(entity_key)
            .iter()
            .any(|p| label.contains(p.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_phrases_trigger() {
        let classifier = AlertClassifier::default();
        assert!(classifier.is_alerting("Field", "Festival happening on the lawn"));
        assert!(classifier.is_alerting("Walk-in", "door open"));
        assert!(!classifier.is_alerting("Field", "quiet"));
        assert!(!classifier.is_alerting("Field", "Unknown"));
    }

    #[test]
    fn entity_phrases_replace_defaults() {
        let classifier = AlertClassifier::default().with_entity_phrases("Hall 8", ["Bustling"]);
        assert!(classifier.is_alerting("Hall 8", "bustling, people eating"));
        assert!(!classifier.is_alerting("Hall 8", "crowd gathering"));
        assert!(classifier.is_alerting("Hall 7", "crowd gathering"));
    }
}
