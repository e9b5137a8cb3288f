use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::state::alerts::alert_state::AlertEvent;
use crate::domain::aggregation::state_aggregator::UNKNOWN_STATE;
use crate::errors::{malformed, CoreError};

/// Decoded output of the description pipeline for one ingestion cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacilityMessage {
    #[serde(default)]
    pub facility_state: String,
    #[serde(default)]
    pub camera_states: BTreeMap<String, String>,
    /// Capture time; RFC 3339 or naive local time. Absent means "now".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl FacilityMessage {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        serde_json::from_str(raw).map_err(malformed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub entity_key: String,
    pub event: AlertEvent,
    pub state_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityResult {
    pub facility_state: String,
    pub camera_states: BTreeMap<String, String>,
    pub alerts: Vec<AlertRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl FacilityResult {
    /// Result for a message that could not be used.
    pub fn empty(err: &CoreError) -> Self {
        Self {
            facility_state: UNKNOWN_STATE.to_string(),
            camera_states: BTreeMap::new(),
            alerts: Vec::new(),
            diagnostic: Some(format!("{}: {}", err.code(), err)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.camera_states.is_empty() && self.alerts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_default_to_empty() {
        let msg = FacilityMessage::parse(r#"{"camera_states":{"Kitchen":"quiet"}}"#).unwrap();
        assert_eq!(msg.facility_state, "");
        assert_eq!(msg.camera_states["Kitchen"], "quiet");
        assert!(msg.timestamp.is_none());
    }

    #[test]
    fn wrong_shape_is_malformed() {
        for raw in ["not json", "[1,2]", r#"{"camera_states":{"Kitchen":5}}"#] {
            let err = FacilityMessage::parse(raw).unwrap_err();
            assert_eq!(err.code(), "MALFORMED_INPUT", "input: {raw}");
        }
    }

    #[test]
    fn empty_result_carries_diagnostic() {
        let result = FacilityResult::empty(&CoreError::MalformedInput("eof".into()));
        assert!(result.is_empty());
        assert_eq!(result.facility_state, UNKNOWN_STATE);
        assert_eq!(result.diagnostic.as_deref(), Some("MALFORMED_INPUT: Malformed input: eof"));
    }
}
