use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

pub const DEFAULT_FLAP_THRESHOLD: usize = 3;
pub const DEFAULT_FLAP_INTERVAL_SECS: i64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertEvent {
    Alert,
    Resolved,
    FlappingStart,
    FlappingEnd,
}

impl AlertEvent {
    pub fn as_code(&self) -> &'static str {
        match self {
            Self::Alert => "ALERT",
            Self::Resolved => "RESOLVED",
            Self::FlappingStart => "FLAPPING_START",
            Self::FlappingEnd => "FLAPPING_END",
        }
    }
}

impl fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlapSettings {
    pub threshold: usize,
    pub interval: Duration,
}

impl Default for FlapSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_FLAP_THRESHOLD,
            interval: Duration::seconds(DEFAULT_FLAP_INTERVAL_SECS),
        }
    }
}

/// Binary alert state of one entity with flap dampening.
///
/// Flapping is only re-evaluated when the alerting value changes. An entity that stops
/// oscillating while flapping stays silently suppressed until its next value change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertState {
    pub is_alerting: bool,
    pub last_change: DateTime<Utc>,
    pub is_flapping: bool,

    /// Instants of the most recent value changes, at most `threshold` long
    pub recent_changes: VecDeque<DateTime<Utc>>,

    #[serde(skip)]
    settings: FlapSettings,
}

impl AlertState {
    pub fn new(settings: FlapSettings, now: DateTime<Utc>) -> Self {
        let threshold = settings.threshold.max(1);
        Self {
            is_alerting: false,
            last_change: now,
            is_flapping: false,
            recent_changes: VecDeque::with_capacity(threshold),
            settings: FlapSettings {
                threshold,
                ..settings
            },
        }
    }

    pub fn settings(&self) -> FlapSettings {
        self.settings
    }

    pub fn update(&mut self, is_alerting: bool, now: DateTime<Utc>) -> Option<AlertEvent> {
        if is_alerting == self.is_alerting {
            return None;
        }

        self.recent_changes.push_back(now);
        while self.recent_changes.len() > self.settings.threshold {
            self.recent_changes.pop_front();
        }
        self.is_alerting = is_alerting;
        self.last_change = now;

        if self.recent_changes.len() == self.settings.threshold {
            let oldest = self.recent_changes.front().copied().unwrap_or(now);
            let span = now.signed_duration_since(oldest);

            if span <= self.settings.interval {
                if !self.is_flapping {
                    self.is_flapping = true;
                    return Some(AlertEvent::FlappingStart);
                }
            } else if self.is_flapping {
                self.is_flapping = false;
                return Some(AlertEvent::FlappingEnd);
            }
        }

        if self.is_flapping {
            return None;
        }

        Some(if is_alerting {
            AlertEvent::Alert
        } else {
            AlertEvent::Resolved
        })
    }
}
