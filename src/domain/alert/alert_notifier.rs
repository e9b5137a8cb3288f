use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::core::state::alerts::alert_state::AlertEvent;
use crate::domain::facility::camera_directory::CameraDirectory;
use crate::domain::facility::facility_message::AlertRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Transition(AlertEvent),
    NoShow,
}

/// One message for the delivery collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub entity_key: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn for_transition(record: &AlertRecord, cameras: &CameraDirectory, now: DateTime<Utc>) -> Self {
        let name = cameras.display_name(&record.entity_key);
        let (title, message) = match record.event {
            AlertEvent::Alert => (
                format!("{name}: alert"),
                format!("Facility status update - {name}: {}", record.state_label),
            ),
            AlertEvent::Resolved => (
                format!("{name}: resolved"),
                format!("{name} is back to normal ({})", record.state_label),
            ),
            AlertEvent::FlappingStart => (
                format!("{name}: flapping"),
                format!(
                    "{name} keeps changing state; further alerts are paused (last seen: {})",
                    record.state_label
                ),
            ),
            AlertEvent::FlappingEnd => (
                format!("{name}: stable again"),
                format!("{name} stopped flapping; current state: {}", record.state_label),
            ),
        };

        Self {
            entity_key: record.entity_key.clone(),
            kind: NotificationKind::Transition(record.event),
            title,
            message,
            created_at: now,
        }
    }
}

/// Delivery seam for alert notifications.
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Writes notifications to the log; used when no webhook is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl AlertNotifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        info!(
            entity_key = %notification.entity_key,
            title = %notification.title,
            "{}",
            notification.message
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn transition_uses_display_name() {
        let mut cameras = CameraDirectory::default();
        cameras.insert("5SJZivf8PPsLWw2n", "Hall");
        let record = AlertRecord {
            entity_key: "5SJZivf8PPsLWw2n".into(),
            event: AlertEvent::Alert,
            state_label: "crowd gathering".into(),
        };
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let n = Notification::for_transition(&record, &cameras, now);
        assert_eq!(n.title, "Hall: alert");
        assert_eq!(n.message, "Facility status update - Hall: crowd gathering");
        assert_eq!(n.kind, NotificationKind::Transition(AlertEvent::Alert));
    }

    #[tokio::test]
    async fn log_notifier_accepts_everything() {
        let n = Notification {
            entity_key: "Stage".into(),
            kind: NotificationKind::NoShow,
            title: "Stage: no-show".into(),
            message: "nobody".into(),
            created_at: Utc::now(),
        };
        assert!(LogNotifier.notify(&n).await.is_ok());
    }
}
