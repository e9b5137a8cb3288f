use chrono::{DateTime, Utc};

use crate::app_state::AppState;
use crate::domain::alert::alert_notifier::{Notification, NotificationKind};
use crate::domain::facility::facility_message::FacilityResult;
use crate::domain::schedule::no_show_monitor::NoShowAlert;

/// Sends one notification per alert transition. Returns how many were delivered.
pub async fn handle_alarm(state: &AppState, result: &FacilityResult, now: DateTime<Utc>) -> usize {
    let notifications: Vec<Notification> = result
        .alerts
        .iter()
        .map(|record| Notification::for_transition(record, &state.cameras, now))
        .collect();

    deliver(state, &notifications).await
}

pub async fn handle_no_shows(state: &AppState, alerts: &[NoShowAlert], now: DateTime<Utc>) -> usize {
    let notifications: Vec<Notification> = alerts
        .iter()
        .map(|alert| {
            let name = state.cameras.display_name(&alert.entity_key);
            Notification {
                entity_key: alert.entity_key.clone(),
                kind: NotificationKind::NoShow,
                title: format!("{name}: no-show ({})", alert.check_time),
                message: alert.message.replace(alert.entity_key.as_str(), name),
                created_at: now,
            }
        })
        .collect();

    deliver(state, &notifications).await
}

async fn deliver(state: &AppState, notifications: &[Notification]) -> usize {
    let mut delivered = 0;
    for notification in notifications {
        match state.notifier.notify(notification).await {
            Ok(()) => delivered += 1,
            Err(err) => {
                tracing::warn!(
                    error = ?err,
                    entity_key = %notification.entity_key,
                    "Failed to deliver alert notification"
                );
            }
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::build_app_state_with;
    use crate::core::clock::ManualClock;
    use crate::core::config::app_config::AppConfig;
    use crate::domain::alert::alert_notifier::AlertNotifier;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct MockNotifier {
        sent: Mutex<Vec<Notification>>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl AlertNotifier for MockNotifier {
        async fn notify(&self, notification: &Notification) -> Result<()> {
            if self.fail_for.as_deref() == Some(notification.entity_key.as_str()) {
                return Err(anyhow!("webhook returned 500"));
            }
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn state_with(notifier: Arc<MockNotifier>) -> AppState {
        let mut config = AppConfig::default();
        config.cameras.insert("LRqgKMMjjJbNEeyE", "Field");
        build_app_state_with(config, Arc::new(ManualClock::new(t0())), notifier)
    }

    #[tokio::test]
    async fn transitions_are_delivered_with_camera_names() {
        let notifier = Arc::new(MockNotifier::default());
        let state = state_with(notifier.clone());

        let result = state.processor.process(
            r#"{"facility_state":"festival happening","camera_states":{"LRqgKMMjjJbNEeyE":"crowd gathering"}}"#,
        );
        assert_eq!(handle_alarm(&state, &result, t0()).await, 2);

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent[0].title, "Field: alert");
        assert_eq!(sent[1].entity_key, "facility");
    }

    #[tokio::test]
    async fn one_failed_delivery_does_not_block_others() {
        let notifier = Arc::new(MockNotifier {
            fail_for: Some("LRqgKMMjjJbNEeyE".into()),
            ..Default::default()
        });
        let state = state_with(notifier.clone());

        let result = state.processor.process(
            r#"{"facility_state":"festival happening","camera_states":{"LRqgKMMjjJbNEeyE":"crowd gathering"}}"#,
        );
        assert_eq!(handle_alarm(&state, &result, t0()).await, 1);
        assert_eq!(notifier.sent.lock().unwrap()[0].entity_key, "facility");
    }

    #[tokio::test]
    async fn no_show_alerts_use_display_names() {
        let notifier = Arc::new(MockNotifier::default());
        let state = state_with(notifier.clone());
        let alerts = vec![NoShowAlert {
            entity_key: "LRqgKMMjjJbNEeyE".into(),
            check_time: "10:30-11:00".into(),
            message: "No person present detected for LRqgKMMjjJbNEeyE between 10:30 and 11:00".into(),
        }];

        assert_eq!(handle_no_shows(&state, &alerts, t0()).await, 1);
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent[0].kind, NotificationKind::NoShow);
        assert_eq!(sent[0].title, "Field: no-show (10:30-11:00)");
        assert_eq!(
            sent[0].message,
            "No person present detected for Field between 10:30 and 11:00"
        );
    }
}
