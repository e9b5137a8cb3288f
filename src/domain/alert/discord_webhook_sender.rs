use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::core::state::alerts::alert_state::AlertEvent;
use crate::domain::alert::alert_notifier::{AlertNotifier, Notification, NotificationKind};

const SEND_ATTEMPTS: usize = 2;

pub struct DiscordWebhookSender {
    client: Client,
    webhook_url: String,
}

impl DiscordWebhookSender {
    pub fn new(client: Client, webhook_url: impl Into<String>) -> Self {
        Self {
            client,
            webhook_url: webhook_url.into(),
        }
    }

    pub fn with_url(webhook_url: impl Into<String>) -> Self {
        Self::new(Client::new(), webhook_url)
    }

    /// Sends a notification as a Discord embed and retries on non-2xx responses.
    pub async fn send(&self, notification: &Notification) -> Result<()> {
        let payload = Self::payload_for(notification);
        self.post_with_retry(&payload, SEND_ATTEMPTS).await
    }

    fn payload_for(notification: &Notification) -> DiscordWebhookPayload {
        DiscordWebhookPayload {
            content: None,
            embeds: vec![DiscordEmbed {
                title: notification.title.clone(),
                description: Some(notification.message.clone()),
                color: Self::color_for(notification.kind),
                timestamp: Some(notification.created_at.to_rfc3339()),
            }],
        }
    }

    async fn post_with_retry(&self, payload: &DiscordWebhookPayload, attempts: usize) -> Result<()> {
        let mut last_status: Option<StatusCode> = None;

        for _ in 0..attempts {
            let resp = self.client.post(&self.webhook_url).json(payload).send().await?;
            let status = resp.status();
            if status.is_success() {
                // Discord returns 204 on success; any 2xx is accepted.
                return Ok(());
            }

            last_status = Some(status);
        }

        Err(anyhow!(
            "Discord webhook failed after retries (last status: {:?})",
            last_status
        ))
    }

    fn color_for(kind: NotificationKind) -> u32 {
        match kind {
            NotificationKind::Transition(AlertEvent::Alert) => 0xe74c3c,
            NotificationKind::Transition(AlertEvent::Resolved) => 0x2ecc71,
            NotificationKind::Transition(AlertEvent::FlappingStart) => 0xf1c40f,
            NotificationKind::Transition(AlertEvent::FlappingEnd) => 0x3498db,
            NotificationKind::NoShow => 0xe67e22,
        }
    }
}

#[async_trait]
impl AlertNotifier for DiscordWebhookSender {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        self.send(notification).await
    }
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn payload_is_a_single_embed() {
        let n = Notification {
            entity_key: "Hall 8".into(),
            kind: NotificationKind::Transition(AlertEvent::Alert),
            title: "Hall 8: alert".into(),
            message: "Facility status update - Hall 8: crowd gathering".into(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        };

        let value = serde_json::to_value(DiscordWebhookSender::payload_for(&n)).unwrap();
        assert_eq!(
            value,
            json!({
                "embeds": [{
                    "title": "Hall 8: alert",
                    "description": "Facility status update - Hall 8: crowd gathering",
                    "color": 0xe74c3c,
                    "timestamp": "2024-05-01T12:00:00+00:00"
                }]
            })
        );
    }
}
