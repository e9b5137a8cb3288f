pub mod alert_classifier;
pub mod alert_notifier;
pub mod discord_webhook_sender;
