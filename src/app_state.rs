use std::sync::Arc;

use tracing::info;

use crate::core::clock::{Clock, SystemClock};
use crate::core::config::app_config::AppConfig;
use crate::core::state::alerts::alert_coordinator::AlertCoordinator;
use crate::core::state::window::windowed_state_store::WindowedStateStore;
use crate::domain::aggregation::state_aggregator::StateAggregator;
use crate::domain::alert::alert_notifier::{AlertNotifier, LogNotifier};
use crate::domain::alert::discord_webhook_sender::DiscordWebhookSender;
use crate::domain::facility::camera_directory::CameraDirectory;
use crate::domain::facility::facility_state_processor::FacilityStateProcessor;
use crate::domain::schedule::no_show_monitor::NoShowMonitor;

/// Shared handles to the long-lived registries and collaborators.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<FacilityStateProcessor>,
    pub no_shows: Arc<NoShowMonitor>,
    pub notifier: Arc<dyn AlertNotifier>,
    pub cameras: Arc<CameraDirectory>,
}

impl AppState {
    pub fn clock(&self) -> &Arc<dyn Clock> {
        self.processor.clock()
    }
}

pub fn build_app_state(config: AppConfig) -> AppState {
    let notifier: Arc<dyn AlertNotifier> = match config.discord_webhook_url.as_deref() {
        Some(url) => {
            info!("Delivering alerts to Discord webhook");
            Arc::new(DiscordWebhookSender::with_url(url))
        }
        None => {
            info!("No webhook configured; alerts are logged only");
            Arc::new(LogNotifier)
        }
    };
    build_app_state_with(config, Arc::new(SystemClock), notifier)
}

pub fn build_app_state_with(
    config: AppConfig,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn AlertNotifier>,
) -> AppState {
    let store = Arc::new(
        WindowedStateStore::new(config.core.retention(), config.core.capacity)
            .with_reference_offset(config.reference_offset),
    );
    let alerts = Arc::new(AlertCoordinator::new(config.core.flap_settings()));

    let mut aggregation = config.aggregation;
    aggregation.include_alert_phrases(&config.classifier);

    let processor = FacilityStateProcessor::new(
        store.clone(),
        StateAggregator::new(Arc::new(aggregation)),
        Arc::new(config.classifier),
        alerts,
        clock,
    )
    .with_facility_key(config.core.facility_key);

    AppState {
        processor: Arc::new(processor),
        no_shows: Arc::new(NoShowMonitor::new(config.no_show_rules, store)),
        notifier,
        cameras: Arc::new(config.cameras),
    }
}
