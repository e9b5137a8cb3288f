pub mod tasks;

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use crate::app_state::AppState;

const MINUTE: Duration = Duration::from_secs(60);

/// Runs the minutely task until `shutdown` flips to true.
pub async fn run(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(MINUTE);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    info!("Scheduler started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = tasks::minute::run(state.clone()).await {
                    error!(?e, "Minutely task failed");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Scheduler stopped");
}
