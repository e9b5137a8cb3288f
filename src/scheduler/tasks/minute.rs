use anyhow::Result;
use tracing::debug;

use crate::app_state::AppState;

/// Runs the minutely checks: scheduled no-show expectations.
pub async fn run(state: AppState) -> Result<usize> {
    let now = state.clock().now();
    debug!("Running minutely task (no-show checks)...");

    let alerts = state.no_shows.check(now);
    if alerts.is_empty() {
        return Ok(0);
    }

    let delivered = super::alarm::task::handle_no_shows(&state, &alerts, now).await;
    debug!(found = alerts.len(), delivered, "No-show checks completed");
    Ok(delivered)
}
