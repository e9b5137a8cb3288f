use std::env;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vismon_core::app_state::{build_app_state, AppState};
use vismon_core::core::config::app_config::AppConfig;
use vismon_core::scheduler;
use vismon_core::scheduler::tasks::alarm::task::handle_alarm;

fn init_tracing() -> WorkerGuard {
    let log_dir = env::var("VISMON_LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    let file_appender = tracing_appender::rolling::daily(log_dir, "vismon.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    guard
}

/// Reads one decoded facility message per stdin line, prints each result as a JSON
/// line for the dashboard, and dispatches alert notifications.
async fn ingest(state: AppState) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }

        let result = state.processor.process(&line);
        match serde_json::to_string(&result) {
            Ok(json) => println!("{json}"),
            Err(e) => warn!(error = %e, "Failed to encode facility result"),
        }

        if !result.alerts.is_empty() {
            let now = state.clock().now();
            handle_alarm(&state, &result, now).await;
        }
    }

    info!("Input stream closed");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_tracing();

    let config = AppConfig::load()?;
    let state = build_app_state(config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = tokio::spawn(scheduler::run(state.clone(), shutdown_rx));

    tokio::select! {
        res = ingest(state) => {
            if let Err(e) = res {
                error!(?e, "Ingest loop failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_handle.await {
        error!(?e, "Scheduler task panicked");
    }

    Ok(())
}
