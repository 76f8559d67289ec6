mod alarm;
mod bridge;
mod composer;
mod config;
mod detector;
mod error;
mod event;
mod haptics;
mod paths;
mod player;
mod scheduler;
mod service;
mod source;
#[cfg(test)]
mod test_support;
mod wake_lock;
mod window;

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::alarm::AlarmFile;
use crate::bridge::LineBridge;
use crate::player::SequencePlayer;
use crate::service::ScreenService;
use crate::source::LineSource;
use crate::wake_lock::WakeLock;

const DEFAULT_LOG_FILTER: &str = "alarm_vibrator_daemon=info";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // stdout carries bridge commands, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    // ── App data directory ────────────────────────────────────────────────────
    let app_dir = match paths::app_data_dir() {
        Ok(dir) => dir,
        Err(e) => {
            tracing::error!("Cannot locate app data directory: {e:#}");
            std::process::exit(1);
        }
    };
    if let Err(e) = std::fs::create_dir_all(&app_dir) {
        tracing::error!("Failed to create app data directory {}: {e}", app_dir.display());
        std::process::exit(1);
    }

    // ── Configuration ─────────────────────────────────────────────────────────
    let config_path = app_dir.join(paths::CONFIG_FILE_NAME);
    let initial_config = config::load_or_default(&config_path).unwrap_or_else(|e| {
        tracing::warn!("Config error (using defaults): {e:#}");
        config::Config::default()
    });
    let timing = initial_config.timing.resolve();
    let alarm_path = initial_config
        .alarm
        .next_alarm_file
        .clone()
        .unwrap_or_else(|| app_dir.join(paths::NEXT_ALARM_FILE_NAME));

    // ── Platform bridge, wake lock, player ────────────────────────────────────
    let bridge = Arc::new(LineBridge::stdout());
    let wake_lock = WakeLock::new(bridge.clone());
    let alarms = AlarmFile::new(alarm_path);
    tracing::info!("Reading next alarm from {}", alarms.path().display());
    let player = Arc::new(SequencePlayer::new(
        bridge,
        Arc::clone(&wake_lock),
        Arc::new(alarms),
    ));

    let (event_tx, event_rx) = mpsc::channel::<event::DaemonEvent>(32);

    // ── Background tasks ──────────────────────────────────────────────────────
    tokio::spawn(config::watch_config(config_path, event_tx.clone()));

    // Graceful shutdown on Ctrl+C.
    {
        let tx = event_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(event::DaemonEvent::Shutdown).await;
            }
        });
    }

    tracing::info!("alarm-vibrator-daemon v{} started", env!("CARGO_PKG_VERSION"));

    // ── Event loop ────────────────────────────────────────────────────────────
    let mut source = LineSource::stdin();
    let service = ScreenService::new(timing, player, wake_lock);
    if let Err(e) = service.run(&mut source, event_tx, event_rx).await {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }

    tracing::info!("Shutting down");
}
