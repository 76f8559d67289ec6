use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::event::DaemonEvent;

pub const DEFAULT_INACTIVITY_TIMEOUT_MS: u64 = 10_000;
pub const MIN_INACTIVITY_TIMEOUT_MS: u64 = 1_000;
pub const MAX_INACTIVITY_TIMEOUT_MS: u64 = 120_000;

pub const DEFAULT_INTER_PULSE_MS: u64 = 500;
pub const MIN_INTER_PULSE_MS: u64 = 100;
pub const MAX_INTER_PULSE_MS: u64 = 5_000;

pub const DEFAULT_INTER_STAGE_MS: u64 = 1_000;
pub const MAX_INTER_STAGE_MS: u64 = 10_000;

/// Upper bound on a single wake-lock hold; the platform may reclaim it afterwards.
pub const DEFAULT_WAKE_LOCK_MAX_HOLD_SECS: u64 = 180;
pub const MIN_WAKE_LOCK_MAX_HOLD_SECS: u64 = 10;
pub const MAX_WAKE_LOCK_MAX_HOLD_SECS: u64 = 3_600;

/// Root configuration structure. Deserialized from `<app dir>/config.toml`.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub alarm: AlarmConfig,
}

/// Raw timing values as written in the config file, in milliseconds / seconds.
#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    /// Gap after the last screen event at which the gesture window is cleared.
    #[serde(default = "default_inactivity_timeout")]
    pub inactivity_timeout_ms: u64,
    /// Pause after every pulse within a stage.
    #[serde(default = "default_inter_pulse")]
    pub inter_pulse_ms: u64,
    /// Extra pause after the hour and quarter stages.
    #[serde(default = "default_inter_stage")]
    pub inter_stage_ms: u64,
    #[serde(default = "default_wake_lock_max_hold")]
    pub wake_lock_max_hold_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_ms: DEFAULT_INACTIVITY_TIMEOUT_MS,
            inter_pulse_ms: DEFAULT_INTER_PULSE_MS,
            inter_stage_ms: DEFAULT_INTER_STAGE_MS,
            wake_lock_max_hold_secs: DEFAULT_WAKE_LOCK_MAX_HOLD_SECS,
        }
    }
}

impl TimingConfig {
    /// Returns the effective timings, each clamped to its allowed range.
    pub fn resolve(&self) -> Timing {
        Timing {
            inactivity_timeout: Duration::from_millis(
                self.inactivity_timeout_ms
                    .clamp(MIN_INACTIVITY_TIMEOUT_MS, MAX_INACTIVITY_TIMEOUT_MS),
            ),
            inter_pulse: Duration::from_millis(
                self.inter_pulse_ms.clamp(MIN_INTER_PULSE_MS, MAX_INTER_PULSE_MS),
            ),
            inter_stage: Duration::from_millis(self.inter_stage_ms.min(MAX_INTER_STAGE_MS)),
            wake_lock_max_hold: Duration::from_secs(
                self.wake_lock_max_hold_secs
                    .clamp(MIN_WAKE_LOCK_MAX_HOLD_SECS, MAX_WAKE_LOCK_MAX_HOLD_SECS),
            ),
        }
    }
}

/// Where the next alarm is looked up.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct AlarmConfig {
    /// Overrides `<app dir>/next_alarm`. Read at startup only.
    pub next_alarm_file: Option<PathBuf>,
}

/// Resolved timing values consumed by the detector and the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub inactivity_timeout: Duration,
    pub inter_pulse: Duration,
    pub inter_stage: Duration,
    pub wake_lock_max_hold: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        TimingConfig::default().resolve()
    }
}

/// Loads the config file at `path`, returning `Config::default()` if the file does not exist.
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Quiet period after a config file event before the file is re-read.
/// Editors often emit several events for one save.
const RELOAD_SETTLE: Duration = Duration::from_millis(250);

/// Watches the directory holding `path` and sends `ConfigReloaded` once the
/// config file has been created or written and events have settled.
///
/// A file that fails to parse is reported and skipped; the daemon keeps the
/// last good timing.
pub async fn watch_config(path: PathBuf, tx: mpsc::Sender<DaemonEvent>) {
    let Some(watch_dir) = path.parent().map(Path::to_path_buf) else {
        tracing::warn!("Config path {} has no parent directory", path.display());
        return;
    };

    let (fs_tx, mut fs_rx) = mpsc::channel::<notify::Event>(16);
    let mut watcher = match RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                let _ = fs_tx.blocking_send(event);
            }
            Err(e) => tracing::warn!("Config watcher error: {e}"),
        },
        NotifyConfig::default(),
    ) {
        Ok(w) => w,
        Err(e) => {
            tracing::warn!("Config reload disabled, watcher unavailable: {e}");
            return;
        }
    };
    // The directory, not the file, so write-new + rename saves are seen.
    if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
        tracing::warn!("Config reload disabled, cannot watch {}: {e}", watch_dir.display());
        return;
    }
    tracing::debug!("Watching {} for config changes", path.display());

    while let Some(event) = fs_rx.recv().await {
        if !touches_config(&event, &path) {
            continue;
        }
        if !settle(&mut fs_rx, RELOAD_SETTLE).await {
            break;
        }
        match load_or_default(&path) {
            Ok(config) => {
                tracing::info!("Config reloaded from {}", path.display());
                if tx.send(DaemonEvent::ConfigReloaded(config)).await.is_err() {
                    break;
                }
            }
            Err(e) => tracing::warn!("Keeping previous config: {e:#}"),
        }
    }
}

/// Whether `event` creates or writes the config file itself.
fn touches_config(event: &notify::Event, path: &Path) -> bool {
    matches!(
        event.kind,
        notify::EventKind::Create(_) | notify::EventKind::Modify(_)
    ) && event.paths.iter().any(|p| p == path)
}

/// Discards events until none has arrived for `quiet`.
/// Returns `false` if the watcher went away meanwhile.
async fn settle(rx: &mut mpsc::Receiver<notify::Event>, quiet: Duration) -> bool {
    loop {
        match tokio::time::timeout(quiet, rx.recv()).await {
            Err(_elapsed) => return true,
            Ok(Some(_)) => {}
            Ok(None) => return false,
        }
    }
}

fn default_inactivity_timeout() -> u64 {
    DEFAULT_INACTIVITY_TIMEOUT_MS
}

fn default_inter_pulse() -> u64 {
    DEFAULT_INTER_PULSE_MS
}

fn default_inter_stage() -> u64 {
    DEFAULT_INTER_STAGE_MS
}

fn default_wake_lock_max_hold() -> u64 {
    DEFAULT_WAKE_LOCK_MAX_HOLD_SECS
}
