/// Canonical file paths for the daemon's data files.
///
/// Both files live under the application directory:
///   - config.toml  Timing and alarm-source settings, watched for changes.
///   - next_alarm   Trigger time of the next alarm, written by the alarm scheduler.
///
/// The directory is `$ALARM_VIBRATOR_HOME` when set, otherwise the platform's
/// per-user configuration directory.
use anyhow::{bail, Result};
use std::path::PathBuf;

pub const HOME_ENV_VAR: &str = "ALARM_VIBRATOR_HOME";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const NEXT_ALARM_FILE_NAME: &str = "next_alarm";

#[cfg(windows)]
const APP_DIR_NAME: &str = "AlarmVibrator";
#[cfg(not(windows))]
const APP_DIR_NAME: &str = "alarm-vibrator";

/// Returns the application data directory.
pub fn app_data_dir() -> Result<PathBuf> {
    resolve_app_dir(|key| std::env::var_os(key).map(PathBuf::from))
}

fn resolve_app_dir(env: impl Fn(&str) -> Option<PathBuf>) -> Result<PathBuf> {
    if let Some(home) = env(HOME_ENV_VAR) {
        return Ok(home);
    }
    platform_app_dir(&env)
}

#[cfg(windows)]
fn platform_app_dir(env: &impl Fn(&str) -> Option<PathBuf>) -> Result<PathBuf> {
    match env("APPDATA") {
        Some(appdata) => Ok(appdata.join(APP_DIR_NAME)),
        None => bail!("Neither {HOME_ENV_VAR} nor APPDATA is set"),
    }
}

#[cfg(not(windows))]
fn platform_app_dir(env: &impl Fn(&str) -> Option<PathBuf>) -> Result<PathBuf> {
    if let Some(xdg) = env("XDG_CONFIG_HOME") {
        return Ok(xdg.join(APP_DIR_NAME));
    }
    match env("HOME") {
        Some(home) => Ok(home.join(".config").join(APP_DIR_NAME)),
        None => bail!("Neither {HOME_ENV_VAR}, XDG_CONFIG_HOME nor HOME is set"),
    }
}
