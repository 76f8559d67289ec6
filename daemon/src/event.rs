use tokio::time::Instant;

use crate::config::Config;

/// A screen transition reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenSignal {
    /// The display turned on.
    On,
    /// The display turned off.
    Off,
    /// The user unlocked the device.
    UserPresent,
}

pub enum DaemonEvent {
    /// A screen transition, stamped with the monotonic time it was observed.
    Screen { signal: ScreenSignal, at: Instant },
    /// The config file changed on disk and was successfully re-parsed.
    ConfigReloaded(Config),
    /// Ctrl+C received or the event source closed; the daemon should unregister and exit.
    Shutdown,
}
