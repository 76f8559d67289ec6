use std::fmt;
use std::time::Duration;

/// Intensity class of one atomic haptic pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PulseKind {
    /// One hour, or a failure that needs the user's attention.
    Strong,
    /// One fifteen-minute block.
    Medium,
    /// One minute, or "nothing to report".
    Light,
}

impl PulseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PulseKind::Strong => "strong",
            PulseKind::Medium => "medium",
            PulseKind::Light => "light",
        }
    }
}

impl fmt::Display for PulseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fire-and-forget haptic output. Implementations must not block.
pub trait Haptics: Send + Sync {
    fn pulse(&self, kind: PulseKind);
}

/// Platform wake-lock primitive. Exclusivity is enforced by
/// [`crate::wake_lock::WakeLock`], not by implementations.
pub trait WakeLockBackend: Send + Sync {
    /// Prevents suspension for at most `max_hold`.
    fn acquire(&self, max_hold: Duration);
    fn release(&self);
}
