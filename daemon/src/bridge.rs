//! Line-oriented output to the platform shim that owns the vibrator motor and
//! the wake lock.
//!
//! Commands, one per line:
//!   pulse strong|medium|light
//!   wakelock acquire <max_hold_ms>
//!   wakelock release
//!
//! Writes are flushed per line so the shim sees each command immediately.
//! A failed write is logged and dropped; it never stops a playback.
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::haptics::{Haptics, PulseKind, WakeLockBackend};

pub struct LineBridge<W: Write + Send> {
    out: Mutex<W>,
}

impl LineBridge<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> LineBridge<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, line: &str) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            tracing::warn!("Failed to write '{line}' to platform bridge: {e}");
        }
    }
}

impl<W: Write + Send> Haptics for LineBridge<W> {
    fn pulse(&self, kind: PulseKind) {
        self.send(&format!("pulse {kind}"));
    }
}

impl<W: Write + Send> WakeLockBackend for LineBridge<W> {
    fn acquire(&self, max_hold: Duration) {
        self.send(&format!("wakelock acquire {}", max_hold.as_millis()));
    }

    fn release(&self) {
        self.send("wakelock release");
    }
}
