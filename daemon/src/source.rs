//! Screen event sources.
//!
//! The platform shim reports screen transitions as text lines on stdin, one
//! token per line (case-insensitive):
//!   on | screen_on
//!   off | screen_off
//!   present | user_present
//!
//! Blank lines and `#` comments are skipped; unknown tokens are logged and
//! ignored. End of input is treated as a shutdown request.
//!
//! Input is read on a dedicated OS thread. A blocking read cannot be
//! cancelled, so the thread is never joined: unsubscribing only stops it from
//! forwarding, and process exit takes it down with everything else.

use std::io::{self, BufRead, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::event::{DaemonEvent, ScreenSignal};

/// Delivers screen transitions into the daemon's event channel.
pub trait ScreenEventSource: Send {
    fn subscribe(&mut self, tx: mpsc::Sender<DaemonEvent>) -> Result<()>;
    /// Stops delivery. Safe to call when not subscribed.
    fn unsubscribe(&mut self);
}

/// Parses one protocol line. `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str) -> Result<Option<ScreenSignal>> {
    let token = line.trim();
    if token.is_empty() || token.starts_with('#') {
        return Ok(None);
    }
    let signal = match token.to_ascii_lowercase().as_str() {
        "on" | "screen_on" => ScreenSignal::On,
        "off" | "screen_off" => ScreenSignal::Off,
        "present" | "user_present" => ScreenSignal::UserPresent,
        other => bail!("unknown screen event '{other}'"),
    };
    Ok(Some(signal))
}

/// Reads screen events line by line from `R` on its own thread.
pub struct LineSource<R> {
    /// Taken by the reader thread on subscribe.
    reader: Option<R>,
    stop: Option<Arc<AtomicBool>>,
}

impl LineSource<BufReader<io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(io::stdin()))
    }
}

impl<R: BufRead + Send + 'static> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
            stop: None,
        }
    }
}

impl<R: BufRead + Send + 'static> ScreenEventSource for LineSource<R> {
    fn subscribe(&mut self, tx: mpsc::Sender<DaemonEvent>) -> Result<()> {
        let Some(reader) = self.reader.take() else {
            bail!("screen event source can only be subscribed once");
        };
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        std::thread::Builder::new()
            .name("screen-events".into())
            .spawn(move || forward_lines(reader, &tx, &thread_stop))
            .context("Failed to spawn screen event thread")?;
        self.stop = Some(stop);
        tracing::debug!("Screen state source registered");
        Ok(())
    }

    fn unsubscribe(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop.store(true, Ordering::Relaxed);
            tracing::debug!("Screen state source unregistered");
        }
    }
}

/// Forwards parsed lines from `reader` until end of input, until `stop` is
/// set, or until the receiver is gone. Sends `Shutdown` on end of input.
fn forward_lines<R: BufRead>(reader: R, tx: &mpsc::Sender<DaemonEvent>, stop: &AtomicBool) {
    for line in reader.lines() {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Failed to read screen events: {e}");
                break;
            }
        };
        match parse_line(&line) {
            Ok(Some(signal)) => {
                let event = DaemonEvent::Screen {
                    signal,
                    at: Instant::now(),
                };
                if tx.blocking_send(event).is_err() {
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Ignoring input line: {e}"),
        }
    }
    if stop.load(Ordering::Relaxed) {
        return;
    }
    tracing::info!("Screen event input closed");
    let _ = tx.blocking_send(DaemonEvent::Shutdown);
}
