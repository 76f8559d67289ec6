//! Screen on/off gesture recognizer.
//!
//! Every screen transition is appended to a bounded [`EventWindow`] and arms an
//! inactivity deadline. When the last five recorded transitions are exactly
//! on, off, on, off, on the gesture is recognized and the window is cleared.
//! A quiet period reaching the deadline, or the user unlocking the device,
//! clears the window without recognizing anything.
//!
//! The detector owns no timer task. It exposes [`PatternDetector::deadline`]
//! for the event loop to sleep on and call [`PatternDetector::on_timeout`].
//! Recording an event past a deadline that was not yet delivered still clears
//! the window first, so a late timer can never merge two separate attempts.

use std::time::Duration;

use tokio::time::Instant;

use crate::window::{EventWindow, ScreenEvent};

/// Screen states that make up the gesture, oldest first.
pub const GESTURE: [bool; 5] = [true, false, true, false, true];

/// Result of feeding one screen transition to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// No gesture yet; the event was recorded.
    Pending,
    /// The gesture just completed. The window has already been cleared.
    Recognized,
}

#[derive(Debug)]
pub struct PatternDetector {
    window: EventWindow,
    /// When the pending inactivity timeout fires, if one is armed.
    deadline: Option<Instant>,
    inactivity_timeout: Duration,
}

impl PatternDetector {
    pub fn new(inactivity_timeout: Duration) -> Self {
        Self {
            window: EventWindow::default(),
            deadline: None,
            inactivity_timeout,
        }
    }

    pub fn on_screen_on(&mut self, now: Instant) -> Detection {
        self.record(true, now)
    }

    pub fn on_screen_off(&mut self, now: Instant) -> Detection {
        self.record(false, now)
    }

    /// Unconditional reset when the user unlocks the device.
    pub fn on_user_present(&mut self) {
        if !self.window.is_empty() {
            tracing::debug!(events = self.window.len(), "User present, gesture window reset");
        }
        self.reset();
    }

    /// Clears the window once the armed deadline has passed.
    /// Returns `true` if anything was cleared.
    pub fn on_timeout(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                tracing::debug!(events = self.window.len(), "Inactivity timeout, gesture window reset");
                self.reset();
                true
            }
            _ => false,
        }
    }

    /// Tests the last [`GESTURE`]-length events against the gesture.
    /// On a match the detector is reset before returning.
    pub fn check_pattern(&mut self) -> Detection {
        let Some(recent) = self.window.recent(GESTURE.len()) else {
            return Detection::Pending;
        };
        let matches = recent.zip(GESTURE.iter()).all(|(event, &on)| event.is_on == on);
        if !matches {
            return Detection::Pending;
        }
        tracing::info!("Screen gesture recognized");
        self.reset();
        Detection::Recognized
    }

    /// Clears the window and disarms the inactivity deadline.
    pub fn reset(&mut self) {
        self.window.clear();
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[cfg(test)]
    pub fn window(&self) -> &EventWindow {
        &self.window
    }

    /// Applies to deadlines armed from now on.
    pub fn set_inactivity_timeout(&mut self, timeout: Duration) {
        self.inactivity_timeout = timeout;
    }

    fn record(&mut self, is_on: bool, now: Instant) -> Detection {
        self.on_timeout(now);
        self.window.push(ScreenEvent { is_on, timestamp: now });
        self.deadline = Some(now + self.inactivity_timeout);
        tracing::debug!(is_on, events = self.window.len(), "Screen event recorded");
        self.check_pattern()
    }
}
