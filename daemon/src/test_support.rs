//! In-memory doubles for the platform seams.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::TimeDelta;
use tokio::time::Instant;

use crate::alarm::AlarmQuery;
use crate::error::AlarmError;
use crate::haptics::{Haptics, PulseKind, WakeLockBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Pulse(PulseKind),
    Acquire(Duration),
    Release,
}

/// Records every haptic and wake-lock call with the (possibly paused) time it happened.
#[derive(Default)]
pub struct Recorder {
    calls: Mutex<Vec<(Call, Instant)>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().iter().map(|(c, _)| *c).collect()
    }

    pub fn pulses(&self) -> Vec<PulseKind> {
        self.pulse_times().into_iter().map(|(k, _)| k).collect()
    }

    pub fn pulse_times(&self) -> Vec<(PulseKind, Instant)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(c, at)| match c {
                Call::Pulse(kind) => Some((*kind, *at)),
                _ => None,
            })
            .collect()
    }

    pub fn acquires(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::Acquire(_))).count()
    }

    pub fn releases(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::Release)).count()
    }

    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push((call, Instant::now()));
    }
}

impl Haptics for Recorder {
    fn pulse(&self, kind: PulseKind) {
        self.push(Call::Pulse(kind));
    }
}

impl WakeLockBackend for Recorder {
    fn acquire(&self, max_hold: Duration) {
        self.push(Call::Acquire(max_hold));
    }

    fn release(&self) {
        self.push(Call::Release);
    }
}

/// Answers every query with the same result.
pub struct FixedAlarm(pub Result<TimeDelta, AlarmError>);

impl AlarmQuery for FixedAlarm {
    fn remaining_to_next_alarm(&self) -> Result<TimeDelta, AlarmError> {
        self.0.clone()
    }
}
