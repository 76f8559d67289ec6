//! Converts the time to the next alarm into a pulse plan.

use std::time::Duration;

use chrono::TimeDelta;

use crate::error::AlarmError;
use crate::haptics::PulseKind;

/// Pulse counts for the three countdown stages, played in field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencePlan {
    /// Whole hours. Unbounded: two days away is 48 strong pulses.
    pub hours: u64,
    /// Whole fifteen-minute blocks in the remaining part hour, at most 3.
    pub quarter_blocks: u8,
    /// Leftover whole minutes, at most 14.
    pub minute_blocks: u8,
}

impl SequencePlan {
    pub fn total_pulses(&self) -> u64 {
        self.hours + u64::from(self.quarter_blocks) + u64::from(self.minute_blocks)
    }
}

/// What to play for one recognized gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Playback {
    /// Play the three-stage countdown.
    Countdown(SequencePlan),
    /// Play one pulse and stop.
    Corrective { pulse: PulseKind, reason: String },
}

/// Splits `remaining` into hours, quarter-hour blocks and minutes.
/// Seconds below a whole minute are dropped.
pub fn compose(remaining: Duration) -> SequencePlan {
    let total_minutes = remaining.as_secs() / 60;
    let hours = total_minutes / 60;
    let rem = total_minutes % 60;
    SequencePlan {
        hours,
        quarter_blocks: (rem / 15) as u8,
        minute_blocks: (rem % 15) as u8,
    }
}

/// Decides between a countdown and a single corrective pulse.
pub fn plan_playback(lookup: Result<TimeDelta, AlarmError>) -> Playback {
    match lookup {
        Err(e) => Playback::Corrective {
            pulse: e.corrective_pulse(),
            reason: e.to_string(),
        },
        Ok(delta) if delta <= TimeDelta::zero() => Playback::Corrective {
            pulse: PulseKind::Strong,
            reason: "alarm is already due".to_string(),
        },
        // A positive delta always converts.
        Ok(delta) => Playback::Countdown(compose(delta.to_std().unwrap_or_default())),
    }
}
