use std::time::Duration;

use tokio::time::sleep;

use crate::haptics::{Haptics, PulseKind};

/// One countdown stage: `count` pulses of `kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub kind: PulseKind,
    pub count: u64,
    /// Pause after every pulse.
    pub inter_pulse: Duration,
    /// Extra pause once all pulses are played, or the only pause of an empty stage.
    pub post_stage: Duration,
}

impl Stage {
    /// Time from the first pulse until the stage completes.
    pub fn duration(&self) -> Duration {
        let pulses = u32::try_from(self.count).unwrap_or(u32::MAX);
        self.inter_pulse.saturating_mul(pulses) + self.post_stage
    }
}

/// Plays one stage and returns when it is complete. Holds no state across stages.
///
/// An empty stage still waits `post_stage`, so stage boundaries stay perceptible.
pub async fn run_stage(haptics: &dyn Haptics, stage: Stage) {
    for _ in 0..stage.count {
        haptics.pulse(stage.kind);
        sleep(stage.inter_pulse).await;
    }
    if !stage.post_stage.is_zero() {
        sleep(stage.post_stage).await;
    }
}
