//! Plays the time to the next alarm as three back-to-back pulse stages.
//!
//! A cycle acquires the wake lock, asks the [`AlarmQuery`] how long is left,
//! and then either plays one corrective pulse or walks the stage states
//! `RunningHours → RunningQuarters → RunningMinutes → Done`, one
//! [`run_stage`] per state. The wake lock is acquired once per cycle and its
//! guard released when the cycle ends, whichever path it took.
//!
//! Countdowns may overlap when gestures repeat. Each one is numbered, and only
//! the newest may publish [`PlayerState`], so an older cycle finishing never
//! reports `Done` over a newer one still playing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use tokio::sync::watch;

use crate::alarm::AlarmQuery;
use crate::composer::{plan_playback, Playback, SequencePlan};
use crate::config::Timing;
use crate::error::AlarmError;
use crate::haptics::{Haptics, PulseKind};
use crate::scheduler::{run_stage, Stage};
use crate::wake_lock::{WakeLock, WakeLockGuard};

/// Which countdown stage is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    RunningHours,
    RunningQuarters,
    RunningMinutes,
    Done,
}

impl PlayerState {
    fn next(self) -> Self {
        match self {
            PlayerState::Idle => PlayerState::RunningHours,
            PlayerState::RunningHours => PlayerState::RunningQuarters,
            PlayerState::RunningQuarters => PlayerState::RunningMinutes,
            PlayerState::RunningMinutes | PlayerState::Done => PlayerState::Done,
        }
    }

    pub fn is_running(self) -> bool {
        matches!(
            self,
            PlayerState::RunningHours | PlayerState::RunningQuarters | PlayerState::RunningMinutes
        )
    }

    /// The stage played in this state, or `None` outside the running states.
    fn stage(self, plan: &SequencePlan, timing: &Timing) -> Option<Stage> {
        let (kind, count, post_stage) = match self {
            PlayerState::RunningHours => (PulseKind::Strong, plan.hours, timing.inter_stage),
            PlayerState::RunningQuarters => (
                PulseKind::Medium,
                u64::from(plan.quarter_blocks),
                timing.inter_stage,
            ),
            PlayerState::RunningMinutes => {
                (PulseKind::Light, u64::from(plan.minute_blocks), Duration::ZERO)
            }
            PlayerState::Idle | PlayerState::Done => return None,
        };
        Some(Stage {
            kind,
            count,
            inter_pulse: timing.inter_pulse,
            post_stage,
        })
    }
}

/// State as last published, tagged with the cycle that published it.
#[derive(Debug, Clone, Copy)]
struct Published {
    cycle: u64,
    state: PlayerState,
}

/// Outcome of one detection-to-playback cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackReport {
    pub playback: Playback,
    /// 3 for every countdown, 0 for a corrective pulse.
    pub stages_completed: u8,
}

pub struct SequencePlayer {
    haptics: Arc<dyn Haptics>,
    wake_lock: Arc<WakeLock>,
    alarms: Arc<dyn AlarmQuery>,
    state: watch::Sender<Published>,
    last_cycle: AtomicU64,
}

impl SequencePlayer {
    pub fn new(
        haptics: Arc<dyn Haptics>,
        wake_lock: Arc<WakeLock>,
        alarms: Arc<dyn AlarmQuery>,
    ) -> Self {
        let (state, _) = watch::channel(Published {
            cycle: 0,
            state: PlayerState::Idle,
        });
        Self {
            haptics,
            wake_lock,
            alarms,
            state,
            last_cycle: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state.borrow().state
    }

    /// Runs one full cycle: lock, query, pulse, unlock.
    pub async fn notify_time_to_next_alarm(&self, timing: Timing) -> PlaybackReport {
        let guard = self.wake_lock.acquire(timing.wake_lock_max_hold);
        tracing::debug!(generation = guard.generation(), "Querying next alarm");
        let playback = plan_playback(self.query_alarm().await);

        let stages_completed = match &playback {
            Playback::Corrective { pulse, reason } => {
                tracing::info!(%pulse, "No countdown: {reason}");
                self.haptics.pulse(*pulse);
                guard.release();
                0
            }
            Playback::Countdown(plan) => {
                tracing::info!(
                    hours = plan.hours,
                    quarters = plan.quarter_blocks,
                    minutes = plan.minute_blocks,
                    pulses = plan.total_pulses(),
                    "Playing time to next alarm"
                );
                self.play(*plan, timing, guard).await
            }
        };

        PlaybackReport {
            playback,
            stages_completed,
        }
    }

    /// Plays the three stages of `plan` in order while `guard` keeps the device
    /// awake, then releases it. Returns the number of stages completed.
    pub async fn play(&self, plan: SequencePlan, timing: Timing, guard: WakeLockGuard) -> u8 {
        let cycle = self.last_cycle.fetch_add(1, Ordering::Relaxed) + 1;
        let mut state = PlayerState::Idle.next();
        let mut completed = 0;
        while let Some(stage) = state.stage(&plan, &timing) {
            self.publish(cycle, state);
            tracing::debug!(cycle, ?state, count = stage.count, duration = ?stage.duration(), "Stage started");
            run_stage(self.haptics.as_ref(), stage).await;
            completed += 1;
            state = state.next();
        }
        self.publish(cycle, state);
        guard.release();
        tracing::debug!(cycle, "Countdown finished");
        completed
    }

    /// Publishes `state` unless a newer cycle has already published.
    fn publish(&self, cycle: u64, state: PlayerState) {
        let published = self.state.send_if_modified(|current| {
            if cycle < current.cycle {
                return false;
            }
            *current = Published { cycle, state };
            true
        });
        if !published {
            tracing::debug!(cycle, ?state, "Superseded countdown, state not published");
        }
    }

    async fn query_alarm(&self) -> Result<TimeDelta, AlarmError> {
        let alarms = Arc::clone(&self.alarms);
        match tokio::task::spawn_blocking(move || alarms.remaining_to_next_alarm()).await {
            Ok(result) => result,
            Err(e) => Err(AlarmError::QueryFailed(format!("alarm query task failed: {e}"))),
        }
    }
}
