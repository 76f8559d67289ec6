//! The daemon's event loop.
//!
//! One task owns the [`PatternDetector`] and reacts to screen events, config
//! reloads, the inactivity deadline, and shutdown. A recognized gesture spawns
//! a playback task so screen events keep flowing while pulses play.
//!
//! Unregistering cancels the pending timeout and force-releases the wake lock,
//! but a playback that is already running is left to finish on its own.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant};

use crate::config::{Config, Timing};
use crate::detector::{Detection, PatternDetector};
use crate::event::{DaemonEvent, ScreenSignal};
use crate::player::{PlaybackReport, SequencePlayer};
use crate::source::ScreenEventSource;
use crate::wake_lock::WakeLock;

pub struct ScreenService {
    detector: PatternDetector,
    player: Arc<SequencePlayer>,
    wake_lock: Arc<WakeLock>,
    timing: Timing,
    playbacks: JoinSet<PlaybackReport>,
}

impl ScreenService {
    pub fn new(timing: Timing, player: Arc<SequencePlayer>, wake_lock: Arc<WakeLock>) -> Self {
        Self {
            detector: PatternDetector::new(timing.inactivity_timeout),
            player,
            wake_lock,
            timing,
            playbacks: JoinSet::new(),
        }
    }

    /// Registers `source`, processes events until shutdown, then unregisters.
    pub async fn run(
        mut self,
        source: &mut dyn ScreenEventSource,
        tx: mpsc::Sender<DaemonEvent>,
        mut rx: mpsc::Receiver<DaemonEvent>,
    ) -> Result<()> {
        source
            .subscribe(tx)
            .context("Failed to register screen event source")?;
        tracing::info!("Screen state receiver registered");

        loop {
            let deadline = self.detector.deadline();
            tokio::select! {
                // A timeout that is due wins over an event arriving at the same instant.
                biased;

                () = wait_for(deadline) => {
                    self.detector.on_timeout(Instant::now());
                }
                Some(joined) = self.playbacks.join_next(), if !self.playbacks.is_empty() => {
                    match joined {
                        Ok(report) => tracing::debug!(?report, "Playback finished"),
                        Err(e) => tracing::warn!("Playback task failed: {e}"),
                    }
                }
                evt = rx.recv() => {
                    let Some(evt) = evt else { break };
                    match evt {
                        DaemonEvent::Screen { signal, at } => self.on_screen(signal, at),
                        DaemonEvent::ConfigReloaded(config) => self.apply_config(&config),
                        DaemonEvent::Shutdown => break,
                    }
                }
            }
        }

        self.unregister(source);
        Ok(())
    }

    fn on_screen(&mut self, signal: ScreenSignal, at: Instant) {
        let detection = match signal {
            ScreenSignal::On => self.detector.on_screen_on(at),
            ScreenSignal::Off => self.detector.on_screen_off(at),
            ScreenSignal::UserPresent => {
                self.detector.on_user_present();
                Detection::Pending
            }
        };
        if detection == Detection::Recognized {
            let player = Arc::clone(&self.player);
            let timing = self.timing;
            self.playbacks
                .spawn(async move { player.notify_time_to_next_alarm(timing).await });
        }
    }

    fn apply_config(&mut self, config: &Config) {
        let timing = config.timing.resolve();
        if timing != self.timing {
            tracing::info!(?timing, "Timing updated");
        }
        self.detector.set_inactivity_timeout(timing.inactivity_timeout);
        self.timing = timing;
    }

    fn unregister(mut self, source: &mut dyn ScreenEventSource) {
        source.unsubscribe();
        self.detector.reset();
        if self.wake_lock.is_held() {
            tracing::debug!("Releasing wake lock held at shutdown");
        }
        self.wake_lock.force_release();
        if self.player.state().is_running() {
            tracing::info!("Playback still running; it will finish on its own");
        }
        self.playbacks.detach_all();
        tracing::info!("Screen state receiver unregistered");
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AlarmError;
    use crate::haptics::PulseKind;
    use crate::test_support::{FixedAlarm, Recorder};
    use chrono::TimeDelta;
    use std::time::Duration;
    use tokio::task::JoinHandle;

    /// Source that only records registration; tests push events directly.
    #[derive(Default)]
    struct ManualSource {
        subscribed: bool,
        unsubscribed: bool,
    }

    impl ScreenEventSource for ManualSource {
        fn subscribe(&mut self, _tx: mpsc::Sender<DaemonEvent>) -> Result<()> {
            self.subscribed = true;
            Ok(())
        }

        fn unsubscribe(&mut self) {
            self.unsubscribed = true;
        }
    }

    struct Harness {
        rec: Arc<Recorder>,
        lock: Arc<WakeLock>,
        tx: mpsc::Sender<DaemonEvent>,
        service: JoinHandle<ManualSource>,
    }

    fn start(lookup: Result<TimeDelta, AlarmError>) -> Harness {
        let rec = Recorder::new();
        let lock = WakeLock::new(rec.clone());
        let player = Arc::new(SequencePlayer::new(
            rec.clone(),
            Arc::clone(&lock),
            Arc::new(FixedAlarm(lookup)),
        ));
        let service = ScreenService::new(Timing::default(), player, Arc::clone(&lock));
        let (tx, rx) = mpsc::channel(32);
        let loop_tx = tx.clone();
        let handle = tokio::spawn(async move {
            let mut source = ManualSource::default();
            service.run(&mut source, loop_tx, rx).await.unwrap();
            source
        });
        Harness {
            rec,
            lock,
            tx,
            service: handle,
        }
    }

    async fn send(h: &Harness, signal: ScreenSignal) {
        h.tx.send(DaemonEvent::Screen {
            signal,
            at: Instant::now(),
        })
        .await
        .unwrap();
        tokio::task::yield_now().await;
    }

    async fn gesture(h: &Harness) {
        for on in crate::detector::GESTURE {
            send(h, if on { ScreenSignal::On } else { ScreenSignal::Off }).await;
            tokio::time::sleep(Duration::from_millis(800)).await;
        }
    }

    /// Waits until the recorder has seen `n` wake-lock releases.
    async fn wait_for_releases(h: &Harness, n: usize) {
        for _ in 0..600 {
            if h.rec.releases() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("expected {n} wake lock releases, saw {}", h.rec.releases());
    }

    async fn shutdown(h: Harness) -> ManualSource {
        h.tx.send(DaemonEvent::Shutdown).await.unwrap();
        h.service.await.unwrap()
    }

    // ── gesture to playback ───────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn gesture_plays_countdown() {
        let h = start(Ok(TimeDelta::minutes(47)));
        gesture(&h).await;
        wait_for_releases(&h, 1).await;

        use PulseKind::*;
        assert_eq!(h.rec.pulses(), vec![Medium, Medium, Medium, Light, Light]);
        assert_eq!(h.rec.acquires(), 1);
        shutdown(h).await;
    }

    #[tokio::test(start_paused = true)]
    async fn no_alarm_plays_single_light_pulse() {
        let h = start(Err(AlarmError::NoAlarmSet));
        gesture(&h).await;
        wait_for_releases(&h, 1).await;
        assert_eq!(h.rec.pulses(), vec![PulseKind::Light]);
        shutdown(h).await;
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_gesture_retriggers() {
        let h = start(Err(AlarmError::NoAlarmSet));
        gesture(&h).await;
        wait_for_releases(&h, 1).await;
        gesture(&h).await;
        wait_for_releases(&h, 2).await;
        assert_eq!(h.rec.pulses().len(), 2);
        assert_eq!(h.rec.acquires(), h.rec.releases());
        shutdown(h).await;
    }

    // ── resets ────────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn inactivity_gap_splits_attempts() {
        let h = start(Err(AlarmError::NoAlarmSet));
        send(&h, ScreenSignal::On).await;
        send(&h, ScreenSignal::Off).await;
        send(&h, ScreenSignal::On).await;
        send(&h, ScreenSignal::Off).await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        send(&h, ScreenSignal::On).await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(h.rec.calls().is_empty());
        shutdown(h).await;
    }

    #[tokio::test(start_paused = true)]
    async fn user_present_resets_attempt() {
        let h = start(Err(AlarmError::NoAlarmSet));
        send(&h, ScreenSignal::On).await;
        send(&h, ScreenSignal::Off).await;
        send(&h, ScreenSignal::On).await;
        send(&h, ScreenSignal::UserPresent).await;
        send(&h, ScreenSignal::Off).await;
        send(&h, ScreenSignal::On).await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(h.rec.calls().is_empty());
        shutdown(h).await;
    }

    #[tokio::test(start_paused = true)]
    async fn reloaded_timeout_applies_to_detection() {
        let h = start(Err(AlarmError::NoAlarmSet));
        let mut config = Config::default();
        config.timing.inactivity_timeout_ms = 2_000;
        h.tx.send(DaemonEvent::ConfigReloaded(config)).await.unwrap();

        send(&h, ScreenSignal::On).await;
        send(&h, ScreenSignal::Off).await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        send(&h, ScreenSignal::On).await;
        send(&h, ScreenSignal::Off).await;
        send(&h, ScreenSignal::On).await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        // Only three events fall inside the shortened window.
        assert!(h.rec.calls().is_empty());
        shutdown(h).await;
    }

    // ── unregister ────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn shutdown_unsubscribes_and_releases_lock() {
        let h = start(Ok(TimeDelta::hours(5)));
        gesture(&h).await;
        // The hour stage is still running.
        assert!(h.lock.is_held());

        let rec = Arc::clone(&h.rec);
        let lock = Arc::clone(&h.lock);
        let source = shutdown(h).await;

        assert!(source.subscribed);
        assert!(source.unsubscribed);
        assert!(!lock.is_held());
        assert_eq!(rec.acquires(), 1);
        assert_eq!(rec.releases(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn detached_playback_finishes_after_unregister() {
        // Five hours: five strong pulses, 500 ms apart from recognition.
        let h = start(Ok(TimeDelta::hours(5)));
        gesture(&h).await;
        let rec = Arc::clone(&h.rec);
        let lock = Arc::clone(&h.lock);
        let before = rec.pulses().len();
        assert!(before < 5);

        shutdown(h).await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        // The detached playback runs to its end; its stale guard releases nothing.
        assert_eq!(rec.pulses(), vec![PulseKind::Strong; 5]);
        assert!(rec.pulses().len() > before);
        assert!(!lock.is_held());
        assert_eq!(rec.acquires(), 1);
        assert_eq!(rec.releases(), 1);
    }
}
