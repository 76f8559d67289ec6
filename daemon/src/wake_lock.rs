//! Process-wide wake lock with force-reacquire semantics.
//!
//! Each [`WakeLock::acquire`] releases any lock still held and hands out a
//! [`WakeLockGuard`] stamped with a fresh generation. A guard only releases the
//! backend lock if its generation is still current, so a playback whose lock
//! was taken over (or force-released on unregister) cannot release somebody
//! else's hold. Every backend `acquire` is therefore matched by exactly one
//! backend `release`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::haptics::WakeLockBackend;

#[derive(Debug)]
struct Hold {
    generation: u64,
    acquired_at: Instant,
    max_hold: Duration,
}

pub struct WakeLock {
    backend: Arc<dyn WakeLockBackend>,
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    next_generation: u64,
    hold: Option<Hold>,
}

impl WakeLock {
    pub fn new(backend: Arc<dyn WakeLockBackend>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            state: Mutex::new(State::default()),
        })
    }

    /// Acquires the lock for at most `max_hold`, first releasing any prior hold.
    pub fn acquire(self: &Arc<Self>, max_hold: Duration) -> WakeLockGuard {
        let mut state = self.lock_state();
        if let Some(prior) = state.hold.take() {
            tracing::debug!(generation = prior.generation, "Force-releasing previous wake lock");
            self.release_hold(prior);
        }
        let generation = state.next_generation;
        state.next_generation += 1;
        self.backend.acquire(max_hold);
        state.hold = Some(Hold {
            generation,
            acquired_at: Instant::now(),
            max_hold,
        });
        tracing::debug!(generation, ?max_hold, "Wake lock acquired");
        WakeLockGuard {
            lock: Arc::clone(self),
            generation,
            released: false,
        }
    }

    /// Releases whatever is held and invalidates every outstanding guard.
    pub fn force_release(&self) {
        if let Some(hold) = self.lock_state().hold.take() {
            self.release_hold(hold);
        }
    }

    pub fn is_held(&self) -> bool {
        self.lock_state().hold.is_some()
    }

    fn release_generation(&self, generation: u64) {
        let mut state = self.lock_state();
        match state.hold.take_if(|h| h.generation == generation) {
            Some(hold) => self.release_hold(hold),
            None => tracing::debug!(generation, "Stale wake lock guard dropped"),
        }
    }

    fn release_hold(&self, hold: Hold) {
        let held_for = hold.acquired_at.elapsed();
        if held_for > hold.max_hold {
            tracing::warn!(
                ?held_for,
                max_hold = ?hold.max_hold,
                "Wake lock held past its ceiling; the platform may have reclaimed it"
            );
        }
        self.backend.release();
        tracing::debug!(generation = hold.generation, "Wake lock released");
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases its wake lock when dropped, unless it has been superseded.
#[must_use = "dropping the guard releases the wake lock immediately"]
pub struct WakeLockGuard {
    lock: Arc<WakeLock>,
    generation: u64,
    released: bool,
}

impl WakeLockGuard {
    pub fn release(mut self) {
        self.release_once();
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.lock.release_generation(self.generation);
        }
    }
}

impl Drop for WakeLockGuard {
    fn drop(&mut self) {
        self.release_once();
    }
}
