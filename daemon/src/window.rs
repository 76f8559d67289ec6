use std::collections::VecDeque;

use tokio::time::Instant;

/// Number of screen events retained for gesture matching.
pub const WINDOW_CAPACITY: usize = 10;

/// A single screen on/off transition. Never mutated after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenEvent {
    pub is_on: bool,
    /// Monotonic time at which the transition was observed.
    pub timestamp: Instant,
}

/// Bounded FIFO of recent [`ScreenEvent`]s.
///
/// Holds at most `capacity` events. When full, the oldest event is evicted to
/// make room for the newest.
#[derive(Debug)]
pub struct EventWindow {
    events: VecDeque<ScreenEvent>,
    capacity: usize,
}

impl Default for EventWindow {
    fn default() -> Self {
        Self::new(WINDOW_CAPACITY)
    }
}

impl EventWindow {
    /// Creates an empty window. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends an event, evicting the oldest if the window is at capacity.
    pub fn push(&mut self, event: ScreenEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Returns the most recent `n` events in chronological order, or `None`
    /// if fewer than `n` have been recorded.
    pub fn recent(&self, n: usize) -> Option<impl Iterator<Item = &ScreenEvent>> {
        let len = self.events.len();
        if len < n {
            return None;
        }
        Some(self.events.range(len - n..))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn make_event(base: Instant, offset_ms: u64, is_on: bool) -> ScreenEvent {
        ScreenEvent {
            is_on,
            timestamp: base + Duration::from_millis(offset_ms),
        }
    }

    // ── push / eviction ───────────────────────────────────────────────────────

    #[test]
    fn push_does_not_exceed_capacity() {
        let base = Instant::now();
        let mut w = EventWindow::default();
        for i in 0..(WINDOW_CAPACITY as u64 * 3) {
            w.push(make_event(base, i, i % 2 == 0));
            assert!(w.len() <= WINDOW_CAPACITY);
        }
        assert_eq!(w.len(), WINDOW_CAPACITY);
    }

    #[test]
    fn push_evicts_oldest_event() {
        let base = Instant::now();
        let mut w = EventWindow::new(4);
        for i in 0..7u64 {
            w.push(make_event(base, i, true));
        }
        // Offsets 0, 1, 2 were evicted; 3 is now the oldest.
        let kept: Vec<Instant> = w.recent(w.len()).unwrap().map(|e| e.timestamp).collect();
        assert_eq!(kept.first(), Some(&(base + Duration::from_millis(3))));
        assert_eq!(kept.last(), Some(&(base + Duration::from_millis(6))));
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let base = Instant::now();
        let mut w = EventWindow::new(0);
        w.push(make_event(base, 0, true));
        w.push(make_event(base, 1, false));
        assert_eq!(w.len(), 1);
        assert!(!w.recent(1).unwrap().next().unwrap().is_on);
    }

    // ── recent ────────────────────────────────────────────────────────────────

    #[test]
    fn recent_requires_enough_events() {
        let base = Instant::now();
        let mut w = EventWindow::default();
        for i in 0..4u64 {
            w.push(make_event(base, i, true));
        }
        assert!(w.recent(5).is_none());
        assert_eq!(w.recent(4).unwrap().count(), 4);
    }

    #[test]
    fn recent_returns_tail_in_chronological_order() {
        let base = Instant::now();
        let mut w = EventWindow::default();
        for i in 0..8u64 {
            w.push(make_event(base, i, i % 2 == 0));
        }
        let tail: Vec<u64> = w
            .recent(3)
            .unwrap()
            .map(|e| (e.timestamp - base).as_millis() as u64)
            .collect();
        assert_eq!(tail, vec![5, 6, 7]);
    }

    #[test]
    fn recent_does_not_remove_items() {
        let base = Instant::now();
        let mut w = EventWindow::default();
        w.push(make_event(base, 0, true));
        let _ = w.recent(1).unwrap().count();
        assert_eq!(w.len(), 1);
    }

    // ── clear ─────────────────────────────────────────────────────────────────

    #[test]
    fn clear_then_push_starts_fresh() {
        let base = Instant::now();
        let mut w = EventWindow::default();
        for i in 0..5u64 {
            w.push(make_event(base, i, true));
        }
        w.clear();
        assert!(w.is_empty());
        w.push(make_event(base, 9, false));
        assert_eq!(w.len(), 1);
        assert!(!w.recent(1).unwrap().next().unwrap().is_on);
    }
}
