//! Scroll-aware debouncing of the text layer alignment pass
//!
//! Measuring every run of a page is expensive. While the user scrolls the pass
//! is postponed; once the page has been idle for longer than the debounce
//! window it runs exactly once.
//!
//! The timer is a single slot: arming a new timer cancels the pending one, so a
//! page never has more than one timer in flight.

use crate::clock::Timestamp;
use std::time::Duration;

/// Default debounce window (200ms)
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(200);

/// Outcome of triggering or polling a [`DebounceTimer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceDecision {
    /// The page is idle: run the pass now
    RunNow,

    /// The user scrolled recently: a timer was armed for `due`
    Deferred { due: Timestamp },
}

/// Debounce timer statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebounceStats {
    /// Timers armed
    pub timers_armed: u64,

    /// Pending timers cancelled before firing
    pub timers_cancelled: u64,

    /// Timers that reached their due time
    pub timers_fired: u64,

    /// Decisions to run the pass
    pub runs: u64,
}

/// Single-slot one-shot timer with replace-on-reschedule semantics
#[derive(Debug)]
pub struct DebounceTimer {
    window: Duration,
    /// Due time of the armed timer
    pending: Option<Timestamp>,
    stats: DebounceStats,
}

impl DebounceTimer {
    /// Create a timer with the given debounce window
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            stats: DebounceStats::default(),
        }
    }

    /// The debounce window
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether the page counts as idle at `now`
    ///
    /// A page that has never been scrolled is idle. Otherwise the time since
    /// the last scroll must strictly exceed the window.
    pub fn is_idle(&self, now: Timestamp, last_scroll: Option<Timestamp>) -> bool {
        match last_scroll {
            None => true,
            Some(scrolled_at) => now.saturating_duration_since(scrolled_at) > self.window,
        }
    }

    /// Request the pass
    ///
    /// Returns [`DebounceDecision::RunNow`] when the page is idle (dropping any
    /// pending timer, since the caller is about to run the pass itself).
    /// Otherwise arms a timer for `now + window`, replacing the pending one.
    pub fn trigger(&mut self, now: Timestamp, last_scroll: Option<Timestamp>) -> DebounceDecision {
        if self.is_idle(now, last_scroll) {
            self.cancel();
            self.stats.runs += 1;
            tracing::debug!(now = now.as_millis(), "debounce: page idle, running now");
            return DebounceDecision::RunNow;
        }

        self.arm(now)
    }

    /// Fire the pending timer if it is due and re-evaluate the idle condition
    ///
    /// Returns `None` when no timer is pending or it is not due yet.
    pub fn poll(
        &mut self,
        now: Timestamp,
        last_scroll: Option<Timestamp>,
    ) -> Option<DebounceDecision> {
        let due = self.pending?;
        if now < due {
            return None;
        }

        self.pending = None;
        self.stats.timers_fired += 1;
        Some(self.trigger(now, last_scroll))
    }

    /// Cancel the pending timer, if any
    ///
    /// Returns `true` if a timer was pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(_) => {
                self.stats.timers_cancelled += 1;
                true
            }
            None => false,
        }
    }

    /// Due time of the pending timer
    pub fn pending_due(&self) -> Option<Timestamp> {
        self.pending
    }

    /// Whether a timer is pending
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn stats(&self) -> DebounceStats {
        self.stats
    }

    fn arm(&mut self, now: Timestamp) -> DebounceDecision {
        self.cancel();

        let due = now + self.window;
        self.pending = Some(due);
        self.stats.timers_armed += 1;
        tracing::debug!(due = due.as_millis(), "debounce: scrolling, timer armed");

        DebounceDecision::Deferred { due }
    }
}

impl Default for DebounceTimer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(millis: u64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    #[test]
    fn test_never_scrolled_runs_immediately() {
        let mut timer = DebounceTimer::default();
        assert_eq!(timer.trigger(ms(0), None), DebounceDecision::RunNow);
        assert!(!timer.is_pending());
        assert_eq!(timer.stats().runs, 1);
    }

    #[test]
    fn test_idle_page_runs_immediately() {
        let mut timer = DebounceTimer::default();
        let decision = timer.trigger(ms(1_000), Some(ms(700)));
        assert_eq!(decision, DebounceDecision::RunNow);
        assert_eq!(timer.stats().timers_armed, 0);
    }

    #[test]
    fn test_window_boundary_is_exclusive() {
        let timer = DebounceTimer::default();
        // Exactly the window since the last scroll is not idle yet.
        assert!(!timer.is_idle(ms(1_200), Some(ms(1_000))));
        assert!(timer.is_idle(ms(1_201), Some(ms(1_000))));
    }

    #[test]
    fn test_recent_scroll_arms_single_timer() {
        let mut timer = DebounceTimer::default();
        let decision = timer.trigger(ms(1_000), Some(ms(950)));

        assert_eq!(decision, DebounceDecision::Deferred { due: ms(1_200) });
        assert_eq!(timer.pending_due(), Some(ms(1_200)));
        assert_eq!(timer.stats().timers_armed, 1);
    }

    #[test]
    fn test_retrigger_replaces_pending_timer() {
        let mut timer = DebounceTimer::default();
        let scroll = Some(ms(950));

        timer.trigger(ms(1_000), scroll);
        assert_eq!(timer.pending_due(), Some(ms(1_200)));

        let decision = timer.trigger(ms(1_100), scroll);
        assert_eq!(decision, DebounceDecision::Deferred { due: ms(1_300) });
        assert_eq!(timer.pending_due(), Some(ms(1_300)));

        let stats = timer.stats();
        assert_eq!(stats.timers_armed, 2);
        assert_eq!(stats.timers_cancelled, 1);
    }

    #[test]
    fn test_replaced_timer_runs_exactly_once_after_window() {
        let mut timer = DebounceTimer::default();
        let scroll = Some(ms(950));

        timer.trigger(ms(1_000), scroll);
        timer.trigger(ms(1_100), scroll);

        // The replaced timer's due time passes without effect.
        assert_eq!(timer.poll(ms(1_200), scroll), None);
        assert_eq!(timer.poll(ms(1_299), scroll), None);

        assert_eq!(timer.poll(ms(1_300), scroll), Some(DebounceDecision::RunNow));
        assert_eq!(timer.poll(ms(1_500), scroll), None);

        let stats = timer.stats();
        assert_eq!(stats.timers_fired, 1);
        assert_eq!(stats.runs, 1);
    }

    #[test]
    fn test_poll_rearms_while_still_scrolling() {
        let mut timer = DebounceTimer::default();

        timer.trigger(ms(1_000), Some(ms(990)));
        // The user kept scrolling; at fire time the page is still busy.
        let decision = timer.poll(ms(1_200), Some(ms(1_150)));
        assert_eq!(decision, Some(DebounceDecision::Deferred { due: ms(1_400) }));
        assert!(timer.is_pending());

        let decision = timer.poll(ms(1_400), Some(ms(1_150)));
        assert_eq!(decision, Some(DebounceDecision::RunNow));
    }

    #[test]
    fn test_run_now_drops_pending_timer() {
        let mut timer = DebounceTimer::default();
        timer.trigger(ms(1_000), Some(ms(950)));
        assert!(timer.is_pending());

        assert_eq!(timer.trigger(ms(2_000), Some(ms(950))), DebounceDecision::RunNow);
        assert!(!timer.is_pending());
        assert_eq!(timer.stats().timers_cancelled, 1);
        // The dropped timer never fires.
        assert_eq!(timer.poll(ms(5_000), Some(ms(950))), None);
    }

    #[test]
    fn test_cancel_without_pending() {
        let mut timer = DebounceTimer::new(Duration::from_millis(50));
        assert!(!timer.cancel());
        assert_eq!(timer.window(), Duration::from_millis(50));
    }
}
