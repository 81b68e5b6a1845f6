//! Text Layer Scheduler Library
//!
//! Cooperative, single-threaded scheduling primitives for the text overlay.
//!
//! The expensive alignment pass of a page's text layer must not run while the
//! user is scrolling. This crate provides the pieces that decide *when* that
//! pass runs:
//! - [`Timestamp`] / [`Clock`]: monotonic clock readings passed around as plain
//!   snapshots
//! - [`DebounceTimer`]: a single-slot, replace-on-reschedule one-shot timer
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use textlayer_scheduler::{DebounceDecision, DebounceTimer, Timestamp};
//!
//! let mut timer = DebounceTimer::new(Duration::from_millis(200));
//!
//! // The user scrolled 50ms ago: the pass is deferred.
//! let now = Timestamp::from_millis(1_000);
//! let last_scroll = Some(Timestamp::from_millis(950));
//! assert!(matches!(timer.trigger(now, last_scroll), DebounceDecision::Deferred { .. }));
//!
//! // Nothing is due yet.
//! assert!(timer.poll(Timestamp::from_millis(1_100), last_scroll).is_none());
//!
//! // Once the window has elapsed without scrolling the pass runs.
//! let decision = timer.poll(Timestamp::from_millis(1_200), last_scroll);
//! assert_eq!(decision, Some(DebounceDecision::RunNow));
//! ```

mod clock;
mod debounce;

// Re-export public API
pub use clock::{Clock, ManualClock, MonotonicClock, Timestamp};
pub use debounce::{DebounceDecision, DebounceStats, DebounceTimer, DEFAULT_DEBOUNCE_WINDOW};
