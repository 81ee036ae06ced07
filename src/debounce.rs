//! Debounced applier - single-shot, non-resetting coalescing of apply requests
//!
//! A burst of value changes (slider drags, scroll nudges) must reach the
//! hardware at most once per window, carrying the newest value.
//!
//! ## State machine
//!
//! ```text
//! Idle ──request──▶ Scheduled{deadline = now + window}
//! Scheduled ──request──▶ Scheduled (payload replaced, deadline unchanged)
//! Scheduled ──deadline reached──▶ Idle (payload handed out once)
//! Scheduled ──cancel──▶ Idle (payload dropped)
//! Scheduled ──retarget──▶ Scheduled (payload replaced, deadline unchanged)
//! Idle ──retarget──▶ Idle
//! ```
//!
//! The deadline is anchored at the first request after quiescence and is
//! never pushed back, so a continuous flood still fires once per window.
//! The owner drives time: it sleeps until [`Debouncer::deadline`] and then
//! calls [`Debouncer::take_due`]. Only the owner cancels.

use std::time::Duration;
use tokio::time::Instant;

/// Default quiescence window in milliseconds
pub const DEFAULT_DEBOUNCE_MS: u64 = 600;

/// Current state of a [`Debouncer`]
#[derive(Debug, Clone, PartialEq)]
pub enum DebounceState<T> {
    Idle,
    Scheduled { deadline: Instant, payload: T },
}

/// Coalesces apply requests into one fire per window
#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    state: DebounceState<T>,
    /// Requests replaced by a newer one before firing
    superseded: u64,
    /// Number of payloads handed out by `take_due`
    fired: u64,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: DebounceState::Idle,
            superseded: 0,
            fired: 0,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a request.
    ///
    /// Returns `true` when this request started a new window, `false` when it
    /// replaced the payload of an already scheduled one.
    pub fn request(&mut self, payload: T, now: Instant) -> bool {
        match &mut self.state {
            DebounceState::Scheduled {
                payload: pending, ..
            } => {
                *pending = payload;
                self.superseded += 1;
                false
            }
            DebounceState::Idle => {
                self.state = DebounceState::Scheduled {
                    deadline: now + self.window,
                    payload,
                };
                true
            }
        }
    }

    /// Replace the pending payload without ever opening a window.
    ///
    /// Returns `true` when a payload was pending and has been replaced.
    pub fn retarget(&mut self, payload: T) -> bool {
        match &mut self.state {
            DebounceState::Scheduled {
                payload: pending, ..
            } => {
                *pending = payload;
                true
            }
            DebounceState::Idle => false,
        }
    }

    /// When the pending payload is due, if any
    pub fn deadline(&self) -> Option<Instant> {
        match &self.state {
            DebounceState::Scheduled { deadline, .. } => Some(*deadline),
            DebounceState::Idle => None,
        }
    }

    pub fn pending(&self) -> Option<&T> {
        match &self.state {
            DebounceState::Scheduled { payload, .. } => Some(payload),
            DebounceState::Idle => None,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self.state, DebounceState::Scheduled { .. })
    }

    /// Hand out the payload if its deadline has passed, returning to `Idle`
    pub fn take_due(&mut self, now: Instant) -> Option<T> {
        match &self.state {
            DebounceState::Scheduled { deadline, .. } if now >= *deadline => {}
            _ => return None,
        }

        match std::mem::replace(&mut self.state, DebounceState::Idle) {
            DebounceState::Scheduled { payload, .. } => {
                self.fired += 1;
                Some(payload)
            }
            DebounceState::Idle => None,
        }
    }

    /// Drop any pending payload without firing it
    pub fn cancel(&mut self) -> Option<T> {
        match std::mem::replace(&mut self.state, DebounceState::Idle) {
            DebounceState::Scheduled { payload, .. } => Some(payload),
            DebounceState::Idle => None,
        }
    }

    pub fn fired_count(&self) -> u64 {
        self.fired
    }

    pub fn superseded_count(&self) -> u64 {
        self.superseded
    }
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_DEBOUNCE_MS))
    }
}
