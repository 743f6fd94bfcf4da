use std::time::{Duration, Instant};

/// Default hold time before a press counts as a long-press.
pub const DEFAULT_LONG_PRESS: Duration = Duration::from_millis(700);

/// Gesture recognized on a bound element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Tap,
    LongPress,
}

/// Tap / long-press classifier for a single element.
///
/// Pure state machine driven by timestamps: the caller forwards pointer
/// events and calls `poll` from its event loop (see `deadline`) so the
/// long-press fires while the pointer is still down.
///
/// ```text
/// down ──(up before deadline)──→ Tap
///   │
///   └──(deadline reached)──→ LongPress, following up is swallowed
///   └──(leave)──→ nothing
/// ```
#[derive(Debug, Clone)]
pub struct GestureRecognizer {
    long_press: Duration,
    armed_at: Option<Instant>,
}

impl GestureRecognizer {
    pub fn new(long_press: Duration) -> Self {
        Self {
            long_press,
            armed_at: None,
        }
    }

    pub fn long_press(&self) -> Duration {
        self.long_press
    }

    pub fn is_armed(&self) -> bool {
        self.armed_at.is_some()
    }

    /// When `poll` should next be called, if a press is pending.
    pub fn deadline(&self) -> Option<Instant> {
        self.armed_at.map(|t| t + self.long_press)
    }

    pub fn pointer_down(&mut self, now: Instant) {
        self.armed_at = Some(now);
    }

    /// Fires `LongPress` once the hold time has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<Gesture> {
        let deadline = self.deadline()?;
        if now >= deadline {
            self.armed_at = None;
            return Some(Gesture::LongPress);
        }
        None
    }

    pub fn pointer_up(&mut self, now: Instant) -> Option<Gesture> {
        let deadline = self.deadline()?;
        self.armed_at = None;
        if now >= deadline {
            // The timer would have fired before this release.
            Some(Gesture::LongPress)
        } else {
            Some(Gesture::Tap)
        }
    }

    /// Abort a pending press without firing anything.
    pub fn pointer_leave(&mut self) {
        self.armed_at = None;
    }
}

impl Default for GestureRecognizer {
    fn default() -> Self {
        Self::new(DEFAULT_LONG_PRESS)
    }
}
