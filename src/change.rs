//! Baseline comparison and persistence-windowed change detection.
//!
//! [`diff`] is a pure comparison of a live count snapshot against the
//! baseline. [`PersistenceTimer`] suppresses one-frame flicker: an alarm is
//! only warranted when a deviation has been observed *continuously* for
//! longer than the configured persistence threshold.

use std::time::{Duration, Instant};

use crate::baseline::Baseline;
use crate::detect::CountSnapshot;

/// Structured diff between baseline and a live snapshot, recomputed per tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeRecord {
    pub changed: bool,
    /// Human-readable deviation descriptions, e.g. "bottle missing (1 -> 0)".
    pub details: Vec<String>,
}

impl ChangeRecord {
    pub fn summary(&self) -> String {
        self.details.join(", ")
    }
}

/// Compare a count snapshot against the baseline.
///
/// A class is *missing* iff its live count is below the baseline count, and
/// *appeared* iff its live count exceeds the baseline count (classes absent
/// from the baseline count as zero). No side effects.
pub fn diff(baseline: &Baseline, counts: &CountSnapshot) -> ChangeRecord {
    let mut details = Vec::new();

    for (class, &expected) in &baseline.0 {
        let actual = counts.get(class).copied().unwrap_or(0);
        if actual < expected {
            details.push(format!("{class} missing ({expected} -> {actual})"));
        }
    }

    for (class, &actual) in counts {
        let expected = baseline.expected(class);
        if actual > expected {
            details.push(format!("{class} appeared ({expected} -> {actual})"));
        }
    }

    ChangeRecord {
        changed: !details.is_empty(),
        details,
    }
}

/// Tracks how long a change has been continuously observed.
///
/// States: `Idle` (no window open) and `Open(start)`. The window resets on
/// any no-change tick, on firing, and whenever the system leaves the
/// monitoring state (callers invoke [`PersistenceTimer::reset`]).
#[derive(Debug)]
pub struct PersistenceTimer {
    threshold: Duration,
    window_start: Option<Instant>,
}

impl PersistenceTimer {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            window_start: None,
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn is_open(&self) -> bool {
        self.window_start.is_some()
    }

    /// Force the timer back to `Idle`.
    pub fn reset(&mut self) {
        self.window_start = None;
    }

    /// Advance the timer one tick. Returns `true` exactly when the change
    /// has persisted beyond the threshold (the window resets on firing, so a
    /// single unbroken run fires at most once).
    pub fn update(&mut self, changed: bool, now: Instant) -> bool {
        if !changed {
            self.window_start = None;
            return false;
        }
        match self.window_start {
            None => {
                self.window_start = Some(now);
                false
            }
            Some(start) => {
                if now.duration_since(start) > self.threshold {
                    self.window_start = None;
                    true
                } else {
                    false
                }
            }
        }
    }
}
