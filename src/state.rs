//! Guarded holder of the composite system state.
//!
//! All reads and writes of the monitoring/defense/alarm flags and the
//! baseline go through one mutex. Operations that must observe more than one
//! field coherently take the guard once for the whole read; callers never see
//! a torn `{monitoring, defense_mode, alarm_active}` triple.
//!
//! `monitoring` is not stored: it is defined as `!defense_mode`, so the
//! complement invariant holds by construction.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::baseline::Baseline;

/// Coherent read of the three system flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModeSnapshot {
    pub monitoring: bool,
    pub defense_mode: bool,
    pub alarm_active: bool,
}

/// Coherent per-tick view: flags plus the baseline they apply to.
#[derive(Clone, Debug)]
pub struct TickView {
    pub modes: ModeSnapshot,
    pub baseline: Baseline,
}

#[derive(Debug)]
struct Inner {
    defense_mode: bool,
    alarm_active: bool,
    baseline: Baseline,
}

/// Shared, mutex-guarded system state. Cheap to clone.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<Mutex<Inner>>,
}

impl StateStore {
    pub fn new(baseline: Baseline) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                defense_mode: false,
                alarm_active: false,
                baseline,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicked holder cannot leave the triple torn (every mutation is a
        // single assignment), so recover the inner state on poisoning.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Read all three flags under one guard acquisition.
    pub fn modes(&self) -> ModeSnapshot {
        let inner = self.lock();
        ModeSnapshot {
            monitoring: !inner.defense_mode,
            defense_mode: inner.defense_mode,
            alarm_active: inner.alarm_active,
        }
    }

    /// Read flags and baseline coherently for one monitoring tick.
    pub fn tick_view(&self) -> TickView {
        let inner = self.lock();
        TickView {
            modes: ModeSnapshot {
                monitoring: !inner.defense_mode,
                defense_mode: inner.defense_mode,
                alarm_active: inner.alarm_active,
            },
            baseline: inner.baseline.clone(),
        }
    }

    /// Flip defense mode (and therefore monitoring, its complement).
    /// Returns the resulting snapshot.
    pub fn toggle_defense(&self) -> ModeSnapshot {
        let mut inner = self.lock();
        inner.defense_mode = !inner.defense_mode;
        ModeSnapshot {
            monitoring: !inner.defense_mode,
            defense_mode: inner.defense_mode,
            alarm_active: inner.alarm_active,
        }
    }

    /// Raise the alarm. By policy an alarm is only raised while monitoring;
    /// returns `false` (without mutating) when that precondition fails or an
    /// alarm is already active.
    pub fn raise_alarm(&self) -> bool {
        let mut inner = self.lock();
        if inner.defense_mode || inner.alarm_active {
            return false;
        }
        inner.alarm_active = true;
        true
    }

    pub fn clear_alarm(&self) {
        self.lock().alarm_active = false;
    }

    pub fn baseline(&self) -> Baseline {
        self.lock().baseline.clone()
    }

    pub fn has_baseline(&self) -> bool {
        !self.lock().baseline.is_empty()
    }

    pub fn set_baseline(&self, baseline: Baseline) {
        self.lock().baseline = baseline;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitoring_and_defense_are_complementary_across_transitions() {
        let store = StateStore::new(Baseline::default());

        let m = store.modes();
        assert!(m.monitoring && !m.defense_mode);

        let m = store.toggle_defense();
        assert_eq!(m.monitoring, !m.defense_mode);
        assert!(m.defense_mode);

        let m = store.toggle_defense();
        assert_eq!(m.monitoring, !m.defense_mode);
        assert!(m.monitoring);
    }

    #[test]
    fn alarm_only_raised_while_monitoring() {
        let store = StateStore::new(Baseline::default());

        store.toggle_defense();
        assert!(!store.raise_alarm(), "no alarm in defense mode");
        assert!(!store.modes().alarm_active);

        store.toggle_defense();
        assert!(store.raise_alarm());
        assert!(store.modes().alarm_active);

        // Already active: second raise is refused.
        assert!(!store.raise_alarm());

        store.clear_alarm();
        assert!(!store.modes().alarm_active);
    }

    #[test]
    fn tick_view_is_coherent() {
        let store = StateStore::new(Baseline::default());
        let mut counts = std::collections::BTreeMap::new();
        counts.insert("bottle".to_string(), 1);
        store.set_baseline(Baseline(counts));

        let view = store.tick_view();
        assert!(view.modes.monitoring);
        assert_eq!(view.baseline.expected("bottle"), 1);
        assert!(store.has_baseline());
    }
}
