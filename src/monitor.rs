//! The per-tick monitoring driver.
//!
//! [`Monitor::tick`] runs once per incoming frame: obtain detections, diff
//! against the baseline, advance the persistence window, raise the alarm on
//! threshold breach, and drain the arbiter for resolved code entries.
//! Operator commands arrive through [`Monitor::handle_command`].
//!
//! All tick-level failures (detection hiccups, log/capture IO) are absorbed
//! here with a warning; nothing in this module aborts the primary loop.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

use crate::activity::{ActivityEvent, ActivityLog, AuthStatus, CaptureStore, EventKind};
use crate::alarm::AlarmCoordinator;
use crate::arbiter::{AccessCodeArbiter, CodePurpose, ResolvedCode};
use crate::baseline::{Baseline, BaselineStore};
use crate::change::{diff, ChangeRecord, PersistenceTimer};
use crate::config::GuardConfig;
use crate::detect::{count_objects, CountSnapshot, Detector};
use crate::frame::RawFrame;
use crate::input::Command;
use crate::notify::NotificationSink;
use crate::state::StateStore;

const NOTIFY_TITLE: &str = "Presence Guard";
const NOTIFY_ALARM_TITLE: &str = "SECURITY WARNING";

/// Outcome of a handled operator command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Quit,
}

pub struct Monitor {
    access_code: String,
    state: StateStore,
    timer: PersistenceTimer,
    arbiter: AccessCodeArbiter,
    coordinator: AlarmCoordinator,
    detector: Detector,
    baseline_store: BaselineStore,
    activity: ActivityLog,
    captures: CaptureStore,
    notifier: Arc<dyn NotificationSink>,
    first_detection_logged: bool,
}

impl Monitor {
    pub fn new(
        cfg: &GuardConfig,
        detector: Detector,
        arbiter: AccessCodeArbiter,
        coordinator: AlarmCoordinator,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let baseline_store = BaselineStore::new(&cfg.baseline_path);
        let baseline = baseline_store.load();
        log::info!("loaded baseline: {baseline}");

        Self {
            access_code: cfg.access_code.clone(),
            state: StateStore::new(baseline),
            timer: PersistenceTimer::new(cfg.persistence_threshold),
            arbiter,
            coordinator,
            detector,
            baseline_store,
            activity: ActivityLog::new(&cfg.log_dir),
            captures: CaptureStore::new(&cfg.capture_dir),
            notifier,
            first_detection_logged: false,
        }
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Run one monitoring tick for `frame`.
    pub fn tick(&mut self, frame: &RawFrame, now: Instant) -> Result<()> {
        match self.detector.detect(frame) {
            Ok(detections) => {
                let counts = count_objects(&detections);
                if !self.first_detection_logged {
                    self.log_activity(
                        ActivityEvent::new(
                            EventKind::InitialCameraDetection,
                            AuthStatus::Info,
                            "objects detected on camera startup",
                        )
                        .with_counts(counts.clone()),
                    );
                    self.first_detection_logged = true;
                }
                self.evaluate_change(frame, &counts, now);
            }
            Err(e) => {
                // Transient: skip change evaluation for this tick.
                log::warn!("detection failed this tick, continuing: {e}");
            }
        }

        self.drain_resolutions();
        Ok(())
    }

    /// Change detection runs only while monitoring with no active alarm;
    /// in any other state the persistence window is discarded.
    fn evaluate_change(&mut self, frame: &RawFrame, counts: &CountSnapshot, now: Instant) {
        let view = self.state.tick_view();
        if !view.modes.monitoring || view.modes.alarm_active {
            self.timer.reset();
            return;
        }

        let record = diff(&view.baseline, counts);
        if self.timer.update(record.changed, now) {
            self.raise_alarm(frame, &view.baseline, counts, &record);
        }
    }

    fn raise_alarm(
        &mut self,
        frame: &RawFrame,
        baseline: &Baseline,
        counts: &CountSnapshot,
        record: &ChangeRecord,
    ) {
        if !self.state.raise_alarm() {
            return;
        }
        let summary = record.summary();
        log::warn!("persistent change detected, raising alarm: {summary}");

        self.coordinator.trigger(frame.clone());

        let capture_path = self.capture(frame, AuthStatus::Unauthorized);
        self.log_activity(
            ActivityEvent::new(
                EventKind::StockChange,
                AuthStatus::Unauthorized,
                summary.clone(),
            )
            .with_baseline(baseline.clone())
            .with_counts(counts.clone())
            .with_change_details(summary.clone())
            .with_capture_path(capture_path),
        );
        self.notifier.notify(
            NOTIFY_ALARM_TITLE,
            &format!("change detected: {summary}. Alarm active! Enter the access code."),
        );
    }

    /// Drain the arbiter once per tick and apply resolution semantics.
    fn drain_resolutions(&mut self) {
        while let Some(resolved) = self.arbiter.poll() {
            let authorized = resolved.code == self.access_code;
            self.resolve(resolved, authorized);
        }
    }

    fn resolve(&mut self, resolved: ResolvedCode, authorized: bool) {
        match resolved.purpose {
            CodePurpose::DefenseToggle => self.resolve_defense_toggle(authorized),
            CodePurpose::AlarmAcknowledge => self.resolve_alarm_acknowledge(authorized),
        }
    }

    fn resolve_defense_toggle(&mut self, authorized: bool) {
        if !authorized {
            self.log_activity(ActivityEvent::new(
                EventKind::DefenseModeAttempt,
                AuthStatus::Unauthorized,
                "attempt to toggle defense mode with incorrect code",
            ));
            self.notifier
                .notify(NOTIFY_TITLE, "incorrect code; defense mode unchanged");
            return;
        }

        let modes = self.state.toggle_defense();
        if modes.defense_mode {
            self.timer.reset();
            self.log_activity(ActivityEvent::new(
                EventKind::DefenseModeEnter,
                AuthStatus::Authorized,
                "operator entered defense mode; monitoring suspended",
            ));
            self.notifier.notify(
                NOTIFY_TITLE,
                "defense mode active; press 'b' to set a new baseline",
            );
        } else {
            self.log_activity(ActivityEvent::new(
                EventKind::DefenseModeExit,
                AuthStatus::Authorized,
                "operator exited defense mode; monitoring resumed",
            ));
            self.notifier
                .notify(NOTIFY_TITLE, "defense mode off; monitoring resumed");
        }
    }

    fn resolve_alarm_acknowledge(&mut self, authorized: bool) {
        if !authorized {
            self.log_activity(ActivityEvent::new(
                EventKind::AlarmCodeIncorrect,
                AuthStatus::Unauthorized,
                "incorrect code entered while alarm was active",
            ));
            self.notifier
                .notify(NOTIFY_TITLE, "incorrect code; alarm remains active");
            return;
        }

        self.coordinator.silence();
        self.state.clear_alarm();

        let Some(alarm_frame) = self.coordinator.take_alarm_frame() else {
            self.log_activity(ActivityEvent::new(
                EventKind::AlarmAcknowledgedNoFrame,
                AuthStatus::Authorized,
                "code correct, but no stored alarm frame to recompute the baseline from",
            ));
            self.notifier
                .notify(NOTIFY_TITLE, "alarm silenced; baseline left unchanged");
            return;
        };

        match self.detector.detect(&alarm_frame) {
            Ok(detections) => {
                let counts = count_objects(&detections);
                let baseline = Baseline::from_counts(&counts);
                self.persist_baseline(&baseline);
                log::info!("baseline updated after acknowledgment: {baseline}");

                let capture_path = self.capture(&alarm_frame, AuthStatus::Authorized);
                self.log_activity(
                    ActivityEvent::new(
                        EventKind::AlarmAcknowledged,
                        AuthStatus::Authorized,
                        "alarm acknowledged; baseline updated to current state",
                    )
                    .with_counts(counts)
                    .with_capture_path(capture_path),
                );
                self.notifier
                    .notify(NOTIFY_TITLE, "change authorized; baseline updated");
            }
            Err(e) => {
                log::warn!("could not recompute baseline from alarm frame: {e}");
                self.log_activity(ActivityEvent::new(
                    EventKind::AlarmAcknowledgedNoFrame,
                    AuthStatus::Authorized,
                    format!("code correct, but baseline recompute failed: {e}"),
                ));
                self.notifier
                    .notify(NOTIFY_TITLE, "alarm silenced; baseline left unchanged");
            }
        }
    }

    /// Handle an operator command against the current frame.
    pub fn handle_command(&mut self, command: Command, frame: &RawFrame) -> LoopControl {
        match command {
            Command::Quit => {
                log::info!("shutdown requested by operator");
                return LoopControl::Quit;
            }
            Command::SetBaseline => self.command_set_baseline(frame),
            Command::RequestDefenseToggle => {
                if !self.arbiter.request_code(CodePurpose::DefenseToggle) {
                    self.notifier
                        .notify(NOTIFY_TITLE, "already waiting for a code entry");
                }
            }
            Command::RequestAlarmAcknowledge => {
                if !self.state.modes().alarm_active {
                    self.notifier.notify(NOTIFY_TITLE, "alarm is not active");
                } else if !self.arbiter.request_code(CodePurpose::AlarmAcknowledge) {
                    self.notifier
                        .notify(NOTIFY_TITLE, "already waiting for a code entry");
                }
            }
        }
        LoopControl::Continue
    }

    /// SetBaseline is honored in defense mode, or while no baseline exists
    /// yet (first-run bootstrap).
    fn command_set_baseline(&mut self, frame: &RawFrame) {
        if self.arbiter.is_pending() {
            self.notifier
                .notify(NOTIFY_TITLE, "waiting for code entry; try again after");
            return;
        }
        let modes = self.state.modes();
        if !modes.defense_mode && self.state.has_baseline() {
            self.notifier.notify(
                NOTIFY_TITLE,
                "press 'd' and enter the access code to enter defense mode first",
            );
            return;
        }
        self.set_baseline_from_frame(frame);
    }

    fn set_baseline_from_frame(&mut self, frame: &RawFrame) {
        let counts = match self.detector.detect(frame) {
            Ok(detections) => count_objects(&detections),
            Err(e) => {
                log::warn!("baseline set failed, detection error: {e}");
                self.notifier
                    .notify(NOTIFY_TITLE, "could not set baseline: detection failed");
                return;
            }
        };

        let baseline = Baseline::from_counts(&counts);
        self.persist_baseline(&baseline);
        log::info!("baseline set: {baseline}");

        let capture_path = self.capture(frame, AuthStatus::Authorized);
        self.log_activity(
            ActivityEvent::new(
                EventKind::BaselineSet,
                AuthStatus::Authorized,
                format!("initial state set: {baseline}"),
            )
            .with_baseline(baseline)
            .with_capture_path(capture_path),
        );
        self.notifier.notify(NOTIFY_TITLE, "baseline set");
    }

    /// Wind down actuators before process exit.
    pub fn shutdown(&mut self) {
        self.coordinator.silence();
    }

    fn persist_baseline(&mut self, baseline: &Baseline) {
        self.state.set_baseline(baseline.clone());
        if let Err(e) = self.baseline_store.save(baseline) {
            log::warn!("failed to persist baseline: {e}");
        }
    }

    fn capture(&self, frame: &RawFrame, status: AuthStatus) -> Option<std::path::PathBuf> {
        match self.captures.capture(frame, status) {
            Ok(path) => {
                log::info!("capture stored: {}", path.display());
                Some(path)
            }
            Err(e) => {
                log::warn!("capture failed: {e}");
                None
            }
        }
    }

    fn log_activity(&self, event: ActivityEvent) {
        if let Err(e) = self.activity.append(&event) {
            log::warn!("failed to append activity event: {e}");
        }
    }
}
