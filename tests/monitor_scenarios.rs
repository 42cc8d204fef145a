//! End-to-end monitoring-loop scenarios driven through `Monitor` with a
//! scripted detection backend and a channel-fed code prompt.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;

use presence_guard::config::ReconnectSettings;
use presence_guard::{
    AccessCodeArbiter, ActivityLog, AlarmCoordinator, AuthStatus, Baseline, BaselineStore,
    BoundingBox, CameraConfig, CodePrompt, CodePurpose, Command, Detection, Detector, EventKind,
    GuardConfig, LoopControl, Monitor, NotificationSink, RawFrame, RecordingNotifier,
    ScriptedBackend, ScriptedStep, Siren,
};

/// Prompt fed by a channel, so tests decide when the "operator" types.
struct ChannelPrompt {
    rx: Mutex<Receiver<String>>,
}

impl CodePrompt for ChannelPrompt {
    fn read_code(&self, _purpose: CodePurpose) -> Result<String> {
        let rx = self.rx.lock().unwrap();
        Ok(rx.recv()?)
    }
}

fn det(class: &str) -> Detection {
    Detection::new(
        class,
        BoundingBox {
            x1: 0,
            y1: 0,
            x2: 8,
            y2: 8,
        },
        0.9,
    )
}

fn snapshot(classes: &[&str]) -> ScriptedStep {
    ScriptedStep::Detections(classes.iter().map(|c| det(c)).collect())
}

fn frame() -> RawFrame {
    RawFrame::new(vec![96u8; 8 * 8 * 3], 8, 8)
}

struct Harness {
    monitor: Monitor,
    notifier: Arc<RecordingNotifier>,
    code_tx: Sender<String>,
    log: ActivityLog,
    baseline_store: BaselineStore,
    _dir: tempfile::TempDir,
}

fn harness(initial_baseline: &[(&str, u32)], script: Vec<ScriptedStep>) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = GuardConfig {
        access_code: "123".to_string(),
        persistence_threshold: Duration::from_secs(2),
        confidence_threshold: 0.5,
        tracked_classes: Vec::new(),
        baseline_path: dir.path().join("initial_state.json"),
        log_dir: dir.path().join("log_activity"),
        capture_dir: dir.path().join("captures"),
        alarm_sound_path: dir.path().join("alarm.mp3"),
        camera: CameraConfig::default(),
        reconnect: ReconnectSettings {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
            max_attempts: 3,
        },
    };

    let baseline_store = BaselineStore::new(&cfg.baseline_path);
    if !initial_baseline.is_empty() {
        let baseline = Baseline(
            initial_baseline
                .iter()
                .map(|(class, count)| (class.to_string(), *count))
                .collect(),
        );
        baseline_store.save(&baseline).expect("seed baseline");
    }

    let (code_tx, code_rx) = mpsc::channel();
    let arbiter = AccessCodeArbiter::new(Arc::new(ChannelPrompt {
        rx: Mutex::new(code_rx),
    }));
    let detector = Detector::new(Box::new(ScriptedBackend::new(script)), 0.5, Vec::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = Monitor::new(
        &cfg,
        detector,
        arbiter,
        AlarmCoordinator::new(Siren::silent()),
        Arc::clone(&notifier) as Arc<dyn NotificationSink>,
    );

    Harness {
        monitor,
        notifier,
        code_tx,
        log: ActivityLog::new(&cfg.log_dir),
        baseline_store,
        _dir: dir,
    }
}

fn events_of(log: &ActivityLog, kind: EventKind) -> Vec<presence_guard::ActivityEvent> {
    log.today().into_iter().filter(|e| e.event == kind).collect()
}

/// Tick the monitor until `cond` holds or a wall-clock budget runs out.
fn pump(monitor: &mut Monitor, f: &RawFrame, cond: impl Fn(&Monitor) -> bool) -> bool {
    for _ in 0..400 {
        monitor.tick(f, Instant::now()).expect("tick");
        if cond(monitor) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

fn raise_alarm(h: &mut Harness, f: &RawFrame, t0: Instant) {
    h.monitor.tick(f, t0).expect("tick");
    h.monitor
        .tick(f, t0 + Duration::from_millis(2500))
        .expect("tick");
    assert!(h.monitor.state().modes().alarm_active, "alarm should be up");
}

#[test]
fn persistent_deviation_raises_the_alarm_exactly_once() {
    let mut h = harness(&[("bottle", 1), ("cup", 1)], vec![snapshot(&["cup"])]);
    let f = frame();
    let t0 = Instant::now();

    h.monitor.tick(&f, t0).expect("tick");
    h.monitor.tick(&f, t0 + Duration::from_secs(1)).expect("tick");
    assert!(
        !h.monitor.state().modes().alarm_active,
        "below threshold: no alarm yet"
    );

    h.monitor
        .tick(&f, t0 + Duration::from_millis(2500))
        .expect("tick");
    assert!(h.monitor.state().modes().alarm_active);

    // Deviation continues; the active alarm blocks any second raise.
    h.monitor.tick(&f, t0 + Duration::from_secs(6)).expect("tick");
    h.monitor.tick(&f, t0 + Duration::from_secs(9)).expect("tick");

    let stock_changes = events_of(&h.log, EventKind::StockChange);
    assert_eq!(stock_changes.len(), 1);
    let event = &stock_changes[0];
    assert_eq!(event.status, AuthStatus::Unauthorized);
    assert!(event
        .change_details
        .as_deref()
        .expect("change details")
        .contains("bottle missing (1 -> 0)"));
    assert!(event.initial_baseline.is_some());
    assert!(event.actual_objects.is_some());
    assert!(event.capture_path.is_some());

    let sent = h.notifier.sent.lock().unwrap();
    assert!(sent.iter().any(|(title, _)| title == "SECURITY WARNING"));
}

#[test]
fn short_lived_deviation_never_alarms() {
    let mut h = harness(
        &[("bottle", 1), ("cup", 1)],
        vec![
            snapshot(&["cup"]),
            snapshot(&["cup"]),
            snapshot(&["bottle", "cup"]),
        ],
    );
    let f = frame();
    let t0 = Instant::now();

    h.monitor.tick(&f, t0).expect("tick");
    h.monitor.tick(&f, t0 + Duration::from_secs(1)).expect("tick");
    // Scene back to normal before the threshold: window resets.
    h.monitor
        .tick(&f, t0 + Duration::from_millis(1500))
        .expect("tick");
    h.monitor.tick(&f, t0 + Duration::from_secs(10)).expect("tick");

    assert!(!h.monitor.state().modes().alarm_active);
    assert!(events_of(&h.log, EventKind::StockChange).is_empty());
}

#[test]
fn transient_detection_failure_skips_the_tick_and_continues() {
    let mut h = harness(
        &[("bottle", 1)],
        vec![
            snapshot(&[]),
            ScriptedStep::Fail("model hiccup".to_string()),
            snapshot(&[]),
        ],
    );
    let f = frame();
    let t0 = Instant::now();

    // Deviation opens the persistence window.
    h.monitor.tick(&f, t0).expect("tick");
    // The failed tick is absorbed: no evaluation, no alarm, loop continues.
    h.monitor.tick(&f, t0 + Duration::from_secs(1)).expect("tick");
    assert!(!h.monitor.state().modes().alarm_active);

    // The window survives the skipped tick; the persisting change fires.
    h.monitor
        .tick(&f, t0 + Duration::from_millis(2500))
        .expect("tick");
    assert!(h.monitor.state().modes().alarm_active);
    assert_eq!(events_of(&h.log, EventKind::StockChange).len(), 1);
}

#[test]
fn failed_redetection_on_acknowledge_keeps_the_old_baseline() {
    // After the two alarm-raising ticks, every detection call fails,
    // including the acknowledge-time baseline recompute.
    let mut script = vec![snapshot(&[]), snapshot(&[])];
    script.extend((0..50).map(|_| ScriptedStep::Fail("model offline".to_string())));
    let mut h = harness(&[("bottle", 1)], script);
    let f = frame();
    raise_alarm(&mut h, &f, Instant::now());

    h.monitor.handle_command(Command::RequestAlarmAcknowledge, &f);
    h.code_tx.send("123".to_string()).expect("send code");

    let log = &h.log;
    assert!(pump(&mut h.monitor, &f, |_| {
        events_of(log, EventKind::AlarmAcknowledgedNoFrame).len() == 1
    }));

    // The correct code still silences the alarm; only the baseline update
    // is skipped, leaving the stored inventory untouched.
    assert!(!h.monitor.state().modes().alarm_active);
    assert_eq!(h.monitor.state().baseline().expected("bottle"), 1);
    assert!(events_of(&h.log, EventKind::AlarmAcknowledged).is_empty());
}

#[test]
fn correct_code_acknowledges_alarm_and_recomputes_baseline() {
    let mut h = harness(&[("bottle", 1), ("cup", 1)], vec![snapshot(&["cup"])]);
    let f = frame();
    raise_alarm(&mut h, &f, Instant::now());

    assert_eq!(
        h.monitor.handle_command(Command::RequestAlarmAcknowledge, &f),
        LoopControl::Continue
    );
    h.code_tx.send("123".to_string()).expect("send code");

    assert!(pump(&mut h.monitor, &f, |m| !m.state().modes().alarm_active));

    // Baseline recomputed from the stored alarm frame: bottle is gone now.
    let baseline = h.monitor.state().baseline();
    assert_eq!(baseline.expected("cup"), 1);
    assert_eq!(baseline.expected("bottle"), 0);
    // And persisted.
    assert_eq!(h.baseline_store.load(), baseline);

    assert_eq!(events_of(&h.log, EventKind::AlarmAcknowledged).len(), 1);

    // The new baseline matches the scene; further ticks stay quiet.
    let t1 = Instant::now();
    h.monitor.tick(&f, t1 + Duration::from_secs(5)).expect("tick");
    assert!(!h.monitor.state().modes().alarm_active);
}

#[test]
fn wrong_code_leaves_alarm_active_until_retried() {
    let mut h = harness(&[("bottle", 1)], vec![snapshot(&[])]);
    let f = frame();
    raise_alarm(&mut h, &f, Instant::now());

    h.monitor.handle_command(Command::RequestAlarmAcknowledge, &f);
    h.code_tx.send("999".to_string()).expect("send code");

    let log = &h.log;
    assert!(pump(&mut h.monitor, &f, |_| {
        events_of(log, EventKind::AlarmCodeIncorrect).len() == 1
    }));
    assert!(h.monitor.state().modes().alarm_active);

    // The arbiter slot is free again; a retry with the right code succeeds.
    h.monitor.handle_command(Command::RequestAlarmAcknowledge, &f);
    h.code_tx.send("123".to_string()).expect("send code");
    assert!(pump(&mut h.monitor, &f, |m| !m.state().modes().alarm_active));
}

#[test]
fn wrong_code_never_enters_defense_mode() {
    let mut h = harness(&[("bottle", 1)], vec![snapshot(&["bottle"])]);
    let f = frame();

    h.monitor.handle_command(Command::RequestDefenseToggle, &f);
    h.code_tx.send("999".to_string()).expect("send code");

    let log = &h.log;
    assert!(pump(&mut h.monitor, &f, |_| {
        events_of(log, EventKind::DefenseModeAttempt).len() == 1
    }));

    let modes = h.monitor.state().modes();
    assert!(!modes.defense_mode);
    assert!(modes.monitoring);
    assert_eq!(
        events_of(&h.log, EventKind::DefenseModeAttempt)[0].status,
        AuthStatus::Unauthorized
    );
}

#[test]
fn defense_mode_suspends_monitoring_and_allows_rebaseline() {
    // Scene permanently deviates from the stored baseline.
    let mut h = harness(&[("bottle", 1)], vec![snapshot(&["cup"])]);
    let f = frame();

    h.monitor.handle_command(Command::RequestDefenseToggle, &f);
    h.code_tx.send("123".to_string()).expect("send code");
    assert!(pump(&mut h.monitor, &f, |m| m.state().modes().defense_mode));
    assert!(!h.monitor.state().modes().monitoring);

    // Long-running deviation while defended: no alarm.
    let t0 = Instant::now();
    h.monitor.tick(&f, t0).expect("tick");
    h.monitor.tick(&f, t0 + Duration::from_secs(30)).expect("tick");
    assert!(!h.monitor.state().modes().alarm_active);

    // Rebaseline to the current scene while defended.
    h.monitor.handle_command(Command::SetBaseline, &f);
    assert_eq!(h.monitor.state().baseline().expected("cup"), 1);
    assert_eq!(events_of(&h.log, EventKind::BaselineSet).len(), 1);

    // Exit defense mode; the new baseline matches the scene.
    h.monitor.handle_command(Command::RequestDefenseToggle, &f);
    h.code_tx.send("123".to_string()).expect("send code");
    assert!(pump(&mut h.monitor, &f, |m| m.state().modes().monitoring));

    let t1 = Instant::now();
    h.monitor.tick(&f, t1).expect("tick");
    h.monitor.tick(&f, t1 + Duration::from_secs(10)).expect("tick");
    assert!(!h.monitor.state().modes().alarm_active);

    assert_eq!(events_of(&h.log, EventKind::DefenseModeEnter).len(), 1);
    assert_eq!(events_of(&h.log, EventKind::DefenseModeExit).len(), 1);
}

#[test]
fn first_run_bootstrap_allows_baseline_without_defense_mode() {
    let mut h = harness(&[], vec![snapshot(&["cup"])]);
    let f = frame();

    // No stored baseline: 'b' works straight away.
    h.monitor.handle_command(Command::SetBaseline, &f);
    assert_eq!(h.monitor.state().baseline().expected("cup"), 1);
    assert_eq!(events_of(&h.log, EventKind::BaselineSet).len(), 1);

    // With a baseline in place, 'b' outside defense mode is refused.
    h.monitor.handle_command(Command::SetBaseline, &f);
    assert_eq!(events_of(&h.log, EventKind::BaselineSet).len(), 1);
    let sent = h.notifier.sent.lock().unwrap();
    assert!(sent
        .iter()
        .any(|(_, message)| message.contains("defense mode")));
}

#[test]
fn acknowledge_request_is_refused_while_alarm_is_quiet() {
    let mut h = harness(&[("bottle", 1)], vec![snapshot(&["bottle"])]);
    let f = frame();

    h.monitor.handle_command(Command::RequestAlarmAcknowledge, &f);
    let sent = h.notifier.sent.lock().unwrap();
    assert!(sent
        .iter()
        .any(|(_, message)| message.contains("alarm is not active")));
}

#[test]
fn quit_command_stops_the_loop() {
    let mut h = harness(&[], vec![snapshot(&[])]);
    let f = frame();
    assert_eq!(
        h.monitor.handle_command(Command::Quit, &f),
        LoopControl::Quit
    );
}

#[test]
fn first_tick_records_initial_camera_detection() {
    let mut h = harness(&[("cup", 1)], vec![snapshot(&["cup"])]);
    let f = frame();
    let t0 = Instant::now();

    h.monitor.tick(&f, t0).expect("tick");
    h.monitor.tick(&f, t0 + Duration::from_millis(100)).expect("tick");

    let initial = events_of(&h.log, EventKind::InitialCameraDetection);
    assert_eq!(initial.len(), 1, "logged once, not per tick");
    assert_eq!(initial[0].status, AuthStatus::Info);
    assert!(initial[0].actual_objects.is_some());
}
