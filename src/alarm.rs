//! Alarm actuation.
//!
//! [`Siren`] owns the audio-looping worker: a background thread that drives a
//! [`SirenBackend`] until an atomic stop flag is set. The alarm state machine
//! works even when audio is unavailable; a backend failure degrades to a
//! silent alarm with a warning, never an error at the tick boundary.
//!
//! [`AlarmCoordinator`] is the sole raise path: it starts the siren and takes
//! ownership of the frame that triggered the alarm (the "last alarm frame"),
//! which the acknowledge path later consumes to recompute the baseline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Result;

use crate::frame::RawFrame;

/// How long `Siren::stop` waits for the worker to wind down.
const STOP_WAIT: Duration = Duration::from_secs(1);
/// Worker poll interval while awaiting the stop flag.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Looping-playback backend, executed entirely on the siren worker thread.
///
/// `run` starts playback, polls `stop` at a bounded interval, and tears
/// playback down before returning. Returning `Err` means playback could not
/// start; the alarm then proceeds silently.
pub trait SirenBackend: Send {
    fn name(&self) -> &'static str;
    fn run(&mut self, stop: &AtomicBool) -> Result<()>;
}

/// Silent backend: the alarm transition is logged but no audio plays.
/// Default when the `audio-rodio` feature is off or no device is configured.
pub struct NullSiren;

impl SirenBackend for NullSiren {
    fn name(&self) -> &'static str {
        "null"
    }

    fn run(&mut self, stop: &AtomicBool) -> Result<()> {
        log::info!("siren engaged (silent backend)");
        while !stop.load(Ordering::Acquire) {
            std::thread::sleep(POLL_INTERVAL);
        }
        log::info!("siren disengaged");
        Ok(())
    }
}

/// Audio-device backend looping an alarm sound file via rodio.
#[cfg(feature = "audio-rodio")]
pub struct RodioSiren {
    sound_path: std::path::PathBuf,
}

#[cfg(feature = "audio-rodio")]
impl RodioSiren {
    pub fn new(sound_path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            sound_path: sound_path.into(),
        }
    }
}

#[cfg(feature = "audio-rodio")]
impl SirenBackend for RodioSiren {
    fn name(&self) -> &'static str {
        "rodio"
    }

    fn run(&mut self, stop: &AtomicBool) -> Result<()> {
        use anyhow::Context;
        use rodio::Source;

        // Audio handles are created on this thread; they are not Send.
        let (_stream, handle) =
            rodio::OutputStream::try_default().context("open default audio output")?;
        let sink = rodio::Sink::try_new(&handle).context("create audio sink")?;
        let file = std::fs::File::open(&self.sound_path)
            .with_context(|| format!("open alarm sound {}", self.sound_path.display()))?;
        let source = rodio::Decoder::new(std::io::BufReader::new(file))
            .context("decode alarm sound")?
            .repeat_infinite();
        sink.append(source);
        sink.play();
        log::info!("siren engaged (looping {})", self.sound_path.display());

        while !stop.load(Ordering::Acquire) {
            std::thread::sleep(POLL_INTERVAL);
        }

        sink.stop();
        log::info!("siren disengaged");
        Ok(())
    }
}

type BackendFactory = Box<dyn Fn() -> Box<dyn SirenBackend> + Send>;

struct SirenWorker {
    handle: JoinHandle<()>,
    done: Receiver<()>,
    // Each worker owns its stop flag, so a slow worker detached by `stop`
    // still winds down on its own signal after a replacement starts.
    stop: Arc<AtomicBool>,
}

/// Handle to the audio-looping worker. `start` is idempotent while running;
/// `stop` is safe to call when nothing is playing.
pub struct Siren {
    factory: BackendFactory,
    worker: Option<SirenWorker>,
}

impl Siren {
    pub fn new(factory: BackendFactory) -> Self {
        Self {
            factory,
            worker: None,
        }
    }

    pub fn silent() -> Self {
        Self::new(Box::new(|| Box::new(NullSiren)))
    }

    pub fn is_running(&mut self) -> bool {
        match &self.worker {
            None => false,
            Some(worker) => match worker.done.try_recv() {
                // Worker already wound down (e.g. backend failed to start).
                Ok(()) | Err(TryRecvError::Disconnected) => {
                    self.worker = None;
                    false
                }
                Err(TryRecvError::Empty) => true,
            },
        }
    }

    /// Begin looping playback. A no-op when the worker is already running.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let mut backend = (self.factory)();
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);
        let (done_tx, done_rx) = mpsc::channel();
        let spawned = std::thread::Builder::new()
            .name("siren".to_string())
            .spawn(move || {
                if let Err(e) = backend.run(&worker_stop) {
                    // Actuator-degraded: alarm stays logically active, just silent.
                    log::warn!("audio unavailable, alarm will be silent: {e}");
                }
                let _ = done_tx.send(());
            });

        match spawned {
            Ok(handle) => {
                self.worker = Some(SirenWorker {
                    handle,
                    done: done_rx,
                    stop,
                });
            }
            Err(e) => log::warn!("failed to spawn siren worker: {e}"),
        }
    }

    /// Signal the worker's stop flag and wait (bounded) for it to exit. A
    /// worker that overruns the wait is detached with its flag left set, so
    /// it still winds down on its own. If the backend never started, the
    /// worker has already finished and the wait returns immediately.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.stop.store(true, Ordering::Release);
        match worker.done.recv_timeout(STOP_WAIT) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = worker.handle.join();
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("siren worker did not stop within {STOP_WAIT:?}; detaching");
            }
        }
    }
}

impl Drop for Siren {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Drives the alarm transition: siren start/stop plus ownership of the frame
/// captured at the moment the alarm was raised.
pub struct AlarmCoordinator {
    siren: Siren,
    last_alarm_frame: Option<RawFrame>,
}

impl AlarmCoordinator {
    pub fn new(siren: Siren) -> Self {
        Self {
            siren,
            last_alarm_frame: None,
        }
    }

    /// Start the actuator and capture the triggering frame. A frame from an
    /// earlier, unacknowledged alarm is superseded.
    pub fn trigger(&mut self, frame: RawFrame) {
        self.siren.start();
        self.last_alarm_frame = Some(frame);
    }

    /// Stop the actuator. Safe to call when no alarm is sounding.
    pub fn silence(&mut self) {
        self.siren.stop();
    }

    /// Single-owner hand-off of the alarm frame to the acknowledge path.
    pub fn take_alarm_frame(&mut self) -> Option<RawFrame> {
        self.last_alarm_frame.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingBackend {
        runs: Arc<AtomicUsize>,
        fail: bool,
    }

    impl SirenBackend for CountingBackend {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn run(&mut self, stop: &AtomicBool) -> Result<()> {
            if self.fail {
                anyhow::bail!("no audio device");
            }
            self.runs.fetch_add(1, Ordering::SeqCst);
            while !stop.load(Ordering::Acquire) {
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(())
        }
    }

    fn counting_siren(fail: bool) -> (Siren, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_for_factory = Arc::clone(&runs);
        let siren = Siren::new(Box::new(move || {
            Box::new(CountingBackend {
                runs: Arc::clone(&runs_for_factory),
                fail,
            })
        }));
        (siren, runs)
    }

    #[test]
    fn start_is_idempotent_while_running() {
        let (mut siren, runs) = counting_siren(false);
        siren.start();
        std::thread::sleep(Duration::from_millis(20));
        siren.start();
        siren.start();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        siren.stop();
        assert!(!siren.is_running());
    }

    #[test]
    fn stop_without_start_is_safe() {
        let (mut siren, _runs) = counting_siren(false);
        siren.stop();
        assert!(!siren.is_running());
    }

    #[test]
    fn failed_backend_degrades_and_stop_returns_immediately() {
        let (mut siren, runs) = counting_siren(true);
        siren.start();
        // Worker exits on its own; stop must not hang.
        siren.stop();
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(!siren.is_running());
    }

    struct SlowStopBackend {
        started: Arc<AtomicUsize>,
        observed_stop: Arc<AtomicUsize>,
    }

    impl SirenBackend for SlowStopBackend {
        fn name(&self) -> &'static str {
            "slow-stop"
        }

        fn run(&mut self, stop: &AtomicBool) -> Result<()> {
            self.started.fetch_add(1, Ordering::SeqCst);
            // Ignore the flag long enough to outlast the bounded stop wait.
            std::thread::sleep(STOP_WAIT + Duration::from_millis(500));
            while !stop.load(Ordering::Acquire) {
                std::thread::sleep(Duration::from_millis(5));
            }
            self.observed_stop.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn detached_worker_keeps_its_stop_signal() {
        let started = Arc::new(AtomicUsize::new(0));
        let observed_stop = Arc::new(AtomicUsize::new(0));
        let started_for_factory = Arc::clone(&started);
        let observed_for_factory = Arc::clone(&observed_stop);
        let mut siren = Siren::new(Box::new(move || {
            Box::new(SlowStopBackend {
                started: Arc::clone(&started_for_factory),
                observed_stop: Arc::clone(&observed_for_factory),
            })
        }));

        siren.start();
        // Worker overruns the bounded wait and gets detached still running.
        siren.stop();
        assert!(!siren.is_running());

        // A replacement worker must start, and stopping it must not clear
        // the signal the detached worker is still waiting on.
        siren.start();
        for _ in 0..200 {
            if started.load(Ordering::SeqCst) == 2 {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(started.load(Ordering::SeqCst), 2);
        siren.stop();

        let mut wound_down = 0;
        for _ in 0..1000 {
            wound_down = observed_stop.load(Ordering::SeqCst);
            if wound_down == 2 {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(wound_down, 2);
    }

    #[test]
    fn coordinator_hands_off_alarm_frame_once() {
        let mut coordinator = AlarmCoordinator::new(Siren::silent());
        coordinator.trigger(RawFrame::new(vec![1, 2, 3], 1, 1));

        let frame = coordinator.take_alarm_frame();
        assert!(frame.is_some());
        assert!(coordinator.take_alarm_frame().is_none());
        coordinator.silence();
    }
}
