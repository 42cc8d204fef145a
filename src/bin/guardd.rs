//! guardd - presence guard daemon
//!
//! This daemon:
//! 1. Ingests frames from the configured camera source
//! 2. Runs object detection and diffs the snapshot against the baseline
//! 3. Raises a siren alarm when a deviation persists past the threshold
//! 4. Routes operator keys (q/b/d/a) and access-code entry from stdin
//! 5. Appends activity events to the daily JSON log

use std::io::BufReader;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use clap::Parser;

use presence_guard::{
    AccessCodeArbiter, AlarmCoordinator, CameraSource, Detector, FramePull, GuardConfig,
    LoopControl, Monitor, NotificationSink, ReconnectPolicy, Siren, StubBackend,
    TerminalNotifier,
};

#[derive(Debug, Parser)]
#[command(name = "guardd", about = "presence-monitoring guard daemon")]
struct Cli {
    /// Path to a TOML config file (falls back to GUARD_CONFIG, then defaults).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the camera source URL.
    #[arg(long)]
    camera_url: Option<String>,

    /// Run without audio even when the audio feature is built in.
    #[arg(long)]
    silent: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut cfg = GuardConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.camera_url {
        cfg.camera.url = url;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::Release);
        })?;
    }

    let mut source = CameraSource::new(cfg.camera.clone())?;
    source.connect()?;

    let mut detector = Detector::new(
        Box::new(StubBackend::new()),
        cfg.confidence_threshold,
        cfg.tracked_classes.clone(),
    );
    detector.warm_up()?;
    log::info!("detection backend: {}", detector.backend_name());

    let coordinator = AlarmCoordinator::new(build_siren(&cfg, cli.silent));

    let (commands, prompt) = presence_guard::spawn_router(BufReader::new(std::io::stdin()));
    let arbiter = AccessCodeArbiter::new(prompt);

    let notifier: Arc<dyn NotificationSink> = Arc::new(TerminalNotifier);
    let mut monitor = Monitor::new(&cfg, detector, arbiter, coordinator, notifier);

    if !monitor.state().has_baseline() {
        log::warn!("no baseline stored yet; press 'b' to set one from the current scene");
    }
    log::info!(
        "guardd running on {} (keys: q quit, b baseline, d defense mode, a acknowledge alarm)",
        cfg.camera.url
    );

    let frame_interval = Duration::from_secs_f64(1.0 / f64::from(cfg.camera.target_fps));
    let mut reconnect = ReconnectPolicy::new(
        cfg.reconnect.base_delay,
        cfg.reconnect.max_delay,
        cfg.reconnect.max_attempts,
    );
    let mut last_health_log = Instant::now();

    while !shutdown.load(Ordering::Acquire) {
        let tick_start = Instant::now();

        match source.next_frame() {
            Ok(FramePull::Frame(frame)) => {
                reconnect.reset();
                if let Err(e) = monitor.tick(&frame, tick_start) {
                    log::warn!("tick failed: {e}");
                }
                while let Some(command) = commands.try_next() {
                    if monitor.handle_command(command, &frame) == LoopControl::Quit {
                        shutdown.store(true, Ordering::Release);
                        break;
                    }
                }
            }
            Ok(FramePull::Disconnected) => {
                let Some(delay) = reconnect.next_delay() else {
                    return Err(anyhow!(
                        "camera {} unreachable after {} reconnect attempts",
                        cfg.camera.url,
                        reconnect.attempts()
                    ));
                };
                log::warn!(
                    "camera stream dropped; reconnecting in {delay:?} (attempt {})",
                    reconnect.attempts()
                );
                interruptible_sleep(delay, &shutdown);
                if let Err(e) = source.connect() {
                    log::warn!("reconnect failed: {e}");
                }
                continue;
            }
            Err(e) => {
                log::warn!("frame pull failed: {e}");
                interruptible_sleep(frame_interval, &shutdown);
                continue;
            }
        }

        if last_health_log.elapsed() >= Duration::from_secs(60) {
            let stats = source.stats();
            let modes = monitor.state().modes();
            log::info!(
                "health: {} frames from {}, monitoring={}, defense_mode={}, alarm_active={}",
                stats.frames_captured,
                stats.url,
                modes.monitoring,
                modes.defense_mode,
                modes.alarm_active
            );
            last_health_log = Instant::now();
        }

        if let Some(remaining) = frame_interval.checked_sub(tick_start.elapsed()) {
            interruptible_sleep(remaining, &shutdown);
        }
    }

    log::info!("guardd shutting down");
    monitor.shutdown();
    Ok(())
}

fn build_siren(cfg: &GuardConfig, silent: bool) -> Siren {
    if silent {
        return Siren::silent();
    }
    #[cfg(feature = "audio-rodio")]
    {
        let sound_path = cfg.alarm_sound_path.clone();
        return Siren::new(Box::new(move || {
            Box::new(presence_guard::RodioSiren::new(sound_path.clone()))
        }));
    }
    #[cfg(not(feature = "audio-rodio"))]
    {
        let _ = cfg;
        Siren::silent()
    }
}

/// Sleep in short slices so Ctrl-C is honored promptly.
fn interruptible_sleep(total: Duration, shutdown: &AtomicBool) {
    let slice = Duration::from_millis(50);
    let deadline = Instant::now() + total;
    while Instant::now() < deadline && !shutdown.load(Ordering::Acquire) {
        std::thread::sleep(slice.min(deadline.saturating_duration_since(Instant::now())));
    }
}
