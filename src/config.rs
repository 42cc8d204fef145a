use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::CameraConfig;

const DEFAULT_ACCESS_CODE: &str = "123";
const DEFAULT_PERSISTENCE_SECS: f64 = 2.0;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DEFAULT_BASELINE_PATH: &str = "initial_state.json";
const DEFAULT_LOG_DIR: &str = "log_activity";
const DEFAULT_CAPTURE_DIR: &str = "captures";
const DEFAULT_ALARM_SOUND: &str = "alarm.mp3";
const DEFAULT_CAMERA_URL: &str = "stub://front_desk";
const DEFAULT_CAMERA_FPS: u32 = 10;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_RECONNECT_BASE_SECS: u64 = 3;
const DEFAULT_RECONNECT_MAX_SECS: u64 = 30;
const DEFAULT_RECONNECT_ATTEMPTS: u32 = 10;

/// COCO-subset classes the reference deployment tracks.
fn default_tracked_classes() -> Vec<String> {
    [
        "bottle",
        "cup",
        "laptop",
        "mouse",
        "keyboard",
        "cell phone",
        "book",
        "clock",
        "scissors",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

#[derive(Debug, Deserialize, Default)]
struct GuardConfigFile {
    access_code: Option<String>,
    persistence_threshold_secs: Option<f64>,
    confidence_threshold: Option<f32>,
    tracked_classes: Option<Vec<String>>,
    baseline_path: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    capture_dir: Option<PathBuf>,
    alarm_sound_path: Option<PathBuf>,
    camera: Option<CameraConfigFile>,
    reconnect: Option<ReconnectConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ReconnectConfigFile {
    base_delay_secs: Option<u64>,
    max_delay_secs: Option<u64>,
    max_attempts: Option<u32>,
}

/// Runtime configuration for guardd.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Shared access code, compared by exact match.
    pub access_code: String,
    /// Minimum continuous deviation duration before the alarm fires.
    pub persistence_threshold: Duration,
    pub confidence_threshold: f32,
    pub tracked_classes: Vec<String>,
    pub baseline_path: PathBuf,
    pub log_dir: PathBuf,
    pub capture_dir: PathBuf,
    pub alarm_sound_path: PathBuf,
    pub camera: CameraConfig,
    pub reconnect: ReconnectSettings,
}

#[derive(Debug, Clone)]
pub struct ReconnectSettings {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl GuardConfig {
    /// Load configuration: optional TOML file, then `GUARD_*` environment
    /// overrides, then validation.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("GUARD_CONFIG").ok().map(PathBuf::from);
        let path = config_path.map(Path::to_path_buf).or(env_path);
        let file_cfg = match path.as_deref() {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: GuardConfigFile) -> Result<Self> {
        let camera = CameraConfig {
            url: file
                .camera
                .as_ref()
                .and_then(|camera| camera.url.clone())
                .unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string()),
            target_fps: file
                .camera
                .as_ref()
                .and_then(|camera| camera.target_fps)
                .unwrap_or(DEFAULT_CAMERA_FPS),
            width: file
                .camera
                .as_ref()
                .and_then(|camera| camera.width)
                .unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: file
                .camera
                .as_ref()
                .and_then(|camera| camera.height)
                .unwrap_or(DEFAULT_CAMERA_HEIGHT),
            synthetic_disconnect_every: None,
        };
        let reconnect = ReconnectSettings {
            base_delay: Duration::from_secs(
                file.reconnect
                    .as_ref()
                    .and_then(|r| r.base_delay_secs)
                    .unwrap_or(DEFAULT_RECONNECT_BASE_SECS),
            ),
            max_delay: Duration::from_secs(
                file.reconnect
                    .as_ref()
                    .and_then(|r| r.max_delay_secs)
                    .unwrap_or(DEFAULT_RECONNECT_MAX_SECS),
            ),
            max_attempts: file
                .reconnect
                .and_then(|r| r.max_attempts)
                .unwrap_or(DEFAULT_RECONNECT_ATTEMPTS),
        };
        Ok(Self {
            access_code: file
                .access_code
                .unwrap_or_else(|| DEFAULT_ACCESS_CODE.to_string()),
            persistence_threshold: duration_from_secs(
                file.persistence_threshold_secs
                    .unwrap_or(DEFAULT_PERSISTENCE_SECS),
                "persistence_threshold_secs",
            )?,
            confidence_threshold: file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            tracked_classes: file.tracked_classes.unwrap_or_else(default_tracked_classes),
            baseline_path: file
                .baseline_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BASELINE_PATH)),
            log_dir: file.log_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            capture_dir: file
                .capture_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CAPTURE_DIR)),
            alarm_sound_path: file
                .alarm_sound_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ALARM_SOUND)),
            camera,
            reconnect,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(code) = std::env::var("GUARD_ACCESS_CODE") {
            if !code.trim().is_empty() {
                self.access_code = code;
            }
        }
        if let Ok(url) = std::env::var("GUARD_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.camera.url = url;
            }
        }
        if let Ok(secs) = std::env::var("GUARD_PERSISTENCE_SECS") {
            let secs: f64 = secs
                .parse()
                .map_err(|_| anyhow!("GUARD_PERSISTENCE_SECS must be a number of seconds"))?;
            self.persistence_threshold = duration_from_secs(secs, "GUARD_PERSISTENCE_SECS")?;
        }
        if let Ok(dir) = std::env::var("GUARD_LOG_DIR") {
            if !dir.trim().is_empty() {
                self.log_dir = PathBuf::from(dir);
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.access_code.trim().is_empty() {
            return Err(anyhow!("access_code must not be empty"));
        }
        if self.persistence_threshold.is_zero() {
            return Err(anyhow!("persistence_threshold_secs must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(anyhow!("confidence_threshold must be within 0..=1"));
        }
        if self.camera.target_fps == 0 {
            return Err(anyhow!("camera target_fps must be greater than zero"));
        }
        Ok(())
    }
}

/// Float-seconds conversion that rejects negative, NaN, and infinite values
/// with an error instead of panicking.
fn duration_from_secs(secs: f64, what: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| anyhow!("{what} must be a finite, non-negative number of seconds"))
}

fn read_config_file(path: &Path) -> Result<GuardConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
