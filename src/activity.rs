//! Activity logging and snapshot capture.
//!
//! Every accepted or refused transition produces an [`ActivityEvent`], stored
//! append-only in a per-day JSON container (`YYYY-MM-DD.json`). A corrupt
//! container is treated as empty and overwritten, matching the
//! data-corruption-recoverable policy for the baseline file.
//!
//! [`CaptureStore`] writes JPEG snapshots of the triggering frame into an
//! `authorized/` / `unauthorized/` partitioned directory tree.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::baseline::Baseline;
use crate::detect::CountSnapshot;
use crate::frame::RawFrame;

/// Activity event kinds, serialized with the wire names the log readers
/// already understand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    BaselineSet,
    InitialCameraDetection,
    StockChange,
    DefenseModeEnter,
    DefenseModeExit,
    DefenseModeAttempt,
    AlarmAcknowledged,
    AlarmAcknowledgedNoFrame,
    AlarmCodeIncorrect,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    Authorized,
    Unauthorized,
    Info,
}

impl AuthStatus {
    /// Capture-store partition for this status.
    fn partition(&self) -> &'static str {
        match self {
            AuthStatus::Unauthorized => "unauthorized",
            AuthStatus::Authorized | AuthStatus::Info => "authorized",
        }
    }
}

/// One appended activity record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub timestamp: String,
    pub event: EventKind,
    pub status: AuthStatus,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_baseline: Option<Baseline>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_objects: Option<CountSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_path: Option<String>,
}

impl ActivityEvent {
    pub fn new(event: EventKind, status: AuthStatus, details: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            event,
            status,
            details: details.into(),
            initial_baseline: None,
            actual_objects: None,
            change_details: None,
            capture_path: None,
        }
    }

    pub fn with_baseline(mut self, baseline: Baseline) -> Self {
        self.initial_baseline = Some(baseline);
        self
    }

    pub fn with_counts(mut self, counts: CountSnapshot) -> Self {
        self.actual_objects = Some(counts);
        self
    }

    pub fn with_change_details(mut self, details: impl Into<String>) -> Self {
        self.change_details = Some(details.into());
        self
    }

    pub fn with_capture_path(mut self, path: Option<PathBuf>) -> Self {
        self.capture_path = path.map(|p| p.display().to_string());
        self
    }
}

/// Append-only activity log keyed by calendar date.
pub struct ActivityLog {
    dir: PathBuf,
}

impl ActivityLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn container_path(&self) -> PathBuf {
        let today = Local::now().format("%Y-%m-%d").to_string();
        self.dir.join(format!("{today}.json"))
    }

    /// Append an event to today's container.
    pub fn append(&self, event: &ActivityEvent) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create log dir {}", self.dir.display()))?;

        let path = self.container_path();
        let mut events = self.read_container(&path);
        events.push(event.clone());

        let json = serde_json::to_string_pretty(&events)?;
        std::fs::write(&path, json)
            .with_context(|| format!("write log container {}", path.display()))?;
        Ok(())
    }

    fn read_container(&self, path: &Path) -> Vec<ActivityEvent> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&raw) {
            Ok(events) => events,
            Err(e) => {
                log::warn!(
                    "log container {} is corrupt ({}); starting a fresh container",
                    path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    /// Read today's events (log review and tests).
    pub fn today(&self) -> Vec<ActivityEvent> {
        self.read_container(&self.container_path())
    }
}

/// JPEG snapshot store partitioned by authorization status.
pub struct CaptureStore {
    base_dir: PathBuf,
}

impl CaptureStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Encode and store a frame. Returns the stored path.
    pub fn capture(&self, frame: &RawFrame, status: AuthStatus) -> Result<PathBuf> {
        let dir = self.base_dir.join(status.partition());
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create capture dir {}", dir.display()))?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S%3f").to_string();
        let path = dir.join(format!("capture_{stamp}.jpg"));

        let img = image::RgbImage::from_raw(frame.width, frame.height, frame.pixels().to_vec())
            .ok_or_else(|| {
                anyhow!(
                    "frame byte length {} does not match {}x{} RGB",
                    frame.byte_len(),
                    frame.width,
                    frame.height
                )
            })?;
        img.save(&path)
            .with_context(|| format!("encode capture {}", path.display()))?;
        Ok(path)
    }
}
