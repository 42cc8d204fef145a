//! Object detection provider boundary.
//!
//! The monitoring core consumes detections through [`Detector`], which wraps
//! a [`DetectorBackend`] and applies the configured confidence threshold and
//! trackable-class allow-list before anything downstream sees the snapshot.

mod backend;
mod backends;
mod result;

use anyhow::Result;

pub use backend::DetectorBackend;
pub use backends::{ScriptedBackend, ScriptedStep, StubBackend};
pub use result::{count_objects, BoundingBox, CountSnapshot, Detection};

use crate::frame::RawFrame;

/// Detection provider used by the monitoring loop.
///
/// Filtering happens here, not in backends, so every backend gets identical
/// allow-list semantics.
pub struct Detector {
    backend: Box<dyn DetectorBackend>,
    confidence_threshold: f32,
    /// Classes worth tracking. Empty means "track everything".
    tracked_classes: Vec<String>,
}

impl Detector {
    pub fn new(
        backend: Box<dyn DetectorBackend>,
        confidence_threshold: f32,
        tracked_classes: Vec<String>,
    ) -> Self {
        Self {
            backend,
            confidence_threshold,
            tracked_classes,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn warm_up(&mut self) -> Result<()> {
        self.backend.warm_up()
    }

    /// Run detection on a frame and filter the snapshot.
    ///
    /// Errors are transient: the caller logs and skips the tick.
    pub fn detect(&mut self, frame: &RawFrame) -> Result<Vec<Detection>> {
        let raw = self
            .backend
            .detect(frame.pixels(), frame.width, frame.height)?;
        Ok(raw
            .into_iter()
            .filter(|d| d.confidence >= self.confidence_threshold)
            .filter(|d| {
                self.tracked_classes.is_empty()
                    || self.tracked_classes.iter().any(|c| c == &d.class)
            })
            .collect())
    }
}
