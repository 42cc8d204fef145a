use anyhow::Result;

use crate::detect::result::Detection;

/// Detector backend trait.
///
/// A backend turns raw RGB pixels into class + bounding-box detections. It is
/// the swappable seam in front of whatever model actually runs (ONNX, remote
/// inference, a synthetic scene for tests).
///
/// Backends report *unfiltered* detections; confidence thresholding and the
/// trackable-class allow-list are applied by [`crate::detect::Detector`].
///
/// A backend failure on a single frame is transient-recoverable: the caller
/// skips detection for that tick and keeps running. Failure to *construct* a
/// backend at startup is fatal.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
