//! Frame container produced by the ingestion layer.
//!
//! A `RawFrame` owns decoded RGB pixel data plus the dimensions needed to run
//! detection or encode a snapshot. Frames are per-tick values: the monitoring
//! loop borrows one per tick, and the alarm coordinator takes ownership of a
//! clone when an alarm is raised (the "last alarm frame").

use std::time::Instant;

/// Owned RGB frame (3 bytes per pixel, row-major).
#[derive(Clone)]
pub struct RawFrame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Monotonic capture instant.
    pub captured_at: Instant,
}

impl RawFrame {
    /// Create a new frame. Called by the ingestion layer.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            captured_at: Instant::now(),
        }
    }

    /// Read-only pixel access for detection and snapshot encoding.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

impl std::fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Pixel bytes are elided; frames can be large.
        f.debug_struct("RawFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}
