use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};

/// Stub backend for testing and `stub://` camera runs.
///
/// Simulates a fixed vantage point watching a small desk scene. Most frames
/// report the full scene; periodically one object "disappears" for a stretch
/// of frames, which exercises the change-detection path end to end without a
/// real model.
pub struct StubBackend {
    frame_count: u64,
    /// Every `cycle` frames the scene loses an object for `gap` frames.
    cycle: u64,
    gap: u64,
}

const DEFAULT_CYCLE: u64 = 200;
const DEFAULT_GAP: u64 = 50;

impl StubBackend {
    pub fn new() -> Self {
        Self {
            frame_count: 0,
            cycle: DEFAULT_CYCLE,
            gap: DEFAULT_GAP,
        }
    }

    /// Override the scene churn cadence (mainly for tests).
    pub fn with_cadence(cycle: u64, gap: u64) -> Self {
        Self {
            frame_count: 0,
            cycle: cycle.max(1),
            gap,
        }
    }

    fn scene_is_disturbed(&self) -> bool {
        self.frame_count % self.cycle < self.gap && self.frame_count >= self.cycle
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        self.frame_count += 1;

        let w = width.max(4);
        let h = height.max(4);
        let mut detections = vec![Detection::new(
            "cup",
            BoundingBox {
                x1: w / 2,
                y1: h / 4,
                x2: w / 2 + w / 8,
                y2: h / 2,
            },
            0.91,
        )];

        if !self.scene_is_disturbed() {
            detections.push(Detection::new(
                "bottle",
                BoundingBox {
                    x1: w / 8,
                    y1: h / 4,
                    x2: w / 4,
                    y2: h / 2,
                },
                0.88,
            ));
        }

        Ok(detections)
    }
}
