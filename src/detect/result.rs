use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Axis-aligned bounding box in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

/// One detected object instance in a frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Object-class name (e.g. "bottle", "laptop").
    pub class: String,
    pub bbox: BoundingBox,
    pub confidence: f32,
}

impl Detection {
    pub fn new(class: &str, bbox: BoundingBox, confidence: f32) -> Self {
        Self {
            class: class.to_string(),
            bbox,
            confidence,
        }
    }
}

/// Per-class frequency counts derived from a detection snapshot.
pub type CountSnapshot = BTreeMap<String, u32>;

/// Frequency-count a detection snapshot by class name.
pub fn count_objects(detections: &[Detection]) -> CountSnapshot {
    let mut counts = CountSnapshot::new();
    for d in detections {
        *counts.entry(d.class.clone()).or_insert(0) += 1;
    }
    counts
}
