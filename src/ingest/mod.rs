//! Frame ingestion.
//!
//! The monitoring core consumes a `next_frame() -> FramePull` capability and
//! nothing else. This layer owns device specifics and the bounded-backoff
//! reconnect policy applied when a stream drops.

mod camera;
mod reconnect;

pub use camera::{CameraConfig, CameraSource, CameraStats, FramePull};
pub use reconnect::ReconnectPolicy;
