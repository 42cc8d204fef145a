//! Camera frame source.
//!
//! `CameraSource` produces the per-tick `RawFrame`. The core requires only a
//! `next_frame() -> FramePull` capability; whether frames come from a real
//! device or the synthetic `stub://` backend is this layer's business.

use anyhow::{bail, Result};
use rand::Rng;

use crate::frame::RawFrame;

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Source URL. `stub://` selects the synthetic backend.
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
    /// Synthetic-backend knob: report `Disconnected` every N frames.
    /// Ignored by real backends; used to exercise the reconnect path.
    pub synthetic_disconnect_every: Option<u64>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            url: "stub://front_desk".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
            synthetic_disconnect_every: None,
        }
    }
}

/// One pull from the source: a frame, or notice that the stream dropped.
pub enum FramePull {
    Frame(RawFrame),
    Disconnected,
}

/// Camera frame source.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.url.starts_with("stub://") {
            Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
            })
        } else {
            bail!(
                "no ingestion backend built in for {}; use a stub:// source",
                config.url
            )
        }
    }

    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.connect(),
        }
    }

    /// Pull the next frame. `Disconnected` is a state, not an error; the
    /// caller drives the reconnect policy.
    pub fn next_frame(&mut self) -> Result<FramePull> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.next_frame(),
        }
    }

    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.stats(),
        }
    }
}

/// Frame statistics for health logging.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub url: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://)
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    config: CameraConfig,
    frame_count: u64,
    scene_state: u8,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            scene_state: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("CameraSource: connected to {} (synthetic)", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<FramePull> {
        self.frame_count += 1;

        if let Some(every) = self.config.synthetic_disconnect_every {
            if every > 0 && self.frame_count % every == 0 {
                return Ok(FramePull::Disconnected);
            }
        }

        let pixels = self.generate_synthetic_pixels();
        Ok(FramePull::Frame(RawFrame::new(
            pixels,
            self.config.width,
            self.config.height,
        )))
    }

    /// Static background with slow scene churn plus per-frame sensor noise.
    fn generate_synthetic_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (self.config.width * self.config.height * 3) as usize;

        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let noise: u8 = rand::thread_rng().gen_range(0..4);
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.scene_state as u64 + noise as u64) % 256) as u8;
        }
        pixels
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}
