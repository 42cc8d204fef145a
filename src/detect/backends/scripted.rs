use std::collections::VecDeque;

use anyhow::{anyhow, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;

/// One scripted tick: either a detection snapshot or an injected failure.
#[derive(Clone, Debug)]
pub enum ScriptedStep {
    Detections(Vec<Detection>),
    Fail(String),
}

/// Scripted backend for tests.
///
/// Plays back a fixed sequence of per-tick outcomes. When the script runs
/// out, the last detection snapshot repeats, so a test can script a change
/// and then let the scene "hold" across the persistence window.
pub struct ScriptedBackend {
    script: VecDeque<ScriptedStep>,
    last: Vec<Detection>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<ScriptedStep>) -> Self {
        Self {
            script: script.into(),
            last: Vec::new(),
        }
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<Vec<Detection>> {
        match self.script.pop_front() {
            Some(ScriptedStep::Detections(detections)) => {
                self.last = detections.clone();
                Ok(detections)
            }
            Some(ScriptedStep::Fail(reason)) => Err(anyhow!("scripted detector failure: {reason}")),
            None => Ok(self.last.clone()),
        }
    }
}
