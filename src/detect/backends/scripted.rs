use std::collections::VecDeque;
use std::path::Path;

use anyhow::{Context, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Replays a fixed detection script, one entry per frame.
///
/// The script is a JSON array with one array of detections per frame:
///
/// ```json
/// [
///   [{"bbox": {"x1": 10, "y1": 10, "x2": 90, "y2": 70}, "label": "horse", "confidence": 0.6}],
///   []
/// ]
/// ```
///
/// Once the script runs out every further frame yields no detections, unless
/// the backend was built with [`ScriptedBackend::looping`].
pub struct ScriptedBackend {
    script: Vec<Vec<Detection>>,
    pending: VecDeque<Vec<Detection>>,
    looping: bool,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Vec<Detection>>) -> Self {
        Self {
            pending: script.iter().cloned().collect(),
            script,
            looping: false,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let script: Vec<Vec<Detection>> =
            serde_json::from_str(json).context("invalid detection script")?;
        Ok(Self::new(script))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read detection script {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("loading {}", path.display()))
    }

    /// Restart the script from the top once it is exhausted.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        if self.pending.is_empty() && self.looping {
            self.pending = self.script.iter().cloned().collect();
        }
        Ok(self.pending.pop_front().unwrap_or_default())
    }
}
