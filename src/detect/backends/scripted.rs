use std::collections::VecDeque;
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::detect::vocabulary::COCO_CLASSES;
use crate::frame::Frame;

/// Scripted backend for tests and demos.
///
/// Replays one pre-recorded detection list per `detect` call, in order. Once the
/// script is exhausted every further call returns no detections. The backend
/// ignores pixel content entirely and records which frame indices it was
/// invoked on.
pub struct ScriptedBackend {
    script: VecDeque<Vec<Detection>>,
    calls: Vec<u64>,
    fail_on_call: Option<usize>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Vec<Detection>>) -> Self {
        Self {
            script: script.into(),
            calls: Vec::new(),
            fail_on_call: None,
        }
    }

    /// A backend that never detects anything.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Load a script from a JSON file: an array of per-call detection arrays.
    ///
    /// ```json
    /// [[{"class_name": "chair", "box": {"x1": 0, "y1": 0, "x2": 100, "y2": 100}, "confidence": 0.9}], []]
    /// ```
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read detection script {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("invalid detection script {}", path.display()))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let script: Vec<Vec<Detection>> = serde_json::from_str(raw)?;
        Ok(Self::new(script))
    }

    /// Make the `n`th call (1-based) return an error instead of detections.
    pub fn fail_on_call(mut self, n: usize) -> Self {
        self.fail_on_call = Some(n);
        self
    }

    /// Frame indices this backend was invoked on, in call order.
    pub fn calls(&self) -> &[u64] {
        &self.calls
    }

    /// Scripted calls not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn vocabulary(&self) -> &[&'static str] {
        &COCO_CLASSES
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        self.calls.push(frame.index);
        if self.fail_on_call == Some(self.calls.len()) {
            return Err(anyhow!(
                "scripted detector failure on call {}",
                self.calls.len()
            ));
        }
        Ok(self.script.pop_front().unwrap_or_default())
    }
}
