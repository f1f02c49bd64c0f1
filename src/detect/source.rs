use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::path::Path;

use crate::detect::result::FrameDetections;

/// Producer of per-frame detector output.
///
/// The detector itself (model runtime, capture, transport) lives behind this
/// trait. Implementations own their own timeout and retry policy.
pub trait DetectionSource {
    /// Source identifier.
    fn name(&self) -> &'static str;

    /// Next frame of detections, or `None` when the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<FrameDetections>>;
}

/// Replays previously recorded frames in order.
#[derive(Debug, Default)]
pub struct ReplaySource {
    frames: VecDeque<FrameDetections>,
}

impl ReplaySource {
    pub fn new(frames: Vec<FrameDetections>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    /// Load a JSON array of `FrameDetections`.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read detections file {}: {}", path.display(), e))?;
        let frames: Vec<FrameDetections> = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid detections file {}: {}", path.display(), e))?;
        log::info!(
            "ReplaySource: loaded {} frames from {}",
            frames.len(),
            path.display()
        );
        Ok(Self::new(frames))
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl DetectionSource for ReplaySource {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn next_frame(&mut self) -> Result<Option<FrameDetections>> {
        Ok(self.frames.pop_front())
    }
}
