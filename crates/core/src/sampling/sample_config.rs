use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::shared::constants::DEFAULT_FPS;

/// How densely frames are sampled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMode {
    /// One frame every half second.
    #[default]
    Fast,
    /// One frame every quarter second.
    Precise,
}

impl SamplingMode {
    pub const ALL: &[SamplingMode] = &[SamplingMode::Fast, SamplingMode::Precise];

    pub fn seconds_per_sample(self) -> f64 {
        match self {
            SamplingMode::Fast => 0.5,
            SamplingMode::Precise => 0.25,
        }
    }
}

impl fmt::Display for SamplingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplingMode::Fast => write!(f, "fast"),
            SamplingMode::Precise => write!(f, "precise"),
        }
    }
}

impl FromStr for SamplingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fast" | "balanced" => Ok(SamplingMode::Fast),
            "precise" | "high precision" | "high-precision" => Ok(SamplingMode::Precise),
            other => Err(format!(
                "Sampling mode must be 'fast' or 'precise', got '{other}'"
            )),
        }
    }
}

/// Sampling parameters derived once per opened video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleConfig {
    pub mode: SamplingMode,
    pub fps: f64,
    /// Decoded frames per sampled frame; always at least 1.
    pub frame_interval: usize,
    pub total_frames: usize,
    /// `total_frames / frame_interval`, integer division.
    pub processable_frames: usize,
}

impl SampleConfig {
    /// Derives the interval from the stream's frame rate.
    ///
    /// A non-positive or non-finite `fps` is replaced by [`DEFAULT_FPS`].
    pub fn new(mode: SamplingMode, fps: f64, total_frames: usize) -> Self {
        let fps = effective_fps(fps);
        let frame_interval = ((fps * mode.seconds_per_sample()).floor() as usize).max(1);
        Self {
            mode,
            fps,
            frame_interval,
            total_frames,
            processable_frames: total_frames / frame_interval,
        }
    }

    pub fn is_sampled(&self, frame_index: usize) -> bool {
        frame_index % self.frame_interval == 0
    }
}

pub fn effective_fps(fps: f64) -> f64 {
    if fps.is_finite() && fps > 0.0 {
        fps
    } else {
        DEFAULT_FPS
    }
}
