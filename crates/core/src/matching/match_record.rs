use serde::Serialize;

use crate::sampling::sample_config::effective_fps;

/// A sampled frame whose face matched the reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    pub frame_index: usize,
    /// `MM:SS` position of the frame in the video.
    pub timestamp: String,
}

impl MatchRecord {
    pub fn new(frame_index: usize, fps: f64) -> Self {
        let seconds = frame_index as f64 / effective_fps(fps);
        Self {
            frame_index,
            timestamp: format_mmss(seconds),
        }
    }
}

/// Formats whole seconds as zero-padded `MM:SS`, truncating fractions.
///
/// Minutes keep growing past 59 (`75:00` for 4500 s); negative and
/// non-finite input formats as `00:00`.
pub fn format_mmss(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}
