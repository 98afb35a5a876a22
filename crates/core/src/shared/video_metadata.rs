use std::path::PathBuf;

/// Container-level facts about an opened video.
///
/// `fps` and `total_frames` come straight from the container and may be
/// zero when the metadata is missing or unreliable; the sampler is
/// responsible for substituting sane values.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Estimated duration in minutes, or `None` if fps or frame count is unknown.
    pub fn duration_minutes(&self) -> Option<f64> {
        if self.fps > 0.0 && self.total_frames > 0 {
            Some(self.total_frames as f64 / self.fps / 60.0)
        } else {
            None
        }
    }
}
