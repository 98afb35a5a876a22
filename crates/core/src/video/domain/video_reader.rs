use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

#[derive(Error, Debug)]
pub enum VideoError {
    #[error("could not open {path}: {reason}")]
    Open { path: PathBuf, reason: String },
    #[error("no video stream found in {0}")]
    NoVideoStream(PathBuf),
    #[error("video decoding failed: {0}")]
    Decode(String),
    #[error("video reader is not open")]
    NotOpened,
}

/// Pull-based sequential decoder.
///
/// Frames come out in decode order, each exactly once. Implementations
/// handle codec and container details; callers only see RGB [`Frame`]s
/// and [`VideoMetadata`].
pub trait VideoReader: Send {
    /// Opens a video file and returns its metadata.
    ///
    /// Opening again restarts decoding from the first frame.
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, VideoError>;

    /// Decodes the next frame without converting its pixels.
    ///
    /// Returns `false` once the stream is exhausted.
    fn skip_frame(&mut self) -> Result<bool, VideoError>;

    /// Decodes the next frame and converts it to RGB.
    fn read_frame(&mut self) -> Result<Option<Frame>, VideoError>;

    /// Releases the decoder. Safe to call more than once.
    fn close(&mut self);
}
