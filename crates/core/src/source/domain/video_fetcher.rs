use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("video not found")]
    NotFound,
    #[error("video is not playable")]
    Unplayable,
    #[error("not enough free space: need {needed} bytes, {available} available")]
    InsufficientStorage { needed: u64, available: u64 },
    #[error("{0}")]
    Other(String),
}

/// A local copy of a remote video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedVideo {
    pub path: PathBuf,
    /// True when this fetch transferred the file; false when an earlier
    /// fetch had already left it in place and it was reused.
    pub created: bool,
}

/// Turns a remote locator into a local video file.
///
/// Repeated fetches of the same locator return the same path without
/// transferring again while the file exists. Implementations must not
/// leave partial files behind on failure.
pub trait VideoFetcher: Send {
    fn fetch(&self, locator: &str) -> Result<FetchedVideo, FetchError>;
}
