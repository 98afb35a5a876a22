use std::path::{Path, PathBuf};

use reqwest::Url;
use tempfile::TempPath;
use thiserror::Error;

use crate::source::domain::video_fetcher::{FetchError, VideoFetcher};
use crate::video::domain::video_reader::VideoReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Local,
    Remote,
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Please select a video file or enter a video URL.")]
    Empty,
    #[error("The video could not be found.")]
    SourceNotFound,
    #[error("The video cannot be played: {0}")]
    SourceUnplayable(String),
    #[error(
        "Not enough disk space to download the video: {} MB needed, {} MB available.",
        .needed / (1024 * 1024),
        .available / (1024 * 1024)
    )]
    InsufficientStorage { needed: u64, available: u64 },
    #[error("The video could not be downloaded: {0}")]
    FetchFailed(String),
}

impl From<FetchError> for SourceError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::NotFound => SourceError::SourceNotFound,
            FetchError::Unplayable => {
                SourceError::SourceUnplayable("the server did not return a video".into())
            }
            FetchError::InsufficientStorage { needed, available } => {
                SourceError::InsufficientStorage { needed, available }
            }
            FetchError::Other(reason) => SourceError::FetchFailed(reason),
        }
    }
}

/// A video file ready for sampling.
///
/// Files this run downloaded are deleted when the value drops. Local files
/// given by the caller, and downloads reused from another run, are never
/// touched.
#[derive(Debug)]
pub struct ResolvedSource {
    path: PathBuf,
    kind: SourceKind,
    _cleanup: Option<TempPath>,
}

impl ResolvedSource {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }
}

/// Classifies locators and turns them into local files.
pub struct VideoSourceResolver {
    fetcher: Box<dyn VideoFetcher>,
}

impl VideoSourceResolver {
    pub fn new(fetcher: Box<dyn VideoFetcher>) -> Self {
        Self { fetcher }
    }

    /// Decides whether `locator` is a playable local file or a remote URL.
    ///
    /// Local files are probed by opening them with `probe`; remote
    /// locators are only checked syntactically here.
    pub fn validate(
        &self,
        locator: &str,
        probe: &mut dyn VideoReader,
    ) -> Result<SourceKind, SourceError> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Err(SourceError::Empty);
        }

        let path = Path::new(locator);
        if path.is_file() {
            let probed = probe.open(path);
            probe.close();
            return match probed {
                Ok(_) => Ok(SourceKind::Local),
                Err(e) => Err(SourceError::SourceUnplayable(e.to_string())),
            };
        }

        if is_remote(locator) {
            return Ok(SourceKind::Remote);
        }
        Err(SourceError::SourceNotFound)
    }

    pub fn resolve(&self, locator: &str, kind: SourceKind) -> Result<ResolvedSource, SourceError> {
        let locator = locator.trim();
        match kind {
            SourceKind::Local => Ok(ResolvedSource {
                path: PathBuf::from(locator),
                kind,
                _cleanup: None,
            }),
            SourceKind::Remote => {
                let fetched = self.fetcher.fetch(locator)?;
                let cleanup = if fetched.created {
                    log::info!("Fetched {locator} to {}", fetched.path.display());
                    Some(TempPath::from_path(&fetched.path))
                } else {
                    log::info!("Reusing {} for {locator}", fetched.path.display());
                    None
                };
                Ok(ResolvedSource {
                    path: fetched.path,
                    kind,
                    _cleanup: cleanup,
                })
            }
        }
    }
}

fn is_remote(locator: &str) -> bool {
    Url::parse(locator)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}
