use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sampling::sample_config::SamplingMode;
use crate::shared::constants::{
    APP_DIR_NAME, DEFAULT_BATCH_SIZE, DEFAULT_DISTANCE_THRESHOLD, DEFAULT_MIN_FACE_CONFIDENCE,
    DEFAULT_SINGLE_PASS_MAX_FRAMES, FREE_SPACE_MARGIN, LARGE_VIDEO_BYTES, LARGE_VIDEO_MINUTES,
};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// User-tunable search parameters, persisted as JSON.
///
/// Missing fields take their defaults, so older files keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub mode: SamplingMode,
    /// Cosine distance below which a face counts as a match.
    pub distance_threshold: f64,
    /// Faces detected below this confidence are ignored.
    pub min_face_confidence: f64,
    pub batch_size: usize,
    pub single_pass_max_frames: usize,
    pub large_video_bytes: u64,
    pub large_video_minutes: f64,
    pub free_space_margin: f64,
    pub download_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: SamplingMode::default(),
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            min_face_confidence: DEFAULT_MIN_FACE_CONFIDENCE,
            batch_size: DEFAULT_BATCH_SIZE,
            single_pass_max_frames: DEFAULT_SINGLE_PASS_MAX_FRAMES,
            large_video_bytes: LARGE_VIDEO_BYTES,
            large_video_minutes: LARGE_VIDEO_MINUTES,
            free_space_margin: FREE_SPACE_MARGIN,
            download_dir: None,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    /// Loads the user's settings, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            log::warn!("{e}; using default settings");
            Self::default()
        })
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = serde_json::from_str(&json).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self) -> Result<PathBuf, SettingsError> {
        let path = Self::config_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let write_err = |source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(write_err)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let invalid = |msg: String| Err(SettingsError::Invalid(msg));
        if !(self.distance_threshold > 0.0 && self.distance_threshold <= 2.0) {
            return invalid(format!(
                "distance_threshold must be in (0, 2], got {}",
                self.distance_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.min_face_confidence) {
            return invalid(format!(
                "min_face_confidence must be in [0, 1], got {}",
                self.min_face_confidence
            ));
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be at least 1".into());
        }
        if self.single_pass_max_frames == 0 {
            return invalid("single_pass_max_frames must be at least 1".into());
        }
        if !(self.large_video_minutes > 0.0) {
            return invalid(format!(
                "large_video_minutes must be positive, got {}",
                self.large_video_minutes
            ));
        }
        if !(self.free_space_margin >= 1.0) {
            return invalid(format!(
                "free_space_margin must be at least 1.0, got {}",
                self.free_space_margin
            ));
        }
        Ok(())
    }

    /// Where fetched videos are stored: the configured directory, else
    /// `<cache>/FaceHunt/videos`, else the system temp directory.
    pub fn resolved_download_dir(&self) -> PathBuf {
        self.download_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR_NAME)
                .join("videos")
        })
    }
}
