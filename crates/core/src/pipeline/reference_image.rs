use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use thiserror::Error;

use crate::detection::domain::face_embedder::{EmbedError, FaceEmbedder};
use crate::matching::reference_embedding::{ReferenceEmbedding, ReferenceError};
use crate::shared::constants::REFERENCE_IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum ReferenceImageError {
    #[error("Please select an image file.")]
    Empty,
    #[error("The image does not exist.")]
    Missing,
    #[error("Only JPG, PNG, or WebP files are accepted.")]
    UnsupportedFormat,
    #[error("The image could not be loaded. Please verify it is not corrupted.")]
    Unreadable,
    #[error("No faces detected in the image.")]
    NoFace,
    #[error("Multiple faces detected. Please use an image with exactly one face.")]
    MultipleFaces,
    #[error("Face detection failed: {0}")]
    Detection(String),
    #[error("Face detection failed: {0}")]
    InvalidEmbedding(#[from] ReferenceError),
}

/// A reference photo that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedReference {
    pub embedding: ReferenceEmbedding,
    /// User-facing confirmation, e.g. "Valid image with 1 face detected: me.jpg".
    pub message: String,
}

/// Checks the reference photo and embeds its single face.
///
/// Faces below `min_face_confidence` are not counted. Any temporary copy
/// made for decoding is gone when this returns.
pub fn load_reference(
    path: &Path,
    embedder: &mut dyn FaceEmbedder,
    min_face_confidence: f64,
) -> Result<ValidatedReference, ReferenceImageError> {
    if path.as_os_str().is_empty() {
        return Err(ReferenceImageError::Empty);
    }
    if !path.is_file() {
        return Err(ReferenceImageError::Missing);
    }
    if !has_reference_extension(path) {
        return Err(ReferenceImageError::UnsupportedFormat);
    }

    let frame = decode_image(path)?;

    let descriptors = match embedder.represent(&frame) {
        Ok(descriptors) => descriptors,
        Err(EmbedError::NoFace) => return Err(ReferenceImageError::NoFace),
        Err(EmbedError::Inference(reason)) => return Err(ReferenceImageError::Detection(reason)),
    };
    let mut faces: Vec<_> = descriptors
        .into_iter()
        .filter(|d| d.confidence >= min_face_confidence)
        .collect();

    let face = match faces.len() {
        0 => return Err(ReferenceImageError::NoFace),
        1 => faces.remove(0),
        n => {
            log::debug!("Reference image has {n} faces");
            return Err(ReferenceImageError::MultipleFaces);
        }
    };

    let embedding = ReferenceEmbedding::new(face.embedding)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(ValidatedReference {
        embedding,
        message: format!("Valid image with 1 face detected: {name}"),
    })
}

fn has_reference_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            REFERENCE_IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
}

fn decode_image(path: &Path) -> Result<Frame, ReferenceImageError> {
    let (decodable, _copy) = ascii_safe_path(path).map_err(|e| {
        log::warn!("Could not stage {}: {e}", path.display());
        ReferenceImageError::Unreadable
    })?;

    let rgb = image::open(&decodable)
        .map_err(|e| {
            log::warn!("Could not decode {}: {e}", path.display());
            ReferenceImageError::Unreadable
        })?
        .to_rgb8();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Err(ReferenceImageError::Unreadable);
    }
    Ok(Frame::new(rgb.into_raw(), width, height, 0))
}

/// Returns a path with only ASCII characters pointing at the same bytes.
///
/// Non-ASCII paths are copied to a temporary file that is deleted when
/// the returned guard drops.
fn ascii_safe_path(path: &Path) -> std::io::Result<(PathBuf, Option<TempPath>)> {
    if path.to_str().is_some_and(str::is_ascii) {
        return Ok((path.to_path_buf(), None));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let copy = tempfile::Builder::new()
        .prefix("facehunt-ref-")
        .suffix(&format!(".{ext}"))
        .tempfile()?
        .into_temp_path();
    fs::copy(path, &copy)?;
    Ok((copy.to_path_buf(), Some(copy)))
}
