use thiserror::Error;

use crate::shared::frame::Frame;

/// One detected face and its identity embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceDescriptor {
    pub embedding: Vec<f32>,
    /// Detection confidence in `[0, 1]`.
    pub confidence: f64,
}

#[derive(Error, Debug)]
pub enum EmbedError {
    /// Expected outcome for frames without a detectable face.
    #[error("no face detected")]
    NoFace,
    #[error("face embedding failed: {0}")]
    Inference(String),
}

/// Turns an RGB frame into one descriptor per detected face.
///
/// Embeddings produced by one instance all have the same length.
/// Returns [`EmbedError::NoFace`] rather than an empty list when no
/// face is found.
pub trait FaceEmbedder: Send {
    fn represent(&mut self, frame: &Frame) -> Result<Vec<FaceDescriptor>, EmbedError>;
}
