use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_embedder::{EmbedError, FaceDescriptor, FaceEmbedder};
use crate::detection::infrastructure::arcface_encoder::ArcFaceEncoder;
use crate::detection::infrastructure::onnx_yolo_detector::{OnnxYoloDetector, DEFAULT_CONFIDENCE};
use crate::shared::frame::Frame;

/// Produces identity embeddings for crops of a single face.
pub trait CropEncoder: Send {
    fn encode(&mut self, crop: &Frame) -> Result<Vec<f32>, Box<dyn std::error::Error>>;
}

impl CropEncoder for ArcFaceEncoder {
    fn encode(&mut self, crop: &Frame) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        ArcFaceEncoder::encode(self, crop)
    }
}

/// Detect-then-encode face embedder.
///
/// Every detected box is squared around its center, cropped from the
/// frame and encoded on its own. Descriptors keep detection order.
pub struct OnnxFaceEmbedder {
    detector: Box<dyn FaceDetector>,
    encoder: Box<dyn CropEncoder>,
}

impl OnnxFaceEmbedder {
    pub fn new(detector: Box<dyn FaceDetector>, encoder: Box<dyn CropEncoder>) -> Self {
        Self { detector, encoder }
    }

    /// YOLO detector plus ArcFace encoder loaded from model files.
    pub fn from_models(
        detector_model: &Path,
        encoder_model: &Path,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let detector = OnnxYoloDetector::new(detector_model, DEFAULT_CONFIDENCE)?;
        let encoder = ArcFaceEncoder::new(encoder_model)?;
        Ok(Self::new(Box::new(detector), Box::new(encoder)))
    }
}

impl FaceEmbedder for OnnxFaceEmbedder {
    fn represent(&mut self, frame: &Frame) -> Result<Vec<FaceDescriptor>, EmbedError> {
        let boxes = self
            .detector
            .detect(frame)
            .map_err(|e| EmbedError::Inference(e.to_string()))?;
        if boxes.is_empty() {
            return Err(EmbedError::NoFace);
        }

        let mut descriptors = Vec::with_capacity(boxes.len());
        for face in &boxes {
            let [x1, y1, x2, y2] = face.squared(frame.width(), frame.height());
            let Some(crop) = frame.crop(x1, y1, x2, y2) else {
                continue;
            };
            let embedding = self
                .encoder
                .encode(&crop)
                .map_err(|e| EmbedError::Inference(e.to_string()))?;
            descriptors.push(FaceDescriptor {
                embedding,
                confidence: face.confidence,
            });
        }

        if descriptors.is_empty() {
            return Err(EmbedError::NoFace);
        }
        Ok(descriptors)
    }
}
