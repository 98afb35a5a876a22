use crate::shared::frame::Frame;

/// Axis-aligned face bounding box in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub confidence: f64,
}

impl FaceBox {
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Square box centered on this one, side = longest edge, clamped to the frame.
    pub fn squared(&self, frame_width: u32, frame_height: u32) -> [u32; 4] {
        let side = self.width().max(self.height());
        let cx = (self.x1 + self.x2) / 2.0;
        let cy = (self.y1 + self.y2) / 2.0;
        let clamp = |v: f64, max: u32| v.round().clamp(0.0, max as f64) as u32;
        [
            clamp(cx - side / 2.0, frame_width),
            clamp(cy - side / 2.0, frame_height),
            clamp(cx + side / 2.0, frame_width),
            clamp(cy + side / 2.0, frame_height),
        ]
    }
}

/// Domain interface for face detection.
///
/// Takes `&mut self` because inference sessions need exclusive access.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x1: f64, y1: f64, x2: f64, y2: f64) -> FaceBox {
        FaceBox {
            x1,
            y1,
            x2,
            y2,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_squared_uses_longest_edge() {
        let sq = face(40.0, 20.0, 60.0, 60.0).squared(200, 200);
        assert_eq!(sq, [30, 20, 70, 60]);
    }

    #[test]
    fn test_squared_clamps_to_frame() {
        let sq = face(-10.0, 90.0, 30.0, 130.0).squared(100, 100);
        assert_eq!(sq, [0, 90, 30, 100]);
    }
}
