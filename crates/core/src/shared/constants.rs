pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// Application directory name under the platform cache/config dirs.
pub const APP_DIR_NAME: &str = "FaceHunt";

/// Used when the container reports a non-positive frame rate.
pub const DEFAULT_FPS: f64 = 30.0;

/// Cosine distance below which two faces are the same person. Lower is stricter.
pub const DEFAULT_DISTANCE_THRESHOLD: f64 = 0.32;

/// Detections below this confidence are ignored by the matcher.
pub const DEFAULT_MIN_FACE_CONFIDENCE: f64 = 0.5;

/// Sampled frames per batch for large videos.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Upper bound on the single terminal batch used for small videos.
pub const DEFAULT_SINGLE_PASS_MAX_FRAMES: usize = 250;

pub const LARGE_VIDEO_BYTES: u64 = 100 * 1024 * 1024;
pub const LARGE_VIDEO_MINUTES: f64 = 30.0;

/// Free space required relative to the expected download size.
pub const FREE_SPACE_MARGIN: f64 = 1.1;

/// Assumed download size when the server doesn't report one.
pub const FALLBACK_DOWNLOAD_BYTES: u64 = 800 * 1024 * 1024;

pub const REFERENCE_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "mov", "avi", "m4v"];
