pub const DETECTION_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const DETECTION_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// Encoding distance below which two faces are considered the same person.
/// Capabilities with a different metric override this via
/// `FaceCapability::match_threshold`.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.6;

pub const DEFAULT_UPSAMPLE_COUNT: u32 = 1;
pub const MAX_UPSAMPLE_COUNT: u32 = 10;

/// Extension of every job's output artifact.
pub const OUTPUT_EXTENSION: &str = "mp4";
