use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Container-reported frame count, or an estimate from duration × fps.
    /// Zero when neither is available.
    pub total_frames: usize,
    pub codec: String,
    pub has_audio: bool,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Estimates a frame count from a duration in seconds when the
    /// container does not report one.
    pub fn estimate_frames(duration_secs: f64, fps: f64) -> usize {
        if duration_secs <= 0.0 || fps <= 0.0 {
            return 0;
        }
        (duration_secs * fps).round() as usize
    }
}
