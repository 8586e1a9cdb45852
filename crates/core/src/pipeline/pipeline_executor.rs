use std::path::Path;

use thiserror::Error;

use crate::censoring::domain::frame_censor::FrameCensor;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

use super::domain::frame_analyzer::FrameAnalyzer;

/// Called after each frame is handed to the encoder with
/// `(frames_done, total_frames)`. `total_frames` may be 0 when unknown.
pub type ProgressFn = Box<dyn Fn(usize, usize) + Send>;

/// Configuration for a pipeline execution run.
#[derive(Default)]
pub struct PipelineConfig {
    pub on_progress: Option<ProgressFn>,
}

/// Stage at which a pipeline run failed. Executors box it into their
/// `Box<dyn Error>` so callers can recover the stage with `downcast_ref`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineFailure {
    #[error("decoding failed: {0}")]
    Decode(String),

    #[error("analysis of frame {frame_index} failed: {reason}")]
    Analyze { frame_index: usize, reason: String },

    #[error("censoring frame {frame_index} failed: {reason}")]
    Censor { frame_index: usize, reason: String },

    #[error("encoding failed: {0}")]
    Encode(String),
}

/// Abstracts how the read → analyze → censor → write pipeline is executed.
///
/// Implementations must write every decoded frame, in index order.
pub trait PipelineExecutor: Send {
    /// Returns the number of frames written.
    #[allow(clippy::too_many_arguments)]
    fn execute(
        &self,
        reader: Box<dyn VideoReader>,
        writer: Box<dyn VideoWriter>,
        analyzer: FrameAnalyzer,
        censor: Box<dyn FrameCensor>,
        metadata: &VideoMetadata,
        output_path: &Path,
        config: PipelineConfig,
    ) -> Result<usize, Box<dyn std::error::Error>>;
}
