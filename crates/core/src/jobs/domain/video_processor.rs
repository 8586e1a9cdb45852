use std::path::Path;

use crate::pipeline::censor_video_use_case::PipelineSummary;
use crate::pipeline::pipeline_executor::ProgressFn;
use crate::shared::error::CensorError;

use super::job_request::JobRequest;

/// Runs one request end to end on the calling thread, writing the finished
/// video to `output_path`.
pub trait VideoProcessor: Send + Sync {
    fn process(
        &self,
        request: &JobRequest,
        output_path: &Path,
        on_progress: ProgressFn,
    ) -> Result<PipelineSummary, CensorError>;
}
