use std::path::Path;
use std::sync::Arc;

use crate::censoring::infrastructure::censor_factory::create_censor;
use crate::detection::domain::face_capability::FaceCapability;
use crate::jobs::domain::job_request::JobRequest;
use crate::jobs::domain::video_processor::VideoProcessor;
use crate::pipeline::censor_video_use_case::{CensorVideoUseCase, PipelineSummary};
use crate::pipeline::infrastructure::threaded_pipeline_executor::ThreadedPipelineExecutor;
use crate::pipeline::pipeline_executor::ProgressFn;
use crate::shared::error::CensorError;
use crate::video::infrastructure::ffmpeg_reader::FfmpegReader;
use crate::video::infrastructure::ffmpeg_writer::FfmpegWriter;
use crate::video::infrastructure::image_file_reader::ImageFileReader;

/// Production processor: ffmpeg decode/encode, `image` reference loading
/// and the threaded pipeline, sharing one face capability across jobs.
pub struct FfmpegVideoProcessor {
    capability: Arc<dyn FaceCapability>,
}

impl FfmpegVideoProcessor {
    pub fn new(capability: Arc<dyn FaceCapability>) -> Self {
        Self { capability }
    }
}

impl VideoProcessor for FfmpegVideoProcessor {
    fn process(
        &self,
        request: &JobRequest,
        output_path: &Path,
        on_progress: ProgressFn,
    ) -> Result<PipelineSummary, CensorError> {
        let mut use_case = CensorVideoUseCase::new(
            Box::new(FfmpegReader::new()),
            Box::new(FfmpegWriter::new()),
            create_censor(request.censor_type),
            Box::new(ImageFileReader::new()),
            self.capability.clone(),
            Box::new(ThreadedPipelineExecutor::new()),
        );
        use_case.execute(
            &request.input,
            output_path,
            &request.settings,
            Some(on_progress),
        )
    }
}
