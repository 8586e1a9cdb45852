use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::censoring::domain::frame_censor::FrameCensor;
use crate::detection::domain::detection_model::DetectionModel;
use crate::detection::domain::face_capability::FaceCapability;
use crate::detection::domain::reference_set::{ReferenceImage, ReferenceSet};
use crate::shared::constants::{DEFAULT_UPSAMPLE_COUNT, MAX_UPSAMPLE_COUNT, OUTPUT_EXTENSION};
use crate::shared::error::CensorError;
use crate::video::domain::image_reader::ImageReader;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

use super::domain::censor_mode::CensorMode;
use super::domain::face_selector::FaceSelector;
use super::domain::frame_analyzer::FrameAnalyzer;
use super::pipeline_executor::{PipelineConfig, PipelineExecutor, PipelineFailure, ProgressFn};

/// Which faces to censor and how hard to look for them.
#[derive(Clone, Debug, PartialEq)]
pub struct CensorSettings {
    pub mode: CensorMode,
    pub model: DetectionModel,
    pub upsample: u32,
    pub references: Vec<PathBuf>,
}

impl Default for CensorSettings {
    fn default() -> Self {
        Self {
            mode: CensorMode::All,
            model: DetectionModel::Hog,
            upsample: DEFAULT_UPSAMPLE_COUNT,
            references: Vec::new(),
        }
    }
}

impl CensorSettings {
    /// Checks the mode/reference pairing and the upsample range.
    pub fn validate(&self) -> Result<(), CensorError> {
        if !(1..=MAX_UPSAMPLE_COUNT).contains(&self.upsample) {
            return Err(CensorError::invalid(format!(
                "upsample count must be between 1 and {MAX_UPSAMPLE_COUNT}, got {}",
                self.upsample
            )));
        }
        match (self.mode.needs_references(), self.references.is_empty()) {
            (false, false) => Err(CensorError::invalid(
                "reference images cannot be used with mode 'all'",
            )),
            (true, true) => Err(CensorError::invalid(format!(
                "mode '{}' requires at least one reference image",
                self.mode
            ))),
            _ => Ok(()),
        }
    }
}

/// Outcome of a completed run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineSummary {
    pub frames: usize,
    pub elapsed: Duration,
}

impl PipelineSummary {
    pub fn frames_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}

/// Runs one video through decode → detect → select → censor → encode.
///
/// Single-use: `execute` consumes the reader, writer and censor, so a
/// second call fails with `InvalidParameters`.
///
/// Output is encoded to a hidden staging file next to `output_path` and
/// only renamed into place once fully written, so a failed run never
/// leaves a partial file at the output location.
pub struct CensorVideoUseCase {
    reader: Option<Box<dyn VideoReader>>,
    writer: Option<Box<dyn VideoWriter>>,
    censor: Option<Box<dyn FrameCensor>>,
    image_reader: Box<dyn ImageReader>,
    capability: Arc<dyn FaceCapability>,
    executor: Box<dyn PipelineExecutor>,
}

impl CensorVideoUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        writer: Box<dyn VideoWriter>,
        censor: Box<dyn FrameCensor>,
        image_reader: Box<dyn ImageReader>,
        capability: Arc<dyn FaceCapability>,
        executor: Box<dyn PipelineExecutor>,
    ) -> Self {
        Self {
            reader: Some(reader),
            writer: Some(writer),
            censor: Some(censor),
            image_reader,
            capability,
            executor,
        }
    }

    pub fn execute(
        &mut self,
        input: &Path,
        output_path: &Path,
        settings: &CensorSettings,
        on_progress: Option<ProgressFn>,
    ) -> Result<PipelineSummary, CensorError> {
        settings.validate()?;
        let (Some(mut reader), Some(writer), Some(censor)) =
            (self.reader.take(), self.writer.take(), self.censor.take())
        else {
            return Err(CensorError::invalid("pipeline already executed"));
        };

        log::info!(
            "Censoring {} (mode={}, model={}, upsample={})",
            input.display(),
            settings.mode,
            settings.model,
            settings.upsample
        );

        let metadata = reader
            .open(input)
            .map_err(|e| CensorError::UnreadableInput {
                path: input.to_path_buf(),
                reason: e.to_string(),
            })?;

        let references = if settings.mode.needs_references() {
            Some(self.build_references(settings)?)
        } else {
            None
        };
        let selector = FaceSelector::new(settings.mode, references)?;
        let analyzer = FrameAnalyzer::new(
            self.capability.clone(),
            settings.model,
            settings.upsample,
            selector,
        );

        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let staging = staging_path(output_path);
        let started = Instant::now();

        let result = self.executor.execute(
            reader,
            writer,
            analyzer,
            censor,
            &metadata,
            &staging,
            PipelineConfig { on_progress },
        );

        let frames = match result {
            Ok(frames) => frames,
            Err(e) => {
                remove_if_present(&staging);
                return Err(classify_failure(e, input));
            }
        };
        if let Err(e) = std::fs::rename(&staging, output_path) {
            remove_if_present(&staging);
            return Err(CensorError::EncodeFailure(format!(
                "cannot move output into {}: {e}",
                output_path.display()
            )));
        }

        let summary = PipelineSummary {
            frames,
            elapsed: started.elapsed(),
        };
        log::info!(
            "Censored {} frames in {:.1}s ({:.1} fps) -> {}",
            summary.frames,
            summary.elapsed.as_secs_f64(),
            summary.frames_per_second(),
            output_path.display()
        );
        Ok(summary)
    }

    fn build_references(&self, settings: &CensorSettings) -> Result<ReferenceSet, CensorError> {
        let images = settings
            .references
            .iter()
            .map(|path| {
                self.image_reader
                    .read(path)
                    .map(|frame| ReferenceImage {
                        path: path.clone(),
                        frame,
                    })
                    .map_err(|e| CensorError::UnreadableReference {
                        path: path.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        ReferenceSet::build(&*self.capability, &images, settings.model, settings.upsample)
    }
}

/// Hidden sibling of `output` the encoder writes to before the final rename.
/// Keeps the extension so the muxer still recognises the container.
pub fn staging_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let ext = output
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| OUTPUT_EXTENSION.to_string());
    output.with_file_name(format!(".{stem}.partial.{ext}"))
}

fn remove_if_present(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Could not remove partial output {}: {e}", path.display());
        }
    }
}

fn classify_failure(err: Box<dyn std::error::Error>, input: &Path) -> CensorError {
    match err.downcast_ref::<PipelineFailure>() {
        Some(PipelineFailure::Decode(reason)) => CensorError::UnreadableInput {
            path: input.to_path_buf(),
            reason: reason.clone(),
        },
        Some(PipelineFailure::Analyze {
            frame_index,
            reason,
        }) => CensorError::Detection {
            frame_index: *frame_index,
            reason: reason.clone(),
        },
        Some(PipelineFailure::Censor { .. }) => CensorError::EncodeFailure(err.to_string()),
        Some(PipelineFailure::Encode(reason)) => CensorError::EncodeFailure(reason.clone()),
        None => CensorError::EncodeFailure(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::pipeline::infrastructure::threaded_pipeline_executor::ThreadedPipelineExecutor;
    use crate::shared::face_box::FaceBox;
    use crate::shared::frame::Frame;
    use crate::testing::{
        paint, patch_frame, PatchCapability, RecordingCensor, StubReader, StubWriter, BLUE, RED,
    };
    use rstest::rstest;

    const RED_FACE: FaceBox = FaceBox {
        top: 4,
        right: 14,
        bottom: 14,
        left: 4,
    };
    const BLUE_FACE: FaceBox = FaceBox {
        top: 4,
        right: 34,
        bottom: 14,
        left: 24,
    };

    struct MapImageReader(HashMap<PathBuf, Frame>);

    impl ImageReader for MapImageReader {
        fn read(&self, path: &Path) -> Result<Frame, Box<dyn std::error::Error>> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| format!("cannot decode {}", path.display()).into())
        }
    }

    /// Three frames, each with a red and a blue face.
    fn two_face_frames() -> Vec<Frame> {
        (0..3)
            .map(|i| {
                let mut f = patch_frame(i, 40, 20, Some((RED_FACE, RED)));
                paint(&mut f, BLUE_FACE, BLUE);
                f
            })
            .collect()
    }

    fn capability() -> PatchCapability {
        let mut c = PatchCapability::new();
        for i in 0..3 {
            c = c.with_faces(i, vec![RED_FACE, BLUE_FACE]);
        }
        c
    }

    /// Reference photos decode as frame 0, so the capability reports the
    /// red face first for them too.
    fn red_reference() -> (PathBuf, Frame) {
        let mut f = patch_frame(0, 40, 20, Some((RED_FACE, RED)));
        paint(&mut f, BLUE_FACE, crate::testing::BACKGROUND);
        (PathBuf::from("/refs/red.png"), f)
    }

    struct Harness {
        use_case: CensorVideoUseCase,
        written: Arc<Mutex<Vec<Frame>>>,
        censored: Arc<Mutex<Vec<(usize, Vec<FaceBox>)>>>,
    }

    fn harness(reader: StubReader, writer: StubWriter, capability: PatchCapability) -> Harness {
        let written = writer.written.clone();
        let censor = RecordingCensor::new();
        let censored = censor.calls.clone();
        let (ref_path, ref_frame) = red_reference();
        let images = MapImageReader(HashMap::from([(ref_path, ref_frame)]));
        Harness {
            use_case: CensorVideoUseCase::new(
                Box::new(reader),
                Box::new(writer),
                Box::new(censor),
                Box::new(images),
                Arc::new(capability),
                Box::new(ThreadedPipelineExecutor::new()),
            ),
            written,
            censored,
        }
    }

    fn settings(mode: CensorMode, references: &[&str]) -> CensorSettings {
        CensorSettings {
            mode,
            references: references.iter().map(PathBuf::from).collect(),
            ..CensorSettings::default()
        }
    }

    fn censored_boxes(h: &Harness) -> Vec<Vec<FaceBox>> {
        h.censored.lock().unwrap().iter().map(|(_, b)| b.clone()).collect()
    }

    #[test]
    fn test_all_mode_censors_every_face_and_publishes_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let mut h = harness(StubReader::new(two_face_frames()), StubWriter::new(), capability());

        let summary = h
            .use_case
            .execute(Path::new("in.mp4"), &output, &settings(CensorMode::All, &[]), None)
            .unwrap();

        assert_eq!(summary.frames, 3);
        assert_eq!(censored_boxes(&h), vec![vec![RED_FACE, BLUE_FACE]; 3]);
        assert_eq!(h.written.lock().unwrap().len(), 3);
        assert!(output.exists());
        assert!(!staging_path(&output).exists());
    }

    #[rstest]
    #[case(CensorMode::One, RED_FACE)]
    #[case(CensorMode::AllExcept, BLUE_FACE)]
    fn test_reference_modes_pick_faces_by_identity(
        #[case] mode: CensorMode,
        #[case] expected: FaceBox,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let mut h = harness(StubReader::new(two_face_frames()), StubWriter::new(), capability());

        h.use_case
            .execute(
                Path::new("in.mp4"),
                &dir.path().join("out.mp4"),
                &settings(mode, &["/refs/red.png"]),
                None,
            )
            .unwrap();

        assert_eq!(censored_boxes(&h), vec![vec![expected]; 3]);
    }

    #[test]
    fn test_reference_without_face_fails_before_any_frame() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        // capability sees no face in the reference image (index 0)
        let mut h = harness(
            StubReader::new(two_face_frames()),
            StubWriter::new(),
            PatchCapability::new(),
        );

        let err = h
            .use_case
            .execute(
                Path::new("in.mp4"),
                &output,
                &settings(CensorMode::One, &["/refs/red.png"]),
                Some(Box::new(|_, _| panic!("no frame may be processed"))),
            )
            .unwrap_err();

        assert!(matches!(err, CensorError::NoReferenceFace { .. }));
        assert!(err.to_string().contains("reference"));
        assert!(h.written.lock().unwrap().is_empty());
        assert!(!output.exists());
    }

    #[test]
    fn test_unreadable_reference_image() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = harness(StubReader::new(two_face_frames()), StubWriter::new(), capability());
        let err = h
            .use_case
            .execute(
                Path::new("in.mp4"),
                &dir.path().join("out.mp4"),
                &settings(CensorMode::One, &["/refs/missing.png"]),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, CensorError::UnreadableReference { .. }));
    }

    #[test]
    fn test_unreadable_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = harness(
            StubReader::new(two_face_frames()).failing_open(),
            StubWriter::new(),
            capability(),
        );
        let err = h
            .use_case
            .execute(
                Path::new("broken.mp4"),
                &dir.path().join("out.mp4"),
                &CensorSettings::default(),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, CensorError::UnreadableInput { ref path, .. } if path == Path::new("broken.mp4")));
    }

    #[test]
    fn test_detection_failure_discards_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let mut h = harness(
            StubReader::new(two_face_frames()),
            StubWriter::new(),
            capability().failing_on_frame(2),
        );

        let err = h
            .use_case
            .execute(Path::new("in.mp4"), &output, &CensorSettings::default(), None)
            .unwrap_err();

        assert!(matches!(err, CensorError::Detection { frame_index: 2, .. }));
        assert!(!output.exists());
        assert!(!staging_path(&output).exists());
    }

    #[test]
    fn test_mux_failure_is_encode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let mut h = harness(
            StubReader::new(two_face_frames()),
            StubWriter::new().failing_close(),
            capability(),
        );

        let err = h
            .use_case
            .execute(Path::new("in.mp4"), &output, &CensorSettings::default(), None)
            .unwrap_err();

        assert!(matches!(err, CensorError::EncodeFailure(_)));
        assert!(!output.exists());
        assert!(!staging_path(&output).exists());
    }

    #[test]
    fn test_progress_reaches_total() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut h = harness(StubReader::new(two_face_frames()), StubWriter::new(), capability());

        h.use_case
            .execute(
                Path::new("in.mp4"),
                &dir.path().join("out.mp4"),
                &CensorSettings::default(),
                Some(Box::new(move |done, total| sink.lock().unwrap().push((done, total)))),
            )
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn test_second_execute_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = harness(StubReader::new(two_face_frames()), StubWriter::new(), capability());
        let output = dir.path().join("out.mp4");
        h.use_case
            .execute(Path::new("in.mp4"), &output, &CensorSettings::default(), None)
            .unwrap();
        assert!(matches!(
            h.use_case
                .execute(Path::new("in.mp4"), &output, &CensorSettings::default(), None),
            Err(CensorError::InvalidParameters(_))
        ));
    }

    #[rstest]
    #[case(settings(CensorMode::All, &["/refs/red.png"]))]
    #[case(settings(CensorMode::One, &[]))]
    #[case(settings(CensorMode::AllExcept, &[]))]
    #[case(CensorSettings { upsample: 0, ..CensorSettings::default() })]
    #[case(CensorSettings { upsample: 11, ..CensorSettings::default() })]
    fn test_invalid_settings(#[case] bad: CensorSettings) {
        assert!(matches!(bad.validate(), Err(CensorError::InvalidParameters(_))));
    }

    #[test]
    fn test_staging_path_is_hidden_sibling() {
        assert_eq!(
            staging_path(Path::new("/out/job.mp4")),
            PathBuf::from("/out/.job.partial.mp4")
        );
    }

    #[test]
    fn test_summary_fps() {
        let s = PipelineSummary {
            frames: 50,
            elapsed: Duration::from_secs(2),
        };
        assert!((s.frames_per_second() - 25.0).abs() < 1e-9);
    }
}
