use std::path::Path;

use crate::censoring::domain::frame_censor::FrameCensor;
use crate::pipeline::domain::frame_analyzer::FrameAnalyzer;
use crate::pipeline::pipeline_executor::{PipelineConfig, PipelineExecutor, PipelineFailure};
use crate::shared::face_box::Detection;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

const DEFAULT_CHANNEL_CAPACITY: usize = 8;

type Analyzed = (Frame, Vec<Detection>);

/// Executes the pipeline with dedicated threads for decoding, analysis and
/// encoding.
///
/// Layout: `reader → analyze → main [censor + progress] → writer`
///
/// Every stage is a single thread joined by bounded FIFO channels, so frames
/// reach the writer in decode order while I/O overlaps with detection.
pub struct ThreadedPipelineExecutor {
    channel_capacity: usize,
}

impl ThreadedPipelineExecutor {
    pub fn new() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_channel_capacity(channel_capacity: usize) -> Self {
        Self {
            channel_capacity: channel_capacity.max(1),
        }
    }
}

impl Default for ThreadedPipelineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineExecutor for ThreadedPipelineExecutor {
    fn execute(
        &self,
        reader: Box<dyn VideoReader>,
        mut writer: Box<dyn VideoWriter>,
        analyzer: FrameAnalyzer,
        censor: Box<dyn FrameCensor>,
        metadata: &VideoMetadata,
        output_path: &Path,
        config: PipelineConfig,
    ) -> Result<usize, Box<dyn std::error::Error>> {
        let cap = self.channel_capacity;

        writer
            .open(output_path, metadata)
            .map_err(|e| PipelineFailure::Encode(e.to_string()))?;

        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Result<Frame, PipelineFailure>>(cap);
        let (analyzed_tx, analyzed_rx) =
            crossbeam_channel::bounded::<Result<Analyzed, PipelineFailure>>(cap);
        let (write_tx, write_rx) = crossbeam_channel::bounded::<Frame>(cap);

        let reader_handle = spawn_reader(reader, frame_tx);
        let analyze_handle = spawn_analyzer(analyzer, frame_rx, analyzed_tx);
        let writer_handle = spawn_writer(writer, write_rx);

        let main_result = run_main_loop(
            analyzed_rx,
            &write_tx,
            &*censor,
            metadata.total_frames,
            &config,
        );

        drop(write_tx);

        join_threads(reader_handle, analyze_handle, writer_handle, main_result)
    }
}

fn spawn_reader(
    mut reader: Box<dyn VideoReader>,
    frame_tx: crossbeam_channel::Sender<Result<Frame, PipelineFailure>>,
) -> std::thread::JoinHandle<Box<dyn VideoReader>> {
    std::thread::spawn(move || {
        for frame_result in reader.frames() {
            let failed = frame_result.is_err();
            let mapped = frame_result.map_err(|e| PipelineFailure::Decode(e.to_string()));
            if frame_tx.send(mapped).is_err() || failed {
                break;
            }
        }
        reader
    })
}

fn spawn_analyzer(
    analyzer: FrameAnalyzer,
    frame_rx: crossbeam_channel::Receiver<Result<Frame, PipelineFailure>>,
    analyzed_tx: crossbeam_channel::Sender<Result<Analyzed, PipelineFailure>>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        for frame_result in frame_rx {
            let result = frame_result.and_then(|frame| match analyzer.analyze(&frame) {
                Ok(targets) => Ok((frame, targets)),
                Err(e) => Err(PipelineFailure::Analyze {
                    frame_index: frame.index(),
                    reason: e.to_string(),
                }),
            });
            let failed = result.is_err();
            if analyzed_tx.send(result).is_err() || failed {
                break;
            }
        }
    })
}

fn spawn_writer(
    mut writer: Box<dyn VideoWriter>,
    write_rx: crossbeam_channel::Receiver<Frame>,
) -> std::thread::JoinHandle<Result<Box<dyn VideoWriter>, PipelineFailure>> {
    std::thread::spawn(move || {
        for frame in write_rx {
            writer
                .write(&frame)
                .map_err(|e| PipelineFailure::Encode(format!("frame {}: {e}", frame.index())))?;
        }
        Ok(writer)
    })
}

/// Receives analysed frames, censors the selected faces and forwards each
/// frame to the writer. Returns the number of frames forwarded.
///
/// A closed writer channel ends the loop quietly; the writer thread carries
/// the reason.
fn run_main_loop(
    analyzed_rx: crossbeam_channel::Receiver<Result<Analyzed, PipelineFailure>>,
    write_tx: &crossbeam_channel::Sender<Frame>,
    censor: &dyn FrameCensor,
    total_frames: usize,
    config: &PipelineConfig,
) -> Result<usize, PipelineFailure> {
    let mut frames_done: usize = 0;

    for analyzed in analyzed_rx {
        let (mut frame, targets) = analyzed?;

        let boxes: Vec<_> = targets.iter().map(|d| d.face_box).collect();
        censor
            .censor(&mut frame, &boxes)
            .map_err(|e| PipelineFailure::Censor {
                frame_index: frame.index(),
                reason: e.to_string(),
            })?;

        if write_tx.send(frame).is_err() {
            break;
        }
        frames_done += 1;

        if let Some(ref callback) = config.on_progress {
            callback(frames_done, total_frames);
        }
    }

    Ok(frames_done)
}

/// Joins all pipeline threads and returns the first failure encountered.
fn join_threads(
    reader_handle: std::thread::JoinHandle<Box<dyn VideoReader>>,
    analyze_handle: std::thread::JoinHandle<()>,
    writer_handle: std::thread::JoinHandle<Result<Box<dyn VideoWriter>, PipelineFailure>>,
    main_result: Result<usize, PipelineFailure>,
) -> Result<usize, Box<dyn std::error::Error>> {
    let mut first_error = main_result.as_ref().err().cloned();
    let mut set_if_none = |err: PipelineFailure| {
        if first_error.is_none() {
            first_error = Some(err);
        }
    };

    match reader_handle.join() {
        Ok(mut r) => r.close(),
        Err(_) => set_if_none(PipelineFailure::Decode("reader thread panicked".into())),
    }

    if analyze_handle.join().is_err() {
        set_if_none(PipelineFailure::Analyze {
            frame_index: 0,
            reason: "analysis thread panicked".into(),
        });
    }

    match writer_handle.join() {
        Ok(Ok(mut w)) => {
            if let Err(e) = w.close() {
                set_if_none(PipelineFailure::Encode(e.to_string()));
            }
        }
        Ok(Err(e)) => set_if_none(e),
        Err(_) => set_if_none(PipelineFailure::Encode("writer thread panicked".into())),
    }

    match (first_error, main_result) {
        (Some(e), _) => Err(Box::new(e)),
        (None, Ok(frames)) => Ok(frames),
        (None, Err(e)) => Err(Box::new(e)),
    }
}
