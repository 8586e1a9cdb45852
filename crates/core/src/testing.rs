//! Test doubles shared by unit tests across the crate.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::censoring::domain::frame_censor::FrameCensor;
use crate::detection::domain::detection_model::DetectionModel;
use crate::detection::domain::face_capability::FaceCapability;
use crate::detection::domain::face_encoding::FaceEncoding;
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

pub const BACKGROUND: [u8; 3] = [128, 128, 128];
pub const RED: [u8; 3] = [220, 30, 30];
pub const BLUE: [u8; 3] = [30, 30, 220];

/// Solid grey frame, optionally with one coloured face patch painted in.
pub fn patch_frame(
    index: usize,
    width: u32,
    height: u32,
    patch: Option<(FaceBox, [u8; 3])>,
) -> Frame {
    let data = BACKGROUND
        .iter()
        .copied()
        .cycle()
        .take((width * height * 3) as usize)
        .collect();
    let mut frame = Frame::new(data, width, height, 3, index);
    if let Some((face_box, color)) = patch {
        paint(&mut frame, face_box, color);
    }
    frame
}

pub fn paint(frame: &mut Frame, face_box: FaceBox, color: [u8; 3]) {
    let Some(rect) = face_box.clip(frame.width(), frame.height()) else {
        return;
    };
    let fw = frame.width() as usize;
    let data = frame.data_mut();
    for y in rect.y..rect.y + rect.h {
        for x in rect.x..rect.x + rect.w {
            let idx = (y * fw + x) * 3;
            data[idx..idx + 3].copy_from_slice(&color);
        }
    }
}

pub fn pixel(frame: &Frame, x: usize, y: usize) -> [u8; 3] {
    let idx = (y * frame.width() as usize + x) * 3;
    let d = frame.data();
    [d[idx], d[idx + 1], d[idx + 2]]
}

/// Capability whose detections are scripted per frame index and whose
/// encoding is the mean colour of the face patch, so identically coloured
/// patches are "the same person".
#[derive(Default)]
pub struct PatchCapability {
    faces: HashMap<usize, Vec<FaceBox>>,
    fail_detection: bool,
    fail_on_frame: Option<usize>,
    detect_calls: AtomicUsize,
    encode_calls: AtomicUsize,
}

impl PatchCapability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faces(mut self, frame_index: usize, boxes: Vec<FaceBox>) -> Self {
        self.faces.insert(frame_index, boxes);
        self
    }

    pub fn failing_detection(mut self) -> Self {
        self.fail_detection = true;
        self
    }

    pub fn failing_on_frame(mut self, frame_index: usize) -> Self {
        self.fail_on_frame = Some(frame_index);
        self
    }

    pub fn detect_calls(&self) -> usize {
        self.detect_calls.load(Ordering::SeqCst)
    }

    pub fn encode_calls(&self) -> usize {
        self.encode_calls.load(Ordering::SeqCst)
    }
}

impl FaceCapability for PatchCapability {
    fn detect(
        &self,
        frame: &Frame,
        _model: DetectionModel,
        _upsample: u32,
    ) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_detection || self.fail_on_frame == Some(frame.index()) {
            return Err("scripted detection failure".into());
        }
        Ok(self.faces.get(&frame.index()).cloned().unwrap_or_default())
    }

    fn encode(
        &self,
        frame: &Frame,
        face_box: &FaceBox,
    ) -> Result<FaceEncoding, Box<dyn std::error::Error>> {
        self.encode_calls.fetch_add(1, Ordering::SeqCst);
        let rect = face_box
            .clip(frame.width(), frame.height())
            .ok_or("face box outside frame")?;
        let crop = frame.crop(rect);
        let pixels = (rect.w * rect.h) as f32;
        let mut sums = [0f32; 3];
        for px in crop.data().chunks_exact(3) {
            for c in 0..3 {
                sums[c] += px[c] as f32;
            }
        }
        Ok(FaceEncoding::new(
            sums.iter().map(|s| s / pixels / 255.0).collect(),
        ))
    }
}

/// Encodes `frames` into a silent MPEG-4 clip at `path`.
pub fn write_test_clip(path: &Path, frames: &[Frame], fps: u32) {
    use crate::video::infrastructure::ffmpeg_writer::FfmpegWriter;

    let first = &frames[0];
    let metadata = VideoMetadata {
        width: first.width(),
        height: first.height(),
        fps: fps as f64,
        total_frames: frames.len(),
        codec: String::new(),
        has_audio: false,
        source_path: None,
    };
    let mut writer = FfmpegWriter::new();
    writer.open(path, &metadata).unwrap();
    for frame in frames {
        writer.write(frame).unwrap();
    }
    writer.close().unwrap();
}

const TONE_SAMPLE_RATE: u32 = 16_000;

/// Encodes `frames` at `path` together with a mono AAC sine tone covering
/// the clip's duration.
pub fn write_test_clip_with_audio(path: &Path, frames: &[Frame], fps: u32) {
    use ffmpeg_next::{codec, encoder, format, media, ChannelLayout, Packet};

    let video_only = path.with_extension("video.mp4");
    write_test_clip(&video_only, frames, fps);

    let mut ictx = format::input(&video_only).unwrap();
    let mut octx = format::output(path).unwrap();
    let global_header = octx.format().flags().contains(format::Flags::GLOBAL_HEADER);

    let video_in = ictx.streams().best(media::Type::Video).unwrap();
    let video_src_idx = video_in.index();
    let video_in_tb = video_in.time_base();
    let mut ost_video = octx.add_stream(encoder::find(codec::Id::None)).unwrap();
    ost_video.set_parameters(video_in.parameters());
    unsafe {
        (*ost_video.parameters().as_mut_ptr()).codec_tag = 0;
    }
    let video_ost_idx = ost_video.index();

    let aac = encoder::find(codec::Id::AAC).unwrap();
    let mut ost_audio = octx.add_stream(Some(aac)).unwrap();
    let audio_ost_idx = ost_audio.index();
    let mut audio_ctx = codec::context::Context::new_with_codec(aac)
        .encoder()
        .audio()
        .unwrap();
    audio_ctx.set_rate(TONE_SAMPLE_RATE as i32);
    audio_ctx.set_channel_layout(ChannelLayout::MONO);
    audio_ctx.set_format(format::Sample::F32(format::sample::Type::Planar));
    audio_ctx.set_time_base(ffmpeg_next::Rational(1, TONE_SAMPLE_RATE as i32));
    if global_header {
        audio_ctx.set_flags(codec::Flags::GLOBAL_HEADER);
    }
    let mut audio_encoder = audio_ctx.open_as(aac).unwrap();
    ost_audio.set_parameters(&audio_encoder);

    octx.write_header().unwrap();
    let video_out_tb = octx.stream(video_ost_idx).unwrap().time_base();
    let audio_out_tb = octx.stream(audio_ost_idx).unwrap().time_base();

    for (stream, mut packet) in ictx.packets() {
        if stream.index() != video_src_idx {
            continue;
        }
        packet.rescale_ts(video_in_tb, video_out_tb);
        packet.set_position(-1);
        packet.set_stream(video_ost_idx);
        packet.write_interleaved(&mut octx).unwrap();
    }

    let total = TONE_SAMPLE_RATE as usize * frames.len() / fps as usize;
    let samples: Vec<f32> = (0..total)
        .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / TONE_SAMPLE_RATE as f32).sin() * 0.2)
        .collect();
    let chunk_size = match audio_encoder.frame_size() as usize {
        0 => 1024,
        n => n,
    };
    let enc_tb = audio_encoder.time_base();
    let drain = |enc: &mut encoder::audio::Encoder, octx: &mut format::context::Output| {
        let mut packet = Packet::empty();
        while enc.receive_packet(&mut packet).is_ok() {
            packet.set_stream(audio_ost_idx);
            packet.rescale_ts(enc_tb, audio_out_tb);
            packet.write_interleaved(octx).unwrap();
        }
    };
    let mut pts = 0i64;
    for chunk in samples.chunks(chunk_size) {
        let mut frame = ffmpeg_next::util::frame::audio::Audio::new(
            format::Sample::F32(format::sample::Type::Planar),
            chunk.len(),
            ChannelLayout::MONO,
        );
        frame.set_rate(TONE_SAMPLE_RATE);
        frame.set_pts(Some(pts));
        for (dst, src) in frame.plane_mut::<f32>(0).iter_mut().zip(chunk) {
            *dst = *src;
        }
        audio_encoder.send_frame(&frame).unwrap();
        drain(&mut audio_encoder, &mut octx);
        pts += chunk.len() as i64;
    }
    audio_encoder.send_eof().unwrap();
    drain(&mut audio_encoder, &mut octx);

    octx.write_trailer().unwrap();
    drop(octx);
    drop(ictx);
    std::fs::remove_file(&video_only).unwrap();
}

pub fn stub_metadata(width: u32, height: u32, total_frames: usize) -> VideoMetadata {
    VideoMetadata {
        width,
        height,
        fps: 30.0,
        total_frames,
        codec: String::new(),
        has_audio: false,
        source_path: None,
    }
}

/// Reader that replays in-memory frames, optionally failing at one index.
pub struct StubReader {
    frames: Vec<Frame>,
    fail_at: Option<usize>,
    fail_open: bool,
    pub closed: Arc<Mutex<bool>>,
}

impl StubReader {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            fail_at: None,
            fail_open: false,
            closed: Arc::new(Mutex::new(false)),
        }
    }

    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }
}

impl VideoReader for StubReader {
    fn open(&mut self, _path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        if self.fail_open {
            return Err("scripted open failure".into());
        }
        let (w, h) = self
            .frames
            .first()
            .map(|f| (f.width(), f.height()))
            .unwrap_or((40, 30));
        Ok(stub_metadata(w, h, self.frames.len()))
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let fail_at = self.fail_at;
        Box::new(self.frames.drain(..).map(
            move |f| -> Result<Frame, Box<dyn std::error::Error>> {
                match fail_at {
                    Some(i) if f.index() == i => Err("scripted decode failure".into()),
                    _ => Ok(f),
                }
            },
        ))
    }

    fn close(&mut self) {
        *self.closed.lock().unwrap() = true;
    }
}

/// Writer that keeps frames in memory and touches the output path on open.
pub struct StubWriter {
    pub written: Arc<Mutex<Vec<Frame>>>,
    pub closed: Arc<Mutex<bool>>,
    fail_write_at: Option<usize>,
    fail_close: bool,
}

impl StubWriter {
    pub fn new() -> Self {
        Self {
            written: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(Mutex::new(false)),
            fail_write_at: None,
            fail_close: false,
        }
    }

    pub fn failing_write_at(mut self, index: usize) -> Self {
        self.fail_write_at = Some(index);
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }
}

impl VideoWriter for StubWriter {
    fn open(
        &mut self,
        path: &Path,
        _metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if path.parent().is_some_and(|p| p.exists()) {
            std::fs::write(path, b"stub")?;
        }
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        if self.fail_write_at == Some(frame.index()) {
            return Err("scripted write failure".into());
        }
        self.written.lock().unwrap().push(frame.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        *self.closed.lock().unwrap() = true;
        if self.fail_close {
            return Err("scripted mux failure".into());
        }
        Ok(())
    }
}

/// Censor that records which boxes it was asked to censor per frame and
/// masks them so tests can see the effect in pixels.
#[allow(clippy::type_complexity)]
pub struct RecordingCensor {
    pub calls: Arc<Mutex<Vec<(usize, Vec<FaceBox>)>>>,
}

impl RecordingCensor {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl FrameCensor for RecordingCensor {
    fn censor(
        &self,
        frame: &mut Frame,
        boxes: &[FaceBox],
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.calls
            .lock()
            .unwrap()
            .push((frame.index(), boxes.to_vec()));
        for face_box in boxes {
            paint(frame, *face_box, [0, 0, 0]);
        }
        Ok(())
    }
}
