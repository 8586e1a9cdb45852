use std::path::{Path, PathBuf};

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_writer::VideoWriter;

const FALLBACK_FPS: i32 = 30;

/// Encodes frames to MPEG-4 via ffmpeg-next and remuxes the source's audio
/// stream into the result without re-encoding it.
pub struct FfmpegWriter {
    output_path: Option<PathBuf>,
    audio_source: Option<PathBuf>,
    octx: Option<ffmpeg_next::format::context::Output>,
    encoder: Option<ffmpeg_next::codec::encoder::video::Encoder>,
    scaler: Option<ffmpeg_next::software::scaling::Context>,
    width: u32,
    height: u32,
    fps: i32,
    frame_count: usize,
}

// Safety: FfmpegWriter is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegWriter {}

impl FfmpegWriter {
    pub fn new() -> Self {
        Self {
            output_path: None,
            audio_source: None,
            octx: None,
            encoder: None,
            scaler: None,
            width: 0,
            height: 0,
            fps: FALLBACK_FPS,
            frame_count: 0,
        }
    }
}

impl Default for FfmpegWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoWriter for FfmpegWriter {
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let fps = match metadata.fps.round() as i32 {
            n if n > 0 => n,
            _ => FALLBACK_FPS,
        };

        let mut octx = ffmpeg_next::format::output(path)?;

        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4)
            .ok_or("MPEG4 encoder not found")?;

        let mut ost = octx.add_stream(Some(codec))?;

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;

        encoder_ctx.set_width(metadata.width);
        encoder_ctx.set_height(metadata.height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));

        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder_ctx.open_with(ffmpeg_next::Dictionary::new())?;
        ost.set_parameters(&encoder);

        octx.write_header()?;

        let scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            metadata.width,
            metadata.height,
            ffmpeg_next::format::Pixel::YUV420P,
            metadata.width,
            metadata.height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        self.width = metadata.width;
        self.height = metadata.height;
        self.fps = fps;
        self.output_path = Some(path.to_path_buf());
        self.audio_source = if metadata.has_audio {
            metadata.source_path.clone()
        } else {
            None
        };
        self.octx = Some(octx);
        self.encoder = Some(encoder);
        self.scaler = Some(scaler);
        self.frame_count = 0;

        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let (Some(encoder), Some(scaler), Some(octx)) = (
            self.encoder.as_mut(),
            self.scaler.as_mut(),
            self.octx.as_mut(),
        ) else {
            return Err("FfmpegWriter: not opened".into());
        };
        if frame.width() != self.width || frame.height() != self.height {
            return Err(format!(
                "frame {} is {}x{}, expected {}x{}",
                frame.index(),
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )
            .into());
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::new(
            ffmpeg_next::format::Pixel::RGB24,
            self.width,
            self.height,
        );

        let stride = rgb_frame.stride(0);
        let dst = rgb_frame.data_mut(0);
        let src = frame.data();
        let row_len = self.width as usize * 3;
        for row in 0..self.height as usize {
            dst[row * stride..row * stride + row_len]
                .copy_from_slice(&src[row * row_len..(row + 1) * row_len]);
        }

        let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
        scaler.run(&rgb_frame, &mut yuv_frame)?;
        yuv_frame.set_pts(Some(self.frame_count as i64));

        encoder.send_frame(&yuv_frame)?;
        drain_packets(encoder, octx, self.fps)?;

        self.frame_count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let (Some(encoder), Some(octx)) = (self.encoder.as_mut(), self.octx.as_mut()) {
            encoder.send_eof()?;
            drain_packets(encoder, octx, self.fps)?;
            octx.write_trailer()?;
        }

        self.octx = None;
        self.encoder = None;
        self.scaler = None;

        if let (Some(source), Some(output)) = (self.audio_source.take(), self.output_path.take()) {
            mux_audio(&source, &output)
                .map_err(|e| format!("audio remux from {} failed: {e}", source.display()))?;
        }

        Ok(())
    }
}

fn drain_packets(
    encoder: &mut ffmpeg_next::codec::encoder::video::Encoder,
    octx: &mut ffmpeg_next::format::context::Output,
    fps: i32,
) -> Result<(), Box<dyn std::error::Error>> {
    let ost_time_base = octx.stream(0).ok_or("output has no video stream")?.time_base();
    let mut encoded = ffmpeg_next::Packet::empty();
    while encoder.receive_packet(&mut encoded).is_ok() {
        encoded.set_stream(0);
        encoded.rescale_ts(ffmpeg_next::Rational(1, fps), ost_time_base);
        encoded.write_interleaved(octx)?;
    }
    Ok(())
}

/// Copies the audio streams of `source` into `video_output` by packet
/// remux, replacing `video_output` in place.
///
/// A source without an audio stream leaves the output untouched.
fn mux_audio(source: &Path, video_output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut ictx_source = ffmpeg_next::format::input(source)?;
    if ictx_source
        .streams()
        .best(ffmpeg_next::media::Type::Audio)
        .is_none()
    {
        log::warn!("{} has no audio stream to carry over", source.display());
        return Ok(());
    }

    let mut ictx_video = ffmpeg_next::format::input(video_output)?;

    let ext = video_output
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp4");
    let temp_path = video_output.with_extension(format!("mux.{ext}"));

    let result = remux_into(&mut ictx_video, &mut ictx_source, &temp_path)
        .and_then(|()| std::fs::rename(&temp_path, video_output).map_err(Into::into));
    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    result
}

fn remux_into(
    ictx_video: &mut ffmpeg_next::format::context::Input,
    ictx_source: &mut ffmpeg_next::format::context::Input,
    temp_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut octx = ffmpeg_next::format::output(temp_path)?;

    let video_map = map_streams(ictx_video, &mut octx, ffmpeg_next::media::Type::Video, 0)?;
    let next_index = video_map.iter().filter(|m| m.is_some()).count();
    let audio_map = map_streams(ictx_source, &mut octx, ffmpeg_next::media::Type::Audio, next_index)?;

    octx.write_header()?;

    copy_packets(ictx_video, &mut octx, &video_map)?;
    copy_packets(ictx_source, &mut octx, &audio_map)?;

    octx.write_trailer()?;
    log::info!("Carried audio over into {}", temp_path.display());
    Ok(())
}

/// Adds an output stream for every input stream of `medium`, returning the
/// input → output index map.
fn map_streams(
    ictx: &ffmpeg_next::format::context::Input,
    octx: &mut ffmpeg_next::format::context::Output,
    medium: ffmpeg_next::media::Type,
    first_index: usize,
) -> Result<Vec<Option<usize>>, Box<dyn std::error::Error>> {
    let mut map = vec![None; ictx.nb_streams() as usize];
    let mut next = first_index;
    for (idx, stream) in ictx.streams().enumerate() {
        if stream.parameters().medium() != medium {
            continue;
        }
        let mut ost = octx.add_stream(ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::None))?;
        ost.set_parameters(stream.parameters());
        // Let the muxer pick a tag valid for the output container.
        unsafe {
            (*ost.parameters().as_mut_ptr()).codec_tag = 0;
        }
        map[idx] = Some(next);
        next += 1;
    }
    Ok(map)
}

fn copy_packets(
    ictx: &mut ffmpeg_next::format::context::Input,
    octx: &mut ffmpeg_next::format::context::Output,
    map: &[Option<usize>],
) -> Result<(), Box<dyn std::error::Error>> {
    let time_bases: Vec<_> = ictx.streams().map(|s| s.time_base()).collect();
    for (stream, mut packet) in ictx.packets() {
        let ist = stream.index();
        let Some(ost) = map.get(ist).copied().flatten() else {
            continue;
        };
        let ost_time_base = octx
            .stream(ost)
            .ok_or("mapped output stream missing")?
            .time_base();
        packet.rescale_ts(time_bases[ist], ost_time_base);
        packet.set_position(-1);
        packet.set_stream(ost);
        packet.write_interleaved(octx)?;
    }
    Ok(())
}
