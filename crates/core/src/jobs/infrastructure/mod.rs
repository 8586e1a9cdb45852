pub mod ffmpeg_video_processor;
