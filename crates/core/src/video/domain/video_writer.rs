use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Encodes frames into an output container.
pub trait VideoWriter: Send {
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>>;

    /// Frames must arrive in increasing index order.
    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    /// Flushes the encoder and, when `metadata.has_audio`, carries the
    /// source's audio into the output. A failed remux fails the close.
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}
