use std::path::Path;

use crate::shared::frame::Frame;

/// Loads a still image (a reference face photo) as a single RGB frame.
pub trait ImageReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<Frame, Box<dyn std::error::Error>>;
}
