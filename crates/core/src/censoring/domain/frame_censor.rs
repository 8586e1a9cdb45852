use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

/// Domain interface for censoring face regions within a frame.
///
/// Implementations modify the frame in-place and must leave every pixel
/// outside the (frame-clipped) boxes untouched. Boxes that fall entirely
/// outside the frame are skipped.
pub trait FrameCensor: Send {
    fn censor(&self, frame: &mut Frame, boxes: &[FaceBox])
        -> Result<(), Box<dyn std::error::Error>>;
}
