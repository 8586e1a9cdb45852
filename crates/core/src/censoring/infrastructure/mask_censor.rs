use ndarray::s;

use crate::censoring::domain::frame_censor::FrameCensor;
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

/// Fills each face box with a solid colour.
pub struct MaskCensor {
    color: [u8; 3],
}

impl MaskCensor {
    pub fn new(color: [u8; 3]) -> Self {
        Self { color }
    }
}

impl Default for MaskCensor {
    fn default() -> Self {
        Self::new([0, 0, 0])
    }
}

impl FrameCensor for MaskCensor {
    fn censor(
        &self,
        frame: &mut Frame,
        boxes: &[FaceBox],
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (fw, fh) = (frame.width(), frame.height());
        let mut pixels = frame.as_ndarray_mut();
        for face_box in boxes {
            let Some(rect) = face_box.clip(fw, fh) else {
                continue;
            };
            let mut region = pixels.slice_mut(s![rect.y..rect.y + rect.h, rect.x..rect.x + rect.w, ..]);
            for (c, &value) in self.color.iter().enumerate().take(region.shape()[2]) {
                region.slice_mut(s![.., .., c]).fill(value);
            }
        }
        Ok(())
    }
}
