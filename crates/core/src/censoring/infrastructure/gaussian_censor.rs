use std::cell::RefCell;

use crate::censoring::domain::frame_censor::FrameCensor;
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

use super::gaussian;

/// Smallest kernel applied, whatever the face size.
pub const MIN_KERNEL_SIZE: usize = 21;

/// Kernel size as a fraction of the larger box dimension.
const KERNEL_FRACTION: f64 = 0.5;

/// Gaussian blur over each face box, with a kernel that grows with the box
/// so near and far faces end up comparably unrecognisable.
pub struct GaussianCensor {
    roi_buf: RefCell<Vec<u8>>,
    blur_temp: RefCell<Vec<f32>>,
}

impl GaussianCensor {
    pub fn new() -> Self {
        Self {
            roi_buf: RefCell::new(Vec::new()),
            blur_temp: RefCell::new(Vec::new()),
        }
    }
}

impl Default for GaussianCensor {
    fn default() -> Self {
        Self::new()
    }
}

/// Odd kernel size for a `w` × `h` region.
pub fn kernel_size_for(w: usize, h: usize) -> usize {
    let proportional = (w.max(h) as f64 * KERNEL_FRACTION) as usize;
    proportional.max(MIN_KERNEL_SIZE) | 1
}

impl FrameCensor for GaussianCensor {
    fn censor(
        &self,
        frame: &mut Frame,
        boxes: &[FaceBox],
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (fw, fh) = (frame.width(), frame.height());
        let channels = frame.channels() as usize;
        let data = frame.data_mut();

        let mut roi = self.roi_buf.borrow_mut();
        let mut temp = self.blur_temp.borrow_mut();
        for face_box in boxes {
            let Some(rect) = face_box.clip(fw, fh) else {
                continue;
            };
            gaussian::extract_region(data, fw as usize, channels, rect, &mut roi);
            gaussian::blur_region(
                &mut roi,
                rect.w,
                rect.h,
                channels,
                kernel_size_for(rect.w, rect.h),
                &mut temp,
            );
            gaussian::write_region(data, &roi, fw as usize, channels, rect);
        }

        Ok(())
    }
}
