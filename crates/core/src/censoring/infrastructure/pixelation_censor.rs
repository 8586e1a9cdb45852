use std::cell::RefCell;

use crate::censoring::domain::frame_censor::FrameCensor;
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

use super::gaussian;

/// Blocks per side of the coarse grid a face is reduced to.
pub const DEFAULT_GRID_SIZE: usize = 8;

/// Reduces each face box to a coarse grid of averaged cells, then scales it
/// back with nearest-neighbour sampling so the blocks stay visible.
pub struct PixelationCensor {
    grid: usize,
    roi_buf: RefCell<Vec<u8>>,
}

impl PixelationCensor {
    pub fn new(grid: usize) -> Self {
        Self {
            grid: grid.max(1),
            roi_buf: RefCell::new(Vec::new()),
        }
    }
}

impl Default for PixelationCensor {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_SIZE)
    }
}

impl FrameCensor for PixelationCensor {
    fn censor(
        &self,
        frame: &mut Frame,
        boxes: &[FaceBox],
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (fw, fh) = (frame.width(), frame.height());
        let channels = frame.channels() as usize;
        let data = frame.data_mut();
        let mut roi = self.roi_buf.borrow_mut();

        for face_box in boxes {
            let Some(rect) = face_box.clip(fw, fh) else {
                continue;
            };
            gaussian::extract_region(data, fw as usize, channels, rect, &mut roi);
            let (cells, gw, gh) = average_cells(&roi, rect.w, rect.h, channels, self.grid);
            for y in 0..rect.h {
                let gy = y * gh / rect.h;
                for x in 0..rect.w {
                    let gx = x * gw / rect.w;
                    let src = (gy * gw + gx) * channels;
                    let dst = (y * rect.w + x) * channels;
                    roi[dst..dst + channels].copy_from_slice(&cells[src..src + channels]);
                }
            }
            gaussian::write_region(data, &roi, fw as usize, channels, rect);
        }

        Ok(())
    }
}

/// Area-average a `w` × `h` buffer down to at most `grid` × `grid` cells.
fn average_cells(
    data: &[u8],
    w: usize,
    h: usize,
    channels: usize,
    grid: usize,
) -> (Vec<u8>, usize, usize) {
    let gw = grid.min(w);
    let gh = grid.min(h);
    let mut out = vec![0u8; gw * gh * channels];
    for gy in 0..gh {
        let (y0, y1) = (gy * h / gh, (gy + 1) * h / gh);
        for gx in 0..gw {
            let (x0, x1) = (gx * w / gw, (gx + 1) * w / gw);
            let count = ((y1 - y0) * (x1 - x0)).max(1) as u32;
            for c in 0..channels {
                let mut sum = 0u32;
                for y in y0..y1 {
                    for x in x0..x1 {
                        sum += data[(y * w + x) * channels + c] as u32;
                    }
                }
                out[(gy * gw + gx) * channels + c] = (sum / count) as u8;
            }
        }
    }
    (out, gw, gh)
}
