/// A face bounding box in pixel coordinates, stored as
/// (top, right, bottom, left) edges. `right` and `bottom` are exclusive.
///
/// Boxes may extend past the frame edges (detectors report unclamped
/// geometry); use [`FaceBox::clip`] before touching pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FaceBox {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

/// A box clipped to frame bounds, ready for direct pixel indexing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: usize,
    pub y: usize,
    pub w: usize,
    pub h: usize,
}

/// A face box found in a specific frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Detection {
    pub face_box: FaceBox,
    pub frame_index: usize,
}

impl FaceBox {
    pub fn new(top: i32, right: i32, bottom: i32, left: i32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    /// Builds a box from floating-point corner coordinates `(x1, y1, x2, y2)`,
    /// rounding outward so the face is fully covered.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            top: y1.floor() as i32,
            right: x2.ceil() as i32,
            bottom: y2.ceil() as i32,
            left: x1.floor() as i32,
        }
    }

    pub fn width(&self) -> i32 {
        (self.right - self.left).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.bottom - self.top).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Intersects the box with a `frame_width` × `frame_height` frame.
    ///
    /// Returns `None` when nothing of the box is visible.
    pub fn clip(&self, frame_width: u32, frame_height: u32) -> Option<PixelRect> {
        let left = self.left.clamp(0, frame_width as i32);
        let right = self.right.clamp(0, frame_width as i32);
        let top = self.top.clamp(0, frame_height as i32);
        let bottom = self.bottom.clamp(0, frame_height as i32);

        if right <= left || bottom <= top {
            return None;
        }
        Some(PixelRect {
            x: left as usize,
            y: top as usize,
            w: (right - left) as usize,
            h: (bottom - top) as usize,
        })
    }

    pub fn iou(&self, other: &FaceBox) -> f64 {
        let ix1 = self.left.max(other.left);
        let iy1 = self.top.max(other.top);
        let ix2 = self.right.min(other.right);
        let iy2 = self.bottom.min(other.bottom);

        let inter = (ix2 - ix1).max(0) as f64 * (iy2 - iy1).max(0) as f64;
        if inter == 0.0 {
            return 0.0;
        }

        let area_a = self.width() as f64 * self.height() as f64;
        let area_b = other.width() as f64 * other.height() as f64;
        inter / (area_a + area_b - inter)
    }
}

impl Detection {
    pub fn new(face_box: FaceBox, frame_index: usize) -> Self {
        Self {
            face_box,
            frame_index,
        }
    }
}
