use ndarray::{ArrayView3, ArrayViewMut3};

use super::face_box::PixelRect;

/// A single decoded video frame or still image: contiguous RGB bytes in
/// row-major order, tagged with its position in the source sequence.
///
/// Format conversion happens at I/O boundaries only; the domain layer
/// treats pixel data as opaque.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Copies the pixels under `rect` into a new frame with the same index.
    ///
    /// `rect` must already be clipped to the frame bounds.
    pub fn crop(&self, rect: PixelRect) -> Frame {
        let channels = self.channels as usize;
        let fw = self.width as usize;
        let mut out = Vec::with_capacity(rect.w * rect.h * channels);
        for row in rect.y..rect.y + rect.h {
            let start = (row * fw + rect.x) * channels;
            out.extend_from_slice(&self.data[start..start + rect.w * channels]);
        }
        Frame::new(out, rect.w as u32, rect.h as u32, self.channels, self.index)
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
