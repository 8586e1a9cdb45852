//! Separable Gaussian blur over interleaved 8-bit pixel buffers, plus the
//! region copy helpers the censors share.

use crate::shared::face_box::PixelRect;

/// Kernel sizes above this are applied on a downscaled copy of the region.
const MAX_DIRECT_KERNEL: usize = 51;

/// Precompute a normalised 1D Gaussian kernel.
///
/// `kernel_size` must be odd and >= 1. Sigma follows OpenCV's sigma=0
/// convention: `0.3 * ((k - 1) * 0.5 - 1) + 0.8`.
pub fn gaussian_kernel_1d(kernel_size: usize) -> Vec<f32> {
    debug_assert!(kernel_size >= 1 && kernel_size % 2 == 1);
    let sigma = 0.3 * ((kernel_size as f64 - 1.0) * 0.5 - 1.0) + 0.8;
    let half = (kernel_size / 2) as f64;
    let weights: Vec<f64> = (0..kernel_size)
        .map(|i| {
            let x = i as f64 - half;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.iter().map(|&w| (w / sum) as f32).collect()
}

/// Blur `data` in place with a pre-computed kernel, reusing `temp` as the
/// intermediate buffer. Edges replicate the border pixel.
pub fn separable_blur(
    data: &mut [u8],
    width: usize,
    height: usize,
    channels: usize,
    kernel: &[f32],
    temp: &mut Vec<f32>,
) {
    let half = kernel.len() / 2;
    if kernel.len() <= 1 || width == 0 || height == 0 {
        return;
    }
    temp.resize(width * height * channels, 0.0);

    // Horizontal: data → temp
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let mut acc = 0.0f32;
                for (k, &w) in kernel.iter().enumerate() {
                    let sx = (x + k).saturating_sub(half).min(width - 1);
                    acc += data[(y * width + sx) * channels + c] as f32 * w;
                }
                temp[(y * width + x) * channels + c] = acc;
            }
        }
    }

    // Vertical: temp → data
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let mut acc = 0.0f32;
                for (k, &w) in kernel.iter().enumerate() {
                    let sy = (y + k).saturating_sub(half).min(height - 1);
                    acc += temp[(sy * width + x) * channels + c] * w;
                }
                data[(y * width + x) * channels + c] = acc.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

/// Blur a region buffer with a kernel of `kernel_size`, switching to a
/// downscale-blur-upscale pass when the kernel is large.
pub fn blur_region(
    roi: &mut [u8],
    width: usize,
    height: usize,
    channels: usize,
    kernel_size: usize,
    temp: &mut Vec<f32>,
) {
    let scale = (kernel_size / MAX_DIRECT_KERNEL).max(1);
    if scale <= 1 || width < scale * 2 || height < scale * 2 {
        let kernel = gaussian_kernel_1d(kernel_size);
        separable_blur(roi, width, height, channels, &kernel, temp);
        return;
    }
    let small_kernel = gaussian_kernel_1d((kernel_size / scale) | 1);
    let (mut small, sw, sh) = downscale(roi, width, height, channels, scale);
    separable_blur(&mut small, sw, sh, channels, &small_kernel, temp);
    let restored = upscale_bilinear(&small, sw, sh, channels, width, height);
    roi.copy_from_slice(&restored);
}

/// Copy the pixels under `rect` out of the frame buffer into `roi`.
pub fn extract_region(
    data: &[u8],
    frame_width: usize,
    channels: usize,
    rect: PixelRect,
    roi: &mut Vec<u8>,
) {
    let row_len = rect.w * channels;
    roi.resize(row_len * rect.h, 0);
    for row in 0..rect.h {
        let src = ((rect.y + row) * frame_width + rect.x) * channels;
        roi[row * row_len..(row + 1) * row_len].copy_from_slice(&data[src..src + row_len]);
    }
}

/// Write a region buffer back under `rect`.
pub fn write_region(data: &mut [u8], roi: &[u8], frame_width: usize, channels: usize, rect: PixelRect) {
    let row_len = rect.w * channels;
    for row in 0..rect.h {
        let dst = ((rect.y + row) * frame_width + rect.x) * channels;
        data[dst..dst + row_len].copy_from_slice(&roi[row * row_len..(row + 1) * row_len]);
    }
}

/// Downscale by an integer factor using area averaging.
pub fn downscale(
    data: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    scale: usize,
) -> (Vec<u8>, usize, usize) {
    let new_w = (width / scale).max(1);
    let new_h = (height / scale).max(1);
    let mut out = vec![0u8; new_w * new_h * channels];

    for y in 0..new_h {
        for x in 0..new_w {
            for c in 0..channels {
                let mut sum = 0u32;
                let mut count = 0u32;
                for sy in (y * scale)..((y + 1) * scale).min(height) {
                    for sx in (x * scale)..((x + 1) * scale).min(width) {
                        sum += data[(sy * width + sx) * channels + c] as u32;
                        count += 1;
                    }
                }
                out[(y * new_w + x) * channels + c] = (sum / count.max(1)) as u8;
            }
        }
    }

    (out, new_w, new_h)
}

/// Resize to `target_w` × `target_h` using bilinear interpolation.
pub fn upscale_bilinear(
    data: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    target_w: usize,
    target_h: usize,
) -> Vec<u8> {
    let mut out = vec![0u8; target_w * target_h * channels];

    for y in 0..target_h {
        let src_y = y as f32 * (height as f32 - 1.0) / (target_h as f32 - 1.0).max(1.0);
        let y0 = (src_y.floor() as usize).min(height - 1);
        let y1 = (y0 + 1).min(height - 1);
        let fy = src_y - y0 as f32;
        for x in 0..target_w {
            let src_x = x as f32 * (width as f32 - 1.0) / (target_w as f32 - 1.0).max(1.0);
            let x0 = (src_x.floor() as usize).min(width - 1);
            let x1 = (x0 + 1).min(width - 1);
            let fx = src_x - x0 as f32;

            for c in 0..channels {
                let at = |yy: usize, xx: usize| data[(yy * width + xx) * channels + c] as f32;
                let val = at(y0, x0) * (1.0 - fx) * (1.0 - fy)
                    + at(y0, x1) * fx * (1.0 - fy)
                    + at(y1, x0) * (1.0 - fx) * fy
                    + at(y1, x1) * fx * fy;
                out[(y * target_w + x) * channels + c] = val.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    out
}
