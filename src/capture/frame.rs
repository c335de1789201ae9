//! Frame data structures for camera preview content

use std::time::Instant;

use image::{Rgb, RgbImage};

use crate::error::FrameError;
use crate::geometry::Size;

/// A preview frame as delivered by the camera, NV21 encoded.
///
/// Layout: a full-resolution Y plane followed by interleaved V/U samples at
/// half resolution on both axes. The buffer is never modified after
/// construction.
#[derive(Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    timestamp: Instant,
}

impl Frame {
    /// Wrap a raw NV21 buffer
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    /// Encode an RGB image as NV21, averaging chroma over each 2x2 block
    pub fn from_rgb(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let mut data = vec![0u8; nv21_len(width, height)];
        let luma_len = (width * height) as usize;
        let chroma_width = width.div_ceil(2);

        for (x, y, pixel) in image.enumerate_pixels() {
            let (luma, _, _) = rgb_to_yuv(pixel);
            data[(y * width + x) as usize] = luma;
        }

        for cy in 0..height.div_ceil(2) {
            for cx in 0..chroma_width {
                let mut u_sum = 0.0f32;
                let mut v_sum = 0.0f32;
                let mut count = 0.0f32;
                for y in (cy * 2)..(cy * 2 + 2).min(height) {
                    for x in (cx * 2)..(cx * 2 + 2).min(width) {
                        let (_, u, v) = rgb_to_yuv(image.get_pixel(x, y));
                        u_sum += u;
                        v_sum += v;
                        count += 1.0;
                    }
                }
                let idx = luma_len + ((cy * chroma_width + cx) * 2) as usize;
                data[idx] = clamp_u8(v_sum / count);
                data[idx + 1] = clamp_u8(u_sum / count);
            }
        }

        Self::new(data, width, height)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Get frame dimensions as a `Size`
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// When the frame was handed to us
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Decode to full-resolution RGB (BT.601, full range)
    pub fn to_rgb(&self) -> Result<RgbImage, FrameError> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameError::EmptyFrame {
                width: self.width,
                height: self.height,
            });
        }

        let expected = nv21_len(self.width, self.height);
        if self.data.len() < expected {
            return Err(FrameError::Truncated {
                expected,
                actual: self.data.len(),
            });
        }

        let width = self.width;
        let luma_len = (width * self.height) as usize;
        let chroma_width = width.div_ceil(2);

        Ok(RgbImage::from_fn(width, self.height, |x, y| {
            let luma = self.data[(y * width + x) as usize] as f32;
            let idx = luma_len + (((y / 2) * chroma_width + x / 2) * 2) as usize;
            let v = self.data[idx] as f32 - 128.0;
            let u = self.data[idx + 1] as f32 - 128.0;

            Rgb([
                clamp_u8(luma + 1.402 * v),
                clamp_u8(luma - 0.344_136 * u - 0.714_136 * v),
                clamp_u8(luma + 1.772 * u),
            ])
        }))
    }
}

/// Byte length of an NV21 buffer for the given dimensions
pub fn nv21_len(width: u32, height: u32) -> usize {
    let luma = width as usize * height as usize;
    let chroma = width.div_ceil(2) as usize * height.div_ceil(2) as usize * 2;
    luma + chroma
}

fn rgb_to_yuv(pixel: &Rgb<u8>) -> (u8, f32, f32) {
    let [r, g, b] = pixel.0.map(f32::from);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let u = -0.168_736 * r - 0.331_264 * g + 0.5 * b + 128.0;
    let v = 0.5 * r - 0.418_688 * g - 0.081_312 * b + 128.0;
    (clamp_u8(y), u, v)
}

fn clamp_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
