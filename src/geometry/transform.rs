//! Rotate-then-crop of decoded camera frames

use image::{imageops, RgbImage};
use tracing::debug;

use crate::capture::frame::Frame;
use crate::error::FrameError;
use crate::geometry::{Orientation, SensorCropRect};

/// Rotate an image clockwise by a quarter-turn multiple, growing the canvas as needed
pub fn rotate(image: &RgbImage, orientation: Orientation) -> RgbImage {
    match orientation {
        Orientation::Deg0 => image.clone(),
        Orientation::Deg90 => imageops::rotate90(image),
        Orientation::Deg180 => imageops::rotate180(image),
        Orientation::Deg270 => imageops::rotate270(image),
    }
}

/// Clamp `crop` to an image of `width`x`height`.
///
/// Returns `(x, y, width, height)` of the intersection, or `None` when the
/// two do not overlap.
pub fn clamp_crop(crop: SensorCropRect, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let max_x = width as i64;
    let max_y = height as i64;

    let left = (crop.x as i64).clamp(0, max_x);
    let top = (crop.y as i64).clamp(0, max_y);
    let right = (crop.right() as i64).clamp(0, max_x);
    let bottom = (crop.bottom() as i64).clamp(0, max_y);

    if right <= left || bottom <= top {
        return None;
    }

    Some((
        left as u32,
        top as u32,
        (right - left) as u32,
        (bottom - top) as u32,
    ))
}

/// Decode a frame, rotate it into display orientation and crop the selection.
///
/// Rotation happens first because `crop` is expressed in the orientation the
/// user sees. A crop reaching outside the rotated image is clamped to the
/// intersection; only a crop with no overlap at all is rejected.
pub fn crop_and_rotate(
    frame: &Frame,
    orientation: Orientation,
    crop: SensorCropRect,
) -> Result<RgbImage, FrameError> {
    let decoded = frame.to_rgb()?;
    let rotated = rotate(&decoded, orientation);

    let (x, y, width, height) =
        clamp_crop(crop, rotated.width(), rotated.height()).ok_or(FrameError::EmptyCrop)?;

    if width as i32 != crop.width || height as i32 != crop.height {
        debug!(
            "Crop {:?} clamped to ({}, {}, {}x{}) in {}x{} rotated frame",
            crop,
            x,
            y,
            width,
            height,
            rotated.width(),
            rotated.height()
        );
    }

    Ok(imageops::crop_imm(&rotated, x, y, width, height).to_image())
}
