//! Picker rendering as surface-independent draw primitives
//!
//! The handle squares returned by `handle_rects` are both what gets drawn
//! and what `RegionPicker::classify` hit-tests against.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::geometry::SelectionRect;

/// Outline color (#EB974E)
pub const PICKER_COLOR: [u8; 3] = [0xEB, 0x97, 0x4E];
/// Handle color (#1BA39C)
pub const ACTIVE_COLOR: [u8; 3] = [0x1B, 0xA3, 0x9C];
/// Outline thickness in pixels
pub const STROKE_WIDTH: u32 = 3;

/// Axis-aligned rectangle by edges, inclusive of its border
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl PixelRect {
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawPrimitive {
    StrokeRect {
        rect: PixelRect,
        color: [u8; 3],
        stroke_width: u32,
    },
    FillRect {
        rect: PixelRect,
        color: [u8; 3],
    },
}

/// Top-left and bottom-right handle squares of side `active_size`
pub fn handle_rects(selection: &SelectionRect, active_size: i32) -> (PixelRect, PixelRect) {
    let top_left = PixelRect {
        left: selection.left(),
        top: selection.top(),
        right: selection.left() + active_size,
        bottom: selection.top() + active_size,
    };
    let bottom_right = PixelRect {
        left: selection.right() - active_size,
        top: selection.bottom() - active_size,
        right: selection.right(),
        bottom: selection.bottom(),
    };
    (top_left, bottom_right)
}

/// Outline plus the two handle squares
pub fn draw_primitives(selection: &SelectionRect, active_size: i32) -> Vec<DrawPrimitive> {
    let outline = PixelRect {
        left: selection.left(),
        top: selection.top(),
        right: selection.right(),
        bottom: selection.bottom(),
    };
    let (top_left, bottom_right) = handle_rects(selection, active_size);

    vec![
        DrawPrimitive::StrokeRect {
            rect: outline,
            color: PICKER_COLOR,
            stroke_width: STROKE_WIDTH,
        },
        DrawPrimitive::FillRect {
            rect: top_left,
            color: ACTIVE_COLOR,
        },
        DrawPrimitive::FillRect {
            rect: bottom_right,
            color: ACTIVE_COLOR,
        },
    ]
}

/// Paint primitives onto an RGB canvas
pub fn rasterize(primitives: &[DrawPrimitive], canvas: &mut RgbImage) {
    for primitive in primitives {
        match *primitive {
            DrawPrimitive::StrokeRect {
                rect,
                color,
                stroke_width,
            } => {
                // Inset each ring so the stroke stays inside the outline
                for inset in 0..stroke_width as i32 {
                    let ring = PixelRect {
                        left: rect.left + inset,
                        top: rect.top + inset,
                        right: rect.right - inset,
                        bottom: rect.bottom - inset,
                    };
                    if let Some(r) = to_imageproc(ring) {
                        draw_hollow_rect_mut(canvas, r, Rgb(color));
                    }
                }
            }
            DrawPrimitive::FillRect { rect, color } => {
                if let Some(r) = to_imageproc(rect) {
                    draw_filled_rect_mut(canvas, r, Rgb(color));
                }
            }
        }
    }
}

fn to_imageproc(rect: PixelRect) -> Option<Rect> {
    if rect.width() <= 0 || rect.height() <= 0 {
        return None;
    }
    Some(Rect::at(rect.left, rect.top).of_size(rect.width() as u32, rect.height() as u32))
}
