//! Geometry Layer
//!
//! Pure functions translating between UI space (the picker view the user
//! touches) and sensor space (the raw camera buffer), plus orientation math.

pub mod transform;

pub use transform::crop_and_rotate;

use serde::{Deserialize, Serialize};

use crate::capture::CameraFacing;

/// Width/height pair in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True if either side is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Quarter-turn rotation aligning sensor pixels with what the user sees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    #[serde(rename = "0")]
    Deg0,
    #[serde(rename = "90")]
    Deg90,
    #[serde(rename = "180")]
    Deg180,
    #[serde(rename = "270")]
    Deg270,
}

impl Orientation {
    pub const ALL: [Orientation; 4] = [
        Orientation::Deg0,
        Orientation::Deg90,
        Orientation::Deg180,
        Orientation::Deg270,
    ];

    /// Snap an arbitrary angle to the nearest quarter turn.
    ///
    /// Negative angles and angles of a full turn or more are normalized first,
    /// so `-90` and `630` both give `Deg270`.
    pub fn from_degrees(degrees: i32) -> Self {
        let normalized = degrees.rem_euclid(360);
        match ((normalized + 45) / 90) % 4 {
            0 => Orientation::Deg0,
            1 => Orientation::Deg90,
            2 => Orientation::Deg180,
            _ => Orientation::Deg270,
        }
    }

    pub fn degrees(self) -> i32 {
        match self {
            Orientation::Deg0 => 0,
            Orientation::Deg90 => 90,
            Orientation::Deg180 => 180,
            Orientation::Deg270 => 270,
        }
    }

    /// Sensor width runs along the UI's vertical axis
    pub fn is_portrait(self) -> bool {
        matches!(self, Orientation::Deg90 | Orientation::Deg270)
    }
}

/// Compute the rotation between sensor and display.
///
/// Front cameras are mirrored, so their rotation is reflected after adding
/// the device rotation to the mount angle.
pub fn compute_orientation_degrees(
    device_rotation: Orientation,
    sensor_mount_angle: i32,
    facing: CameraFacing,
) -> Orientation {
    let mount = sensor_mount_angle.rem_euclid(360);
    let device = device_rotation.degrees();

    let degrees = match facing {
        CameraFacing::Front => (360 - (mount + device) % 360) % 360,
        CameraFacing::Back => (mount - device + 360) % 360,
    };

    Orientation::from_degrees(degrees)
}

/// Picker rectangle in UI space, together with the bounds it must respect.
///
/// Invariants (upheld by `RegionPicker`):
/// `padding <= x`, `x + width <= bound_width - padding`, same for the y axis,
/// and both `width` and `height` are positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SelectionRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub padding: i32,
    pub bound_width: i32,
    pub bound_height: i32,
}

impl SelectionRect {
    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Bound box supplied by the hosting view
    pub fn bound_size(&self) -> Size {
        Size::new(self.bound_width.max(0) as u32, self.bound_height.max(0) as u32)
    }

    /// Inclusive point containment
    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.left() && px <= self.right() && py >= self.top() && py <= self.bottom()
    }

    /// Check every rectangle invariant
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.x >= self.padding
            && self.y >= self.padding
            && self.right() <= self.bound_width - self.padding
            && self.bottom() <= self.bound_height - self.padding
    }
}

/// Crop rectangle in the rotated sensor image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorCropRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl SensorCropRect {
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Same rectangle with axes expressed along the unrotated sensor buffer.
    ///
    /// Only the extent is swapped for portrait orientations; this is what a
    /// caller checks against the raw frame's width and height.
    pub fn in_sensor_axes(&self, orientation: Orientation) -> SensorCropRect {
        if orientation.is_portrait() {
            SensorCropRect {
                x: self.y,
                y: self.x,
                width: self.height,
                height: self.width,
            }
        } else {
            *self
        }
    }
}

/// Map a UI-space selection into the rotated sensor image.
///
/// In portrait orientations the sensor width lies along the UI height, so
/// the axes are swapped before computing the ratios. Coordinates truncate
/// toward zero. The result is only guaranteed to fit the sensor when
/// `bound` matches the view the selection was made in.
pub fn map_selection_to_sensor(
    selection: &SelectionRect,
    bound: Size,
    sensor: Size,
    orientation: Orientation,
) -> SensorCropRect {
    if bound.is_empty() {
        return SensorCropRect::default();
    }

    let (width_ratio, height_ratio) = if orientation.is_portrait() {
        (
            sensor.height as f32 / bound.width as f32,
            sensor.width as f32 / bound.height as f32,
        )
    } else {
        (
            sensor.width as f32 / bound.width as f32,
            sensor.height as f32 / bound.height as f32,
        )
    };

    let left = (width_ratio * selection.left() as f32) as i32;
    let right = (width_ratio * selection.right() as f32) as i32;
    let top = (height_ratio * selection.top() as f32) as i32;
    let bottom = (height_ratio * selection.bottom() as f32) as i32;

    SensorCropRect {
        x: left,
        y: top,
        width: right - left,
        height: bottom - top,
    }
}
