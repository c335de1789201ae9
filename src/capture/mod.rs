//! Camera Capture Layer
//!
//! Frame types, the producer/worker queue, and the camera state the worker
//! needs to interpret a frame (active preview resolution and orientation).
//! Opening and enumerating camera devices is left to the host.

pub mod frame;
pub mod queue;
pub mod replay;

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::{compute_orientation_degrees, Orientation, Size};

pub use frame::Frame;
pub use queue::{FrameQueue, DEFAULT_QUEUE_SIZE};

/// Which way the active camera faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraFacing {
    Front,
    #[default]
    Back,
}

/// Snapshot of everything needed to map a selection onto a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CameraGeometry {
    /// Active preview resolution; frames use their own size when unset
    pub preview_size: Option<Size>,
    /// Rotation from sensor to display
    pub orientation: Orientation,
}

/// Shared camera geometry, replaced as a whole on every change
#[derive(Debug, Clone, Default)]
pub struct CameraHandle(Arc<RwLock<CameraGeometry>>);

impl CameraHandle {
    pub fn new(geometry: CameraGeometry) -> Self {
        Self(Arc::new(RwLock::new(geometry)))
    }

    /// Copy of the current geometry
    pub fn snapshot(&self) -> CameraGeometry {
        *self.0.read()
    }

    pub fn set_preview_size(&self, size: Size) {
        let mut geometry = self.0.write();
        geometry.preview_size = Some(size);
    }

    pub fn set_orientation(&self, orientation: Orientation) {
        self.0.write().orientation = orientation;
    }
}

/// Device rotation, mount angle and facing of the active camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraPose {
    pub device_rotation: Orientation,
    pub sensor_mount_angle: i32,
    pub facing: CameraFacing,
}

impl CameraPose {
    pub fn orientation(&self) -> Orientation {
        let orientation =
            compute_orientation_degrees(self.device_rotation, self.sensor_mount_angle, self.facing);
        debug!(
            "Orientation for {:?} camera (mount {}, device {}): {}",
            self.facing,
            self.sensor_mount_angle,
            self.device_rotation.degrees(),
            orientation.degrees()
        );
        orientation
    }
}

/// Pick the supported preview size best matching a `width`x`height` view.
///
/// Sizes whose aspect (`size.width / size.height`) is within 0.1 of
/// `height / width` are preferred, closest height first. Without such a
/// size, each candidate is judged on whichever of its height or width
/// difference is smaller.
pub fn optimal_preview_size(sizes: &[Size], width: u32, height: u32) -> Option<Size> {
    const ASPECT_TOLERANCE: f64 = 0.1;

    if sizes.is_empty() || width == 0 {
        return None;
    }

    let target_ratio = height as f64 / width as f64;
    let target_height = height as i64;
    let target_width = width as i64;

    let mut optimal = None;
    let mut min_diff_height = i64::MAX;

    for size in sizes.iter().filter(|s| s.height > 0) {
        let ratio = size.width as f64 / size.height as f64;
        if (ratio - target_ratio).abs() > ASPECT_TOLERANCE {
            continue;
        }
        let diff = (size.height as i64 - target_height).abs();
        if diff < min_diff_height {
            optimal = Some(*size);
            min_diff_height = diff;
        }
    }

    if optimal.is_some() {
        return optimal;
    }

    let mut min_diff_height = i64::MAX;
    let mut min_diff_width = i64::MAX;

    for size in sizes {
        let diff_height = (size.height as i64 - target_height).abs();
        let diff_width = (size.width as i64 - target_width).abs();

        if diff_height < diff_width {
            if diff_height < min_diff_height {
                optimal = Some(*size);
                min_diff_height = diff_height;
            }
        } else if diff_width < min_diff_width {
            optimal = Some(*size);
            min_diff_width = diff_width;
        }
    }

    optimal
}
