//! Replay frame source
//!
//! Stands in for a live camera by loading still images from a directory and
//! re-encoding them as NV21 preview frames.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::capture::frame::Frame;
use crate::geometry::Size;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

/// Directory-backed sequence of preview frames
pub struct ReplaySource {
    paths: Vec<PathBuf>,
    cursor: usize,
}

impl ReplaySource {
    /// Collect every image in `dir`, sorted by file name
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read frame directory {:?}", dir))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image(path))
            .collect();
        paths.sort();

        info!("Replay source: {} frames in {:?}", paths.len(), dir);
        Ok(Self { paths, cursor: 0 })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Distinct resolutions found in the directory, as a camera would list them
    pub fn supported_sizes(&self) -> Vec<Size> {
        let mut sizes: Vec<Size> = self
            .paths
            .iter()
            .filter_map(|path| image::image_dimensions(path).ok())
            .map(|(width, height)| Size::new(width, height))
            .collect();
        sizes.sort_by_key(|s| (s.width, s.height));
        sizes.dedup();
        sizes
    }

    /// Load the next frame, skipping files that fail to decode
    pub fn next_frame(&mut self) -> Option<Frame> {
        while let Some(path) = self.paths.get(self.cursor) {
            self.cursor += 1;
            match image::open(path) {
                Ok(image) => {
                    debug!("Replaying {:?}", path);
                    return Some(Frame::from_rgb(&image.to_rgb8()));
                }
                Err(e) => warn!("Skipping unreadable frame {:?}: {}", path, e),
            }
        }
        None
    }

    /// Start over from the first frame
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
