//! Debug copies of the crops sent to the OCR engine
//!
//! Files rotate through `preview-0.jpg` .. `preview-{N-1}.jpg`, overwriting
//! the oldest in place.

use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use tracing::{debug, warn};

/// Ring-buffer writer for crop previews
#[derive(Debug, Clone)]
pub struct PreviewSaver {
    dir: PathBuf,
    limit: u32,
    counter: u32,
}

impl PreviewSaver {
    /// Create the directory and a saver keeping at most `limit` files
    pub fn new(dir: impl Into<PathBuf>, limit: u32) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            limit: limit.max(1),
            counter: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the next `save` will write to
    pub fn next_path(&self) -> PathBuf {
        self.dir
            .join(format!("preview-{}.jpg", self.counter % self.limit))
    }

    /// Write `image` as JPEG. Failures are logged, never returned.
    pub fn save(&mut self, image: &RgbImage) {
        let path = self.next_path();
        match image.save_with_format(&path, ImageFormat::Jpeg) {
            Ok(()) => {
                debug!("Saved crop preview {:?}", path);
                self.counter = (self.counter + 1) % self.limit;
            }
            Err(e) => warn!("Failed to save crop preview {:?}: {}", path, e),
        }
    }
}
