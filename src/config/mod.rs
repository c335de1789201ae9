//! Tool Configuration
//!
//! Settings stored in TOML format. Everything that used to be a
//! process-wide constant (language, data path, queue threshold) lives here
//! with a documented default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::capture::{CameraFacing, DEFAULT_QUEUE_SIZE};
use crate::picker::{PickerFit, DEFAULT_DIVIDER, DEFAULT_PADDING};
use crate::vision::DEFAULT_LANGUAGE;

/// Tool settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Recognition settings
    pub ocr: OcrSettings,
    /// Camera settings
    pub camera: CameraSettings,
    /// Region picker settings
    pub picker: PickerSettings,
    /// Debug output settings
    pub debug: DebugSettings,
}

/// Recognition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Tesseract language code
    pub language: String,
    /// Data root holding `tessdata/`; platform data dir when unset
    pub data_dir: Option<PathBuf>,
    /// Directory to provision `tessdata/<lang>.traineddata` from
    pub bundled_data_dir: Option<PathBuf>,
    /// Backlog size above which queued frames are dropped
    pub queue_size: usize,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            data_dir: None,
            bundled_data_dir: None,
            queue_size: DEFAULT_QUEUE_SIZE,
        }
    }
}

/// Camera settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Camera to use
    pub facing: CameraFacing,
    /// Clockwise angle the sensor is mounted at
    pub sensor_mount_angle: i32,
    /// Frame rate for replayed sources
    pub max_fps: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            facing: CameraFacing::Back,
            sensor_mount_angle: 90,
            max_fps: 15,
        }
    }
}

/// Region picker settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickerSettings {
    /// Handle size is the view's short side divided by this
    pub divider: i32,
    /// Gap kept between the rectangle and the view edges
    pub padding: i32,
    /// Initial rectangle shape
    pub fit: PickerFit,
}

impl Default for PickerSettings {
    fn default() -> Self {
        Self {
            divider: DEFAULT_DIVIDER,
            padding: DEFAULT_PADDING,
            fit: PickerFit::Square,
        }
    }
}

/// Debug output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugSettings {
    /// Save every crop sent to the engine
    pub save_previews: bool,
    /// Number of preview files to rotate through
    pub max_saved: u32,
    /// Preview directory; `<data_dir>/previews` when unset
    pub dir: Option<PathBuf>,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            save_previews: false,
            max_saved: 10,
            dir: None,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<ToolConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {:?}", path))?;
    let config: ToolConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &ToolConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
