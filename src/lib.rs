//! PreviewOCR - live camera preview text recognition
//!
//! A user drags a rectangle over the camera preview; a background worker
//! keeps cropping that region out of incoming frames and running OCR on it,
//! dropping stale frames when it falls behind.

pub mod capture;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod geometry;
pub mod picker;
pub mod storage;
pub mod tool;
pub mod vision;
pub mod worker;

pub use capture::{CameraFacing, Frame, FrameQueue};
pub use config::ToolConfig;
pub use dispatch::{CropListener, OcrEvent, OcrListener, ResultDispatcher, ResultReceiver};
pub use error::{FrameError, ToolError};
pub use geometry::{Orientation, SelectionRect, SensorCropRect, Size};
pub use picker::{ActiveZone, RegionPicker, TouchAction, TouchEvent};
pub use tool::{CameraTool, HostView, ToolSettings};
pub use vision::{OcrEngine, OcrError, OcrResult, TesseractEngine};
pub use worker::{RecognitionWorker, WorkerState};
