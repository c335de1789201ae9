//! Error types shared across the pipeline
//!
//! Setup and lifecycle failures are `ToolError`; anything that only
//! affects a single frame is a `FrameError` and never stops the worker.

use std::path::PathBuf;

use thiserror::Error;

use crate::vision::OcrError;

/// Fatal setup or lifecycle errors
#[derive(Debug, Error)]
pub enum ToolError {
    /// An operation was called before its required setup
    #[error("precondition violated: {0}")]
    Precondition(&'static str),
    /// Settings failed validation at construction time
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The language model file is not where the engine expects it
    #[error("language data not found at {}", .0.display())]
    MissingLanguageData(PathBuf),
    /// The OCR engine refused to initialize
    #[error("OCR engine failed to initialize: {0}")]
    EngineInit(#[source] OcrError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Transient errors scoped to one frame
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame has zero dimension ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
    #[error("frame buffer too short: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("crop region does not intersect the rotated frame")]
    EmptyCrop,
    #[error("recognition failed: {0}")]
    Recognition(#[from] OcrError),
}
