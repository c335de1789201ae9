//! Vision/OCR Layer
//!
//! The OCR engine seam used by the recognition worker, plus text
//! post-processing. The worker owns one engine for its whole running
//! lifetime and drives it synchronously, one crop at a time.

pub mod models;
pub mod tesseract;

use std::path::Path;
use std::sync::LazyLock;

use image::RgbImage;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

pub use models::LanguageData;
pub use tesseract::TesseractEngine;

/// Default recognition language (Tesseract code)
pub const DEFAULT_LANGUAGE: &str = "eng";

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^A-Za-z0-9]+").expect("pattern is a valid regex"));

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("engine is not initialized")]
    NotInitialized,
    #[error("language data missing: {0}")]
    MissingData(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("engine error: {0}")]
    EngineError(String),
}

/// Recognized text for one processed frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrResult {
    /// Normalized text
    pub text: String,
    /// Mean recognition confidence (0.0 - 1.0)
    pub confidence: f32,
}

/// Capabilities the worker needs from an OCR engine
pub trait OcrEngine: Send {
    /// Load the model for `language` from `data_path`
    fn initialize(&mut self, data_path: &Path, language: &str) -> Result<(), OcrError>;

    /// Set the image for the next `text`/`confidence` calls
    fn set_image(&mut self, image: &RgbImage) -> Result<(), OcrError>;

    /// Raw recognized text of the current image
    fn text(&mut self) -> Result<String, OcrError>;

    /// Mean confidence for the current image (0.0 - 1.0)
    fn confidence(&mut self) -> Result<f32, OcrError>;

    /// Forget the current image and any cached results
    fn reset(&mut self);

    /// Release engine resources; `initialize` must be called again before reuse
    fn shutdown(&mut self);
}

/// Replace every run of characters outside `[A-Za-z0-9]` with one space
pub fn normalize_text(raw: &str) -> String {
    NON_ALPHANUMERIC.replace_all(raw, " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_runs() {
        assert_eq!(normalize_text("He11o, World! 42"), "He11o World 42");
        assert_eq!(normalize_text("a--b__c"), "a b c");
    }

    #[test]
    fn test_normalize_edges_and_unicode() {
        assert_eq!(normalize_text("  abc\n"), " abc ");
        assert_eq!(normalize_text("zażółć 12"), "za 12");
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("!!!"), " ");
    }
}
