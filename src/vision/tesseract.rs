//! Tesseract backend
//!
//! Drives the system Tesseract install through `rusty-tesseract`. Each crop
//! is written to a scratch PNG, recognized with `image_to_data`, and the word
//! rows are joined back into lines.

use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use rusty_tesseract::{Args, Data, Image};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::vision::models::LanguageData;
use crate::vision::{OcrEngine, OcrError};

/// Word rows from `image_to_data` have this `level`
const WORD_LEVEL: i32 = 5;

#[derive(Debug, Clone, Default, PartialEq)]
struct Recognition {
    text: String,
    confidence: f32,
}

/// One recognized word and the line it belongs to
#[derive(Debug, Clone, PartialEq)]
struct Word {
    /// (page, block, paragraph, line)
    line: (i32, i32, i32, i32),
    conf: f32,
    text: String,
}

impl Word {
    fn from_data(row: &Data) -> Option<Self> {
        let text = row.text.trim();
        if row.level != WORD_LEVEL || text.is_empty() || row.conf < 0.0 {
            return None;
        }
        Some(Self {
            line: (row.page_num, row.block_num, row.par_num, row.line_num),
            conf: row.conf,
            text: text.to_string(),
        })
    }
}

/// OCR engine backed by the system `tesseract` install
pub struct TesseractEngine {
    args: Option<Args>,
    image: Option<NamedTempFile>,
    recognition: Option<Recognition>,
}

impl TesseractEngine {
    pub fn new() -> Self {
        Self {
            args: None,
            image: None,
            recognition: None,
        }
    }

    /// Scratch PNG holding the current image, if any
    pub fn image_path(&self) -> Option<PathBuf> {
        self.image.as_ref().map(|f| f.path().to_path_buf())
    }

    fn recognize(&mut self) -> Result<&Recognition, OcrError> {
        if self.recognition.is_none() {
            let args = self.args.as_ref().ok_or(OcrError::NotInitialized)?;
            let scratch = self
                .image
                .as_ref()
                .ok_or_else(|| OcrError::InvalidInput("no image set".to_string()))?;

            let image = Image::from_path(scratch.path())
                .map_err(|e| OcrError::InvalidInput(format!("unusable crop image: {}", e)))?;
            let output = rusty_tesseract::image_to_data(&image, args)
                .map_err(|e| OcrError::EngineError(format!("tesseract failed: {}", e)))?;

            let words: Vec<Word> = output.data.iter().filter_map(Word::from_data).collect();
            let recognition = join_words(&words);
            debug!(
                "Tesseract: {} words, {} chars, confidence {:.2}",
                words.len(),
                recognition.text.len(),
                recognition.confidence
            );
            self.recognition = Some(recognition);
        }

        self.recognition
            .as_ref()
            .ok_or_else(|| OcrError::EngineError("recognition missing".to_string()))
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for TesseractEngine {
    fn initialize(&mut self, data_path: &Path, language: &str) -> Result<(), OcrError> {
        let data = LanguageData::new(data_path);
        if !data.is_available(language) {
            return Err(OcrError::MissingData(
                data.traineddata_path(language).display().to_string(),
            ));
        }

        let version = rusty_tesseract::get_tesseract_version()
            .map_err(|e| OcrError::EngineError(format!("tesseract is not usable: {}", e)))?;

        // Inherited by every tesseract process spawned for this engine
        std::env::set_var("TESSDATA_PREFIX", data.tessdata_dir());

        info!(
            "Tesseract initialized ({}), language '{}', data {:?}",
            version.lines().next().unwrap_or("unknown version").trim(),
            language,
            data.tessdata_dir()
        );

        self.args = Some(Args {
            lang: language.to_string(),
            ..Args::default()
        });
        Ok(())
    }

    fn set_image(&mut self, image: &RgbImage) -> Result<(), OcrError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(OcrError::InvalidInput("empty image".to_string()));
        }

        let scratch = tempfile::Builder::new()
            .prefix("preview-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| OcrError::EngineError(format!("no scratch file: {}", e)))?;
        image
            .save_with_format(scratch.path(), ImageFormat::Png)
            .map_err(|e| OcrError::InvalidInput(format!("PNG encoding failed: {}", e)))?;

        self.image = Some(scratch);
        self.recognition = None;
        Ok(())
    }

    fn text(&mut self) -> Result<String, OcrError> {
        self.recognize().map(|r| r.text.clone())
    }

    fn confidence(&mut self) -> Result<f32, OcrError> {
        self.recognize().map(|r| r.confidence)
    }

    fn reset(&mut self) {
        self.image = None;
        self.recognition = None;
    }

    fn shutdown(&mut self) {
        self.reset();
        if self.args.take().is_some() {
            info!("Tesseract session closed");
        }
    }
}

/// Join words into lines and average their confidences.
///
/// Tesseract reports confidence as 0-100; the result is scaled to 0-1.
fn join_words(words: &[Word]) -> Recognition {
    let mut lines: Vec<String> = Vec::new();
    let mut current_line = None;
    let mut confidence_sum = 0.0f32;

    for word in words {
        match lines.last_mut() {
            Some(last) if current_line == Some(word.line) => {
                last.push(' ');
                last.push_str(&word.text);
            }
            _ => {
                lines.push(word.text.clone());
                current_line = Some(word.line);
            }
        }
        confidence_sum += word.conf;
    }

    let confidence = if words.is_empty() {
        0.0
    } else {
        (confidence_sum / words.len() as f32 / 100.0).clamp(0.0, 1.0)
    };

    Recognition {
        text: lines.join("\n"),
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(line: i32, conf: f32, text: &str) -> Word {
        Word {
            line: (1, 1, 1, line),
            conf,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_join_words_lines_and_confidence() {
        let words = [
            word(1, 90.0, "He11o,"),
            word(1, 70.0, "World!"),
            word(2, 80.0, "42"),
        ];

        let recognition = join_words(&words);
        assert_eq!(recognition.text, "He11o, World!\n42");
        assert!((recognition.confidence - 0.8).abs() < 1e-4);
    }

    #[test]
    fn test_join_words_empty() {
        assert_eq!(join_words(&[]), Recognition::default());
    }

    #[test]
    fn test_new_block_starts_new_line() {
        let mut second = word(1, 100.0, "b");
        second.line.1 = 2;
        let recognition = join_words(&[word(1, 100.0, "a"), second]);
        assert_eq!(recognition.text, "a\nb");
        assert!((recognition.confidence - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_text_before_initialize() {
        let mut engine = TesseractEngine::default();
        engine
            .set_image(&RgbImage::from_pixel(4, 4, image::Rgb([255, 255, 255])))
            .unwrap();
        assert!(matches!(engine.text(), Err(OcrError::NotInitialized)));
    }

    #[test]
    fn test_initialize_requires_language_data() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut engine = TesseractEngine::default();
        let result = engine.initialize(dir.path(), "eng");
        assert!(matches!(result, Err(OcrError::MissingData(_))));
    }

    #[test]
    fn test_empty_image_rejected() {
        let mut engine = TesseractEngine::default();
        assert!(engine.set_image(&RgbImage::new(0, 0)).is_err());
    }

    #[test]
    fn test_reset_removes_scratch_image() {
        let mut engine = TesseractEngine::default();
        engine
            .set_image(&RgbImage::from_pixel(4, 4, image::Rgb([0, 0, 0])))
            .unwrap();
        let path = engine.image_path().unwrap();
        assert!(path.is_file());

        engine.reset();
        assert!(engine.image_path().is_none());
        assert!(!path.exists());
    }
}
