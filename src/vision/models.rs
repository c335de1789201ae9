//! Language data provisioning
//!
//! Tesseract expects `<data_dir>/tessdata/<lang>.traineddata`. The file is
//! copied from a bundled directory on first use; without it the pipeline
//! refuses to start.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::ToolError;

/// Name of the model directory under the data root
pub const TESSDATA_DIR: &str = "tessdata";

/// Locates and provisions trained language files under a data root
#[derive(Debug, Clone)]
pub struct LanguageData {
    data_dir: PathBuf,
}

impl LanguageData {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Data root handed to the engine
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn tessdata_dir(&self) -> PathBuf {
        self.data_dir.join(TESSDATA_DIR)
    }

    /// Path of the trained data file for `language`
    pub fn traineddata_path(&self, language: &str) -> PathBuf {
        self.tessdata_dir().join(format!("{}.traineddata", language))
    }

    /// Check if a non-empty model file is present
    pub fn is_available(&self, language: &str) -> bool {
        std::fs::metadata(self.traineddata_path(language))
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    /// Make sure the model for `language` exists, copying it from
    /// `<bundled>/tessdata/` when missing. Returns the model path.
    pub fn ensure(&self, language: &str, bundled: Option<&Path>) -> Result<PathBuf, ToolError> {
        let target = self.traineddata_path(language);

        std::fs::create_dir_all(self.tessdata_dir())?;

        if self.is_available(language) {
            debug!("Language data for '{}' found at {:?}", language, target);
            return Ok(target);
        }

        if let Some(bundled) = bundled {
            let source = LanguageData::new(bundled).traineddata_path(language);
            if source.is_file() {
                info!("Provisioning language data {:?} -> {:?}", source, target);
                std::fs::copy(&source, &target)?;
                return Ok(target);
            }
            warn!("Bundled language data not found at {:?}", source);
        }

        Err(ToolError::MissingLanguageData(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths() {
        let data = LanguageData::new("/data/previewocr");
        assert_eq!(
            data.traineddata_path("eng"),
            PathBuf::from("/data/previewocr/tessdata/eng.traineddata")
        );
    }

    #[test]
    fn test_ensure_existing() {
        let dir = TempDir::new().unwrap();
        let data = LanguageData::new(dir.path());
        std::fs::create_dir_all(data.tessdata_dir()).unwrap();
        std::fs::write(data.traineddata_path("eng"), b"model").unwrap();

        let path = data.ensure("eng", None).unwrap();
        assert_eq!(path, data.traineddata_path("eng"));
    }

    #[test]
    fn test_ensure_copies_bundled() {
        let bundled = TempDir::new().unwrap();
        let source = LanguageData::new(bundled.path());
        std::fs::create_dir_all(source.tessdata_dir()).unwrap();
        std::fs::write(source.traineddata_path("deu"), b"bundled model").unwrap();

        let dir = TempDir::new().unwrap();
        let data = LanguageData::new(dir.path());
        assert!(!data.is_available("deu"));

        let path = data.ensure("deu", Some(bundled.path())).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"bundled model");
        assert!(data.is_available("deu"));
    }

    #[test]
    fn test_ensure_missing_fails_loudly() {
        let dir = TempDir::new().unwrap();
        let data = LanguageData::new(dir.path());

        let err = data.ensure("eng", Some(dir.path())).unwrap_err();
        assert!(matches!(err, ToolError::MissingLanguageData(ref p) if p.ends_with("eng.traineddata")));
    }

    #[test]
    fn test_empty_file_is_not_available() {
        let dir = TempDir::new().unwrap();
        let data = LanguageData::new(dir.path());
        std::fs::create_dir_all(data.tessdata_dir()).unwrap();
        std::fs::write(data.traineddata_path("eng"), b"").unwrap();
        assert!(!data.is_available("eng"));
    }
}
