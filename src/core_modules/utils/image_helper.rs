pub mod image_helper {
    use crate::error::{AnalysisError, Result};
    use image::{ImageFormat, RgbImage};
    use std::path::Path;

    /// Creates `dir` and its parents. Succeeds if it already exists.
    pub fn ensure_dir(dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(|e| AnalysisError::ArtifactWriteFailure {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Encodes `image` to `path`, choosing the encoder from the file extension.
    pub fn save(image: &RgbImage, path: &Path) -> Result<()> {
        let format = ImageFormat::from_path(path).map_err(|e| AnalysisError::ArtifactWriteFailure {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        image
            .save_with_format(path, format)
            .map_err(|e| AnalysisError::ArtifactWriteFailure {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        log::debug!("wrote {}", path.display());
        Ok(())
    }

    /// Writes a text artifact.
    pub fn save_text(text: &str, path: &Path) -> Result<()> {
        std::fs::write(path, text).map_err(|e| AnalysisError::ArtifactWriteFailure {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        log::debug!("wrote {}", path.display());
        Ok(())
    }
}
