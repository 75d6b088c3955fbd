// THEORY:
// `AnalysisConfig` is the single explicit value every pipeline call receives.
// Nothing about where artifacts go or how they look lives in process-wide state:
// two analyses with two configs never see each other's settings.
//
// Layering is defaults -> optional JSON file -> command-line overrides. The
// library only knows about the first two; the binary applies the third.

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_HISTOGRAM_BINS: usize = 50;
pub const DEFAULT_LABEL_MARGIN_PX: i32 = 10;

/// Configuration for one image analysis (or every image of a batch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Directory under which the per-image result directory is created.
    /// `None` places it next to the source image.
    pub output_root: Option<PathBuf>,
    /// Extension (and therefore encoder) of every raster artifact.
    pub artifact_extension: String,
    /// Number of equal-width bins in each histogram.
    pub histogram_bins: usize,
    /// How far above the box's top edge a size label is drawn, in pixels.
    pub label_margin_px: i32,
    /// Integer magnification of the built-in label glyphs.
    pub label_scale: u32,
    /// Stroke width of bounding boxes, in pixels.
    pub box_thickness: u32,
    /// Size of the rendered histogram charts, in pixels.
    pub histogram_width: u32,
    pub histogram_height: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            output_root: None,
            artifact_extension: "png".to_string(),
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
            label_margin_px: DEFAULT_LABEL_MARGIN_PX,
            label_scale: 2,
            box_thickness: 2,
            histogram_width: 1000,
            histogram_height: 500,
        }
    }
}

impl AnalysisConfig {
    /// Reads a JSON config file. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AnalysisError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            AnalysisError::InvalidConfig(format!("cannot parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.histogram_bins == 0 {
            return Err(AnalysisError::InvalidConfig(
                "histogram_bins must be at least 1".into(),
            ));
        }
        if self.label_scale == 0 || self.box_thickness == 0 {
            return Err(AnalysisError::InvalidConfig(
                "label_scale and box_thickness must be at least 1".into(),
            ));
        }
        if self.histogram_width < 64 || self.histogram_height < 64 {
            return Err(AnalysisError::InvalidConfig(
                "histogram charts must be at least 64x64 pixels".into(),
            ));
        }
        let supported = image::ImageFormat::from_extension(&self.artifact_extension)
            .is_some_and(|format| format.can_write());
        if !supported {
            return Err(AnalysisError::InvalidConfig(format!(
                "unsupported artifact extension `{}`",
                self.artifact_extension
            )));
        }
        Ok(())
    }
}
