// THEORY:
// The calibration layer is where normalized detector geometry becomes a physical
// measurement. It is the one place in the system with real numeric contracts,
// and those contracts must hold identically for every image and every scale.
//
// Key architectural principles:
// 1.  **Validated Once**: `ImageCalibration` can only be built from positive,
//     finite inputs. Once it exists, conversion is total and cannot fail.
// 2.  **Per-Axis Scale**: Both nm/px scales come from the single horizontal field
//     of view. `scale_y = fov / pixel_height` assumes square pixel pitch; that
//     is the calibration the microscope reports, and it is kept as is.
// 3.  **Two Phases**: normalized -> pixels (multiply by raster size), then
//     pixels -> nanometers (multiply by the axis scale). X quantities and
//     widths use `scale_x`; Y quantities and heights use `scale_y`.
// 4.  **Rendering Parity**: The top-left pixel corner is truncated toward zero,
//     never rounded. Downstream overlays depend on that exact placement.

use crate::core_modules::detection::DetectionRecord;
use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};

const NANOMETERS_PER_MICROMETER: f64 = 1000.0;

/// The physical scale of one image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageCalibration {
    pixel_width: u32,
    pixel_height: u32,
    field_of_view_micrometers: f64,
}

impl ImageCalibration {
    pub fn new(pixel_width: u32, pixel_height: u32, field_of_view_micrometers: f64) -> Result<Self> {
        if pixel_width == 0 || pixel_height == 0 {
            return Err(AnalysisError::InvalidCalibration(format!(
                "image dimensions must be positive, got {pixel_width}x{pixel_height}"
            )));
        }
        if !field_of_view_micrometers.is_finite() || field_of_view_micrometers <= 0.0 {
            return Err(AnalysisError::InvalidCalibration(format!(
                "field of view must be a positive number of micrometers, got {field_of_view_micrometers}"
            )));
        }
        Ok(Self {
            pixel_width,
            pixel_height,
            field_of_view_micrometers,
        })
    }

    pub fn pixel_width(&self) -> u32 {
        self.pixel_width
    }

    pub fn pixel_height(&self) -> u32 {
        self.pixel_height
    }

    pub fn field_of_view_micrometers(&self) -> f64 {
        self.field_of_view_micrometers
    }

    /// Nanometers per pixel along X.
    pub fn scale_x(&self) -> f64 {
        self.field_of_view_micrometers * NANOMETERS_PER_MICROMETER / self.pixel_width as f64
    }

    /// Nanometers per pixel along Y, derived from the horizontal field of view.
    pub fn scale_y(&self) -> f64 {
        self.field_of_view_micrometers * NANOMETERS_PER_MICROMETER / self.pixel_height as f64
    }
}

/// A detection converted into physical units, plus the pixel box used to draw it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibratedMeasurement {
    pub class_id: u32,
    pub center_x_nm: f64,
    pub center_y_nm: f64,
    pub width_nm: f64,
    pub height_nm: f64,
    /// Top-left corner, truncated toward zero.
    pub bbox_pixel_xmin: i32,
    pub bbox_pixel_ymin: i32,
    pub bbox_pixel_width: f64,
    pub bbox_pixel_height: f64,
}

/// Converts one record. Infallible: the calibration was validated on construction.
pub fn convert(record: &DetectionRecord, calibration: &ImageCalibration) -> CalibratedMeasurement {
    let image_width = calibration.pixel_width as f64;
    let image_height = calibration.pixel_height as f64;

    // --- 1. Normalized -> pixels ---
    let center_x_px = record.center_x_norm * image_width;
    let center_y_px = record.center_y_norm * image_height;
    let width_px = record.width_norm * image_width;
    let height_px = record.height_norm * image_height;

    // --- 2. Pixels -> nanometers ---
    let scale_x = calibration.scale_x();
    let scale_y = calibration.scale_y();

    // --- 3. Pixel-space corner for rendering ---
    // `as` truncates toward zero (and saturates on overflow).
    let xmin = (center_x_px - width_px / 2.0) as i32;
    let ymin = (center_y_px - height_px / 2.0) as i32;

    CalibratedMeasurement {
        class_id: record.class_id,
        center_x_nm: center_x_px * scale_x,
        center_y_nm: center_y_px * scale_y,
        width_nm: width_px * scale_x,
        height_nm: height_px * scale_y,
        bbox_pixel_xmin: xmin,
        bbox_pixel_ymin: ymin,
        bbox_pixel_width: width_px,
        bbox_pixel_height: height_px,
    }
}

/// Converts every record, keeping the input order (index i maps to index i).
pub fn convert_all(records: &[DetectionRecord], calibration: &ImageCalibration) -> Vec<CalibratedMeasurement> {
    records.iter().map(|record| convert(record, calibration)).collect()
}
