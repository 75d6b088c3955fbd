// THEORY:
// A `DetectionRecord` is exactly what the detector wrote for one object: a class
// and a box in normalized image coordinates. It is a "dumb" data container. It
// knows nothing about pixels, nanometers, or which image it came from; those
// are added by the calibration layer.
//
// Normalized values are kept as emitted. Detectors routinely produce boxes that
// poke slightly past the frame, and clamping them here would silently change
// the measured sizes.

use serde::{Deserialize, Serialize};

/// One detected object, in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// Detector category. Carried through, never interpreted.
    pub class_id: u32,
    /// Box center as a fraction of image width.
    pub center_x_norm: f64,
    /// Box center as a fraction of image height.
    pub center_y_norm: f64,
    /// Box width as a fraction of image width.
    pub width_norm: f64,
    /// Box height as a fraction of image height.
    pub height_norm: f64,
}
