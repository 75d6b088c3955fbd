// THEORY:
// Every failure the measurement pipeline can hit is named here, once. The
// variants follow the life of a single image analysis: the annotation artifact
// is read, the image is decoded, a calibration is built, measurements are
// aggregated, and artifacts are written. Each variant carries enough context
// (path, line number, image name) for the caller to act without re-deriving it.
//
// `MalformedAnnotation`, `AnnotationIo`, `ImageDecodeFailure`,
// `InvalidCalibration` and `InvalidConfig` abort an image. `OutputDirConflict`
// keeps a batch image from running at all. `EmptyDetectionSet` comes from the
// statistics layer for an image with nothing in it; the pipeline turns it into
// an analysis without a report. `ArtifactWriteFailure` is scoped to the single
// file that could not be written.

use std::path::PathBuf;

/// Errors produced while turning detector output into calibrated measurements.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// A line of the annotation artifact is not five numeric tokens.
    #[error("malformed annotation {}:{line}: {reason}", path.display())]
    MalformedAnnotation {
        path: PathBuf,
        /// 1-based line number of the offending line.
        line: usize,
        reason: String,
    },

    #[error("cannot read annotation artifact {}", path.display())]
    AnnotationIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode image {}", path.display())]
    ImageDecodeFailure {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The image had zero detections, so no ranges or histograms exist.
    #[error("no detections for image `{image}`")]
    EmptyDetectionSet { image: String },

    #[error("cannot write artifact {}: {reason}", path.display())]
    ArtifactWriteFailure { path: PathBuf, reason: String },

    #[error("invalid calibration: {0}")]
    InvalidCalibration(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Two batch images would write into the same result directory.
    #[error("{} would overwrite results of {} in {}", image.display(), claimed_by.display(), dir.display())]
    OutputDirConflict {
        image: PathBuf,
        claimed_by: PathBuf,
        dir: PathBuf,
    },

    /// A batch worker died before returning a result.
    #[error("analysis worker failed: {0}")]
    Worker(String),
}

impl AnalysisError {
    /// True for the "image contains nothing" outcome, which callers usually skip
    /// rather than treat as a failure.
    pub fn is_empty_detection(&self) -> bool {
        matches!(self, AnalysisError::EmptyDetectionSet { .. })
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
