// THEORY:
// The `pipeline` module is the top-level API for analyzing one image. It wires the
// core layers together in the only order that makes sense:
//
//   annotation_reader -> calibration (per record) -> { renderer, statistics }
//
// and lays out the per-image artifact directory. Everything it needs arrives in
// the `ImageJob` and the `AnalysisConfig`; nothing is remembered between calls,
// so any number of images can be analyzed side by side.
//
// Failure policy:
// - An invalid configuration, bad annotations, an undecodable image, or an
//   invalid calibration abort the image before anything is written.
// - A failed artifact write is recorded in `failed_artifacts` and the remaining
//   artifacts are still attempted.
// - An image without detections still gets its overviews. Its analysis has no
//   report and keeps every artifact outcome.

use crate::config::AnalysisConfig;
use crate::core_modules::annotation_reader::annotation_reader;
use crate::core_modules::calibration::{convert_all, CalibratedMeasurement, ImageCalibration};
use crate::core_modules::histogram_plot;
use crate::core_modules::renderer::{self, ArtifactOutcome, RenderStyle};
use crate::core_modules::statistics::{self, Metric};
use crate::core_modules::utils::image_helper::image_helper;
use crate::error::{AnalysisError, Result};
use std::path::{Path, PathBuf};

// Re-export key data structures for the public API.
pub use crate::core_modules::detection::DetectionRecord;
pub use crate::core_modules::statistics::{DistributionSummary, Histogram, ImageStatisticsReport};

pub const REPORT_FILE_NAME: &str = "object_information.txt";

/// One image to analyze.
#[derive(Debug, Clone)]
pub struct ImageJob {
    pub image_path: PathBuf,
    /// Detector label file. `None` means the detector found nothing and wrote no file.
    pub annotation_path: Option<PathBuf>,
    pub field_of_view_micrometers: f64,
}

/// The result of a successful image analysis.
#[derive(Debug)]
pub struct ImageAnalysis {
    pub image_name: String,
    pub output_dir: PathBuf,
    pub calibration: ImageCalibration,
    pub measurements: Vec<CalibratedMeasurement>,
    /// `None` when the image had no detections.
    pub report: Option<ImageStatisticsReport>,
    pub written_artifacts: Vec<PathBuf>,
    pub failed_artifacts: Vec<AnalysisError>,
}

impl ImageAnalysis {
    pub fn has_detections(&self) -> bool {
        self.report.is_some()
    }

    pub fn object_count(&self) -> usize {
        self.measurements.len()
    }
}

/// Name used for the result directory and artifact prefixes: the file name up to its first `.`.
pub fn image_name(image_path: &Path) -> String {
    let file_name = image_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let prefix = file_name.split('.').next().unwrap_or_default();
    if prefix.is_empty() {
        file_name.clone()
    } else {
        prefix.to_string()
    }
}

/// Directory that receives every artifact for `image_path`.
pub fn output_dir_for(image_path: &Path, config: &AnalysisConfig) -> PathBuf {
    let root = match &config.output_root {
        Some(root) => root.clone(),
        None => image_path.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    root.join(image_name(image_path))
}

pub fn histogram_file_name(image_name: &str, metric: Metric, extension: &str) -> String {
    format!("histogram_{image_name}_{}.{extension}", metric.slug())
}

/// Runs the whole pipeline for one image.
pub fn analyze_image(job: &ImageJob, config: &AnalysisConfig) -> Result<ImageAnalysis> {
    config.validate()?;
    let name = image_name(&job.image_path);

    // --- 1. Annotations ---
    let records = match &job.annotation_path {
        Some(path) => annotation_reader::read_annotations(path)?,
        None => Vec::new(),
    };

    // --- 2. Source image & calibration ---
    let source = image::open(&job.image_path)
        .map_err(|source| AnalysisError::ImageDecodeFailure {
            path: job.image_path.clone(),
            source,
        })?
        .to_rgb8();
    let (pixel_width, pixel_height) = source.dimensions();
    let calibration = ImageCalibration::new(pixel_width, pixel_height, job.field_of_view_micrometers)?;
    log::debug!(
        "{name}: {pixel_width}x{pixel_height} px over {} um, {:.4} nm/px (x), {:.4} nm/px (y)",
        calibration.field_of_view_micrometers(),
        calibration.scale_x(),
        calibration.scale_y()
    );

    // --- 3. Conversion ---
    let measurements = convert_all(&records, &calibration);

    // --- 4. Overviews ---
    let output_dir = output_dir_for(&job.image_path, config);
    let mut written_artifacts = Vec::new();
    let mut failed_artifacts = Vec::new();
    let dir_ready = match image_helper::ensure_dir(&output_dir) {
        Ok(()) => true,
        Err(err) => {
            log::warn!("{name}: {err}");
            failed_artifacts.push(err);
            false
        }
    };

    let style = RenderStyle {
        box_thickness: config.box_thickness,
        label_margin_px: config.label_margin_px,
        label_scale: config.label_scale,
    };
    if dir_ready {
        let outcomes = renderer::write_overviews(
            &source,
            &measurements,
            &style,
            &output_dir,
            &name,
            &config.artifact_extension,
        );
        for outcome in outcomes {
            record_outcome(&name, outcome, &mut written_artifacts, &mut failed_artifacts);
        }
    }

    // --- 5. Statistics ---
    let report = match statistics::summarize(&name, &measurements, config.histogram_bins) {
        Ok(report) => Some(report),
        Err(err) if err.is_empty_detection() => {
            log::warn!("{err}");
            None
        }
        Err(err) => return Err(err),
    };

    if let (true, Some(report)) = (dir_ready, &report) {
        for metric in Metric::ALL {
            let Some(histogram) = report.histogram(metric) else {
                continue;
            };
            let chart = histogram_plot::render_histogram(
                histogram,
                metric,
                config.histogram_width,
                config.histogram_height,
            );
            let path = output_dir.join(histogram_file_name(&name, metric, &config.artifact_extension));
            let result = image_helper::save(&chart, &path);
            record_outcome(&name, ArtifactOutcome { path, result }, &mut written_artifacts, &mut failed_artifacts);
        }

        let path = output_dir.join(REPORT_FILE_NAME);
        let result = image_helper::save_text(&report.to_text(), &path);
        record_outcome(&name, ArtifactOutcome { path, result }, &mut written_artifacts, &mut failed_artifacts);
    }

    log::info!(
        "{name}: {} objects, {} artifacts written, {} failed",
        measurements.len(),
        written_artifacts.len(),
        failed_artifacts.len()
    );

    Ok(ImageAnalysis {
        image_name: name,
        output_dir,
        calibration,
        measurements,
        report,
        written_artifacts,
        failed_artifacts,
    })
}

fn record_outcome(
    name: &str,
    outcome: ArtifactOutcome,
    written: &mut Vec<PathBuf>,
    failed: &mut Vec<AnalysisError>,
) {
    match outcome.result {
        Ok(()) => written.push(outcome.path),
        Err(err) => {
            log::warn!("{name}: {err}");
            failed.push(err);
        }
    }
}
