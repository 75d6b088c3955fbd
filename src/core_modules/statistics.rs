// THEORY:
// The statistics layer reduces an image's measurements to the numbers a
// microscopist actually reads: how many objects, where they sit, and how their
// sizes are distributed.
//
// Key principles:
// 1.  **Order Preservation**: Each value list keeps the measurement order, so
//     entry i of every list describes the same object.
// 2.  **Empty Is Not A Crash**: An image with no detections is a normal input.
//     It is reported as `EmptyDetectionSet` before any min/max is attempted.
// 3.  **Plain Histograms**: Bins are equal width over [min, max], the last bin is
//     closed on the right, and a single repeated value gets a unit-wide range
//     centered on it. Rendering the bars is somebody else's job.

use crate::core_modules::calibration::CalibratedMeasurement;
use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};

/// The per-image metric a histogram describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    Widths,
    Heights,
    XPositions,
    YPositions,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Widths,
        Metric::Heights,
        Metric::XPositions,
        Metric::YPositions,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Metric::Widths => "Object Widths",
            Metric::Heights => "Object Heights",
            Metric::XPositions => "Object X Positions",
            Metric::YPositions => "Object Y Positions",
        }
    }

    /// File-name form of the title, e.g. `object_x_positions`.
    pub fn slug(&self) -> String {
        self.title().to_lowercase().replace(' ', "_")
    }
}

/// Equal-width bins over a value list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// `counts.len() + 1` ascending edges.
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Bins `values` into `bins` buckets. `values` must be non-empty and `bins` >= 1.
    pub fn from_values(values: &[f64], bins: usize) -> Self {
        let (mut low, mut high) = min_max(values);
        if low == high {
            low -= 0.5;
            high += 0.5;
        }
        let width = (high - low) / bins as f64;
        let edges = (0..=bins).map(|i| low + width * i as f64).collect();

        let mut counts = vec![0usize; bins];
        for &value in values {
            let bin = (((value - low) / width) as usize).min(bins - 1);
            counts[bin] += 1;
        }
        Self { edges, counts }
    }

    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

/// Summary of one size distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
}

impl DistributionSummary {
    fn from_values(values: &[f64]) -> Self {
        let (min, max) = min_max(values);
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            min,
            max,
            mean,
            std_dev: variance.sqrt(),
        }
    }
}

/// Everything computed for one image. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageStatisticsReport {
    pub object_count: usize,
    pub width_values: Vec<f64>,
    pub height_values: Vec<f64>,
    pub x_position_values: Vec<f64>,
    pub y_position_values: Vec<f64>,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    pub width_summary: DistributionSummary,
    pub height_summary: DistributionSummary,
    pub histograms: Vec<(Metric, Histogram)>,
}

impl ImageStatisticsReport {
    pub fn values(&self, metric: Metric) -> &[f64] {
        match metric {
            Metric::Widths => &self.width_values,
            Metric::Heights => &self.height_values,
            Metric::XPositions => &self.x_position_values,
            Metric::YPositions => &self.y_position_values,
        }
    }

    pub fn histogram(&self, metric: Metric) -> Option<&Histogram> {
        self.histograms
            .iter()
            .find(|(m, _)| *m == metric)
            .map(|(_, histogram)| histogram)
    }

    /// The `object_information.txt` body.
    pub fn to_text(&self) -> String {
        format!(
            "Number of objects: {}\n\
             X position range: min = {:.2} nm, max = {:.2} nm\n\
             Y position range: min = {:.2} nm, max = {:.2} nm\n",
            self.object_count, self.x_range.0, self.x_range.1, self.y_range.0, self.y_range.1
        )
    }
}

/// Aggregates an image's measurements. `image` names the image in errors.
pub fn summarize(
    image: &str,
    measurements: &[CalibratedMeasurement],
    bins: usize,
) -> Result<ImageStatisticsReport> {
    if measurements.is_empty() {
        return Err(AnalysisError::EmptyDetectionSet {
            image: image.to_string(),
        });
    }

    let width_values: Vec<f64> = measurements.iter().map(|m| m.width_nm).collect();
    let height_values: Vec<f64> = measurements.iter().map(|m| m.height_nm).collect();
    let x_position_values: Vec<f64> = measurements.iter().map(|m| m.center_x_nm).collect();
    let y_position_values: Vec<f64> = measurements.iter().map(|m| m.center_y_nm).collect();

    let histograms = [
        (Metric::Widths, &width_values),
        (Metric::Heights, &height_values),
        (Metric::XPositions, &x_position_values),
        (Metric::YPositions, &y_position_values),
    ]
    .into_iter()
    .map(|(metric, values)| (metric, Histogram::from_values(values, bins.max(1))))
    .collect();

    Ok(ImageStatisticsReport {
        object_count: measurements.len(),
        x_range: min_max(&x_position_values),
        y_range: min_max(&y_position_values),
        width_summary: DistributionSummary::from_values(&width_values),
        height_summary: DistributionSummary::from_values(&height_values),
        histograms,
        width_values,
        height_values,
        x_position_values,
        y_position_values,
    })
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::calibration::{convert_all, ImageCalibration};
    use crate::core_modules::detection::DetectionRecord;
    use approx::assert_relative_eq;

    fn scenario_measurements() -> Vec<CalibratedMeasurement> {
        let records = [
            DetectionRecord {
                class_id: 0,
                center_x_norm: 0.5,
                center_y_norm: 0.5,
                width_norm: 0.1,
                height_norm: 0.2,
            },
            DetectionRecord {
                class_id: 1,
                center_x_norm: 0.2,
                center_y_norm: 0.8,
                width_norm: 0.05,
                height_norm: 0.05,
            },
        ];
        let calibration = ImageCalibration::new(2000, 1000, 8.29).unwrap();
        convert_all(&records, &calibration)
    }

    #[test]
    fn empty_input_is_a_distinct_condition() {
        let err = summarize("blank", &[], 50).unwrap_err();
        assert!(err.is_empty_detection());
        assert!(matches!(err, AnalysisError::EmptyDetectionSet { image } if image == "blank"));
    }

    #[test]
    fn two_object_scenario() {
        let report = summarize("sample", &scenario_measurements(), 50).unwrap();

        assert_eq!(report.object_count, 2);
        assert_eq!(report.width_values.len(), 2);
        assert_eq!(report.y_position_values.len(), 2);
        assert_relative_eq!(report.width_values[0], 829.0, max_relative = 1e-9);
        assert_relative_eq!(report.width_values[1], 414.5, max_relative = 1e-9);
        assert_relative_eq!(report.x_range.0, 1658.0, max_relative = 1e-9);
        assert_relative_eq!(report.x_range.1, 4145.0, max_relative = 1e-9);
        assert_relative_eq!(report.y_range.0, 4145.0, max_relative = 1e-9);
        assert_relative_eq!(report.y_range.1, 6632.0, max_relative = 1e-9);
        assert_relative_eq!(report.width_summary.mean, 621.75, max_relative = 1e-9);
        assert_relative_eq!(report.width_summary.std_dev, 207.25, max_relative = 1e-9);
    }

    #[test]
    fn text_report_has_three_lines() {
        let report = summarize("sample", &scenario_measurements(), 50).unwrap();
        assert_eq!(
            report.to_text(),
            "Number of objects: 2\n\
             X position range: min = 1658.00 nm, max = 4145.00 nm\n\
             Y position range: min = 4145.00 nm, max = 6632.00 nm\n"
        );
    }

    #[test]
    fn histogram_bins_cover_every_value() {
        let values = [0.0, 1.0, 2.5, 9.99, 10.0];
        let histogram = Histogram::from_values(&values, 10);

        assert_eq!(histogram.edges.len(), 11);
        assert_eq!(histogram.counts.iter().sum::<usize>(), values.len());
        assert_eq!(histogram.counts[0], 1);
        assert_eq!(histogram.counts[1], 1);
        assert_eq!(histogram.counts[2], 1);
        // 9.99 and the maximum both land in the closed last bin.
        assert_eq!(histogram.counts[9], 2);
    }

    #[test]
    fn degenerate_histogram_range_is_widened() {
        let histogram = Histogram::from_values(&[42.0, 42.0, 42.0], 50);
        assert_relative_eq!(histogram.edges[0], 41.5);
        assert_relative_eq!(histogram.edges[50], 42.5);
        assert_eq!(histogram.max_count(), 3);
        assert_eq!(histogram.counts.iter().filter(|&&c| c > 0).count(), 1);
    }

    #[test]
    fn every_metric_has_a_histogram() {
        let report = summarize("sample", &scenario_measurements(), 50).unwrap();
        for metric in Metric::ALL {
            let histogram = report.histogram(metric).unwrap();
            assert_eq!(histogram.counts.len(), 50);
            assert_eq!(histogram.counts.iter().sum::<usize>(), 2);
            assert_eq!(report.values(metric).len(), 2);
        }
        assert_eq!(Metric::XPositions.slug(), "object_x_positions");
    }
}
