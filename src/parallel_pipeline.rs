// THEORY:
// Images are independent: each one reads its own label file and writes only to
// its own result directory. The batch runner exploits that by running the
// synchronous per-image pipeline on tokio's blocking pool, a bounded number at
// a time, and handing the results back in the order the jobs were given.
//
// There is no shared mutable state between workers. The configuration is shared
// read-only behind an `Arc`. Before anything runs, every job's result directory
// is claimed in job order; a later job that maps onto an already claimed
// directory (`scan.01.png` and `scan.02.png` both land in `scan/`) is failed
// with `OutputDirConflict` and never analyzed.

use crate::config::AnalysisConfig;
use crate::core_modules::statistics::DistributionSummary;
use crate::error::{AnalysisError, Result};
use crate::pipeline::{analyze_image, output_dir_for, ImageAnalysis, ImageJob};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const LABEL_EXTENSION: &str = "txt";

/// Outcome of one image in a batch.
#[derive(Debug)]
pub struct BatchEntry {
    pub image_path: PathBuf,
    pub outcome: Result<ImageAnalysis>,
}

impl BatchEntry {
    /// True when the image produced no analysis at all.
    pub fn is_fatal(&self) -> bool {
        self.outcome.is_err()
    }

    pub fn summary(&self) -> EntrySummary {
        let image = self.image_path.display().to_string();
        match &self.outcome {
            Ok(analysis) => {
                let report = analysis.report.as_ref();
                EntrySummary {
                    image,
                    status: if analysis.has_detections() {
                        EntryStatus::Measured
                    } else {
                        EntryStatus::NoDetections
                    },
                    object_count: analysis.object_count(),
                    x_range: report.map(|r| r.x_range),
                    y_range: report.map(|r| r.y_range),
                    width: report.map(|r| r.width_summary),
                    height: report.map(|r| r.height_summary),
                    failed_artifacts: analysis.failed_artifacts.iter().map(|e| e.to_string()).collect(),
                    error: None,
                }
            }
            Err(err) => EntrySummary {
                image,
                status: EntryStatus::Failed,
                object_count: 0,
                x_range: None,
                y_range: None,
                width: None,
                height: None,
                failed_artifacts: Vec::new(),
                error: Some(err.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Measured,
    NoDetections,
    Failed,
}

/// Serializable digest of a `BatchEntry`.
#[derive(Debug, Clone, Serialize)]
pub struct EntrySummary {
    pub image: String,
    pub status: EntryStatus,
    pub object_count: usize,
    pub x_range: Option<(f64, f64)>,
    pub y_range: Option<(f64, f64)>,
    pub width: Option<DistributionSummary>,
    pub height: Option<DistributionSummary>,
    pub failed_artifacts: Vec<String>,
    pub error: Option<String>,
}

/// Pairs every decodable image in `images_dir` with `labels_dir/<stem>.txt`.
///
/// Images without a label file get `annotation_path: None`. Jobs are sorted by path.
pub fn discover_jobs(images_dir: &Path, labels_dir: &Path, field_of_view_micrometers: f64) -> Result<Vec<ImageJob>> {
    let entries = std::fs::read_dir(images_dir).map_err(|e| {
        AnalysisError::InvalidConfig(format!("cannot list {}: {e}", images_dir.display()))
    })?;

    let mut image_paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_image(path))
        .collect();
    image_paths.sort();

    let jobs = image_paths
        .into_iter()
        .map(|image_path| {
            let stem = image_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let label = labels_dir.join(format!("{stem}.{LABEL_EXTENSION}"));
            let annotation_path = if label.is_file() {
                Some(label)
            } else {
                log::debug!("no label file for {}, treating as no detections", image_path.display());
                None
            };
            ImageJob {
                image_path,
                annotation_path,
                field_of_view_micrometers,
            }
        })
        .collect();
    Ok(jobs)
}

fn is_image(path: &Path) -> bool {
    image::ImageFormat::from_path(path).is_ok_and(|format| format.can_read())
}

/// Runs many `ImageJob`s concurrently with a fixed upper bound on parallelism.
pub struct ParallelPipeline {
    config: Arc<AnalysisConfig>,
    workers: usize,
}

impl ParallelPipeline {
    /// `workers = None` uses one worker per CPU.
    pub fn new(config: AnalysisConfig, workers: Option<usize>) -> Self {
        let workers = workers.unwrap_or_else(num_cpus::get).max(1);
        Self {
            config: Arc::new(config),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Analyzes every job. The returned entries are in job order.
    pub async fn run(&self, jobs: Vec<ImageJob>) -> Vec<BatchEntry> {
        log::info!("analyzing {} images with {} workers", jobs.len(), self.workers);
        let config = Arc::clone(&self.config);
        let claims = claim_output_dirs(&jobs, &config);

        stream::iter(jobs.into_iter().zip(claims))
            .map(move |(job, claim)| {
                let config = Arc::clone(&config);
                async move {
                    let image_path = job.image_path.clone();
                    let outcome = match claim {
                        Ok(()) => tokio::task::spawn_blocking(move || analyze_image(&job, &config))
                            .await
                            .unwrap_or_else(|e| Err(AnalysisError::Worker(e.to_string()))),
                        Err(err) => Err(err),
                    };
                    if let Err(err) = &outcome {
                        log::error!("{}: {err}", image_path.display());
                    }
                    BatchEntry { image_path, outcome }
                }
            })
            .buffered(self.workers)
            .collect()
            .await
    }
}

/// First job to map onto a result directory owns it. Later ones get `OutputDirConflict`.
fn claim_output_dirs(jobs: &[ImageJob], config: &AnalysisConfig) -> Vec<Result<()>> {
    let mut owners: HashMap<PathBuf, &Path> = HashMap::new();
    jobs.iter()
        .map(|job| {
            let dir = output_dir_for(&job.image_path, config);
            match owners.get(&dir) {
                Some(owner) => Err(AnalysisError::OutputDirConflict {
                    image: job.image_path.clone(),
                    claimed_by: owner.to_path_buf(),
                    dir,
                }),
                None => {
                    owners.insert(dir, &job.image_path);
                    Ok(())
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn discovery_pairs_labels_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        let labels = dir.path().join("labels");
        std::fs::create_dir_all(&images).unwrap();
        std::fs::create_dir_all(&labels).unwrap();

        RgbImage::new(8, 8).save(images.join("b.png")).unwrap();
        RgbImage::new(8, 8).save(images.join("a.png")).unwrap();
        std::fs::write(images.join("notes.md"), "not an image").unwrap();
        std::fs::write(labels.join("a.txt"), "0 0.5 0.5 0.1 0.1\n").unwrap();

        let jobs = discover_jobs(&images, &labels, 2.0).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].image_path, images.join("a.png"));
        assert_eq!(jobs[0].annotation_path, Some(labels.join("a.txt")));
        assert_eq!(jobs[1].annotation_path, None);
        assert_eq!(jobs[1].field_of_view_micrometers, 2.0);
    }

    #[test]
    fn worker_count_is_at_least_one() {
        let pipeline = ParallelPipeline::new(AnalysisConfig::default(), Some(0));
        assert_eq!(pipeline.workers(), 1);
        let pipeline = ParallelPipeline::new(AnalysisConfig::default(), None);
        assert!(pipeline.workers() >= 1);
    }

    #[tokio::test]
    async fn batch_keeps_order_and_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        let labels = dir.path().join("labels");
        std::fs::create_dir_all(&images).unwrap();
        std::fs::create_dir_all(&labels).unwrap();

        for name in ["a", "b", "c"] {
            RgbImage::from_pixel(100, 50, Rgb([40, 40, 40]))
                .save(images.join(format!("{name}.png")))
                .unwrap();
        }
        std::fs::write(labels.join("a.txt"), "0 0.5 0.5 0.2 0.2\n1 0.25 0.5 0.1 0.1\n").unwrap();
        std::fs::write(labels.join("b.txt"), "0 0.5 0.5\n").unwrap();
        // c has no label file at all.

        let config = AnalysisConfig {
            output_root: Some(dir.path().join("out")),
            ..Default::default()
        };
        let jobs = discover_jobs(&images, &labels, 1.0).unwrap();
        let entries = ParallelPipeline::new(config, Some(2)).run(jobs).await;

        assert_eq!(entries.len(), 3);
        assert!(entries[0].image_path.ends_with("a.png"));
        assert_eq!(entries[0].summary().status, EntryStatus::Measured);
        assert_eq!(entries[0].summary().object_count, 2);

        assert!(entries[1].is_fatal());
        assert_eq!(entries[1].summary().status, EntryStatus::Failed);

        assert!(!entries[2].is_fatal());
        assert_eq!(entries[2].summary().status, EntryStatus::NoDetections);
        assert!(entries[2].summary().failed_artifacts.is_empty());

        let json = serde_json::to_string(&entries[0].summary()).unwrap();
        assert!(json.contains("\"status\":\"measured\""));
    }

    #[tokio::test]
    async fn images_sharing_a_result_dir_do_not_overwrite_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        let labels = dir.path().join("labels");
        std::fs::create_dir_all(&images).unwrap();
        std::fs::create_dir_all(&labels).unwrap();

        for name in ["scan.01", "scan.02"] {
            RgbImage::from_pixel(64, 64, Rgb([40, 40, 40]))
                .save(images.join(format!("{name}.png")))
                .unwrap();
        }
        std::fs::write(labels.join("scan.01.txt"), "0 0.5 0.5 0.1 0.1\n").unwrap();
        std::fs::write(
            labels.join("scan.02.txt"),
            "0 0.5 0.5 0.1 0.1\n0 0.2 0.2 0.1 0.1\n0 0.8 0.8 0.1 0.1\n",
        )
        .unwrap();

        let out = dir.path().join("out");
        let config = AnalysisConfig {
            output_root: Some(out.clone()),
            ..Default::default()
        };
        let jobs = discover_jobs(&images, &labels, 1.0).unwrap();
        let entries = ParallelPipeline::new(config, Some(2)).run(jobs).await;

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].summary().status, EntryStatus::Measured);
        assert_eq!(entries[0].summary().object_count, 1);
        assert!(matches!(
            &entries[1].outcome,
            Err(AnalysisError::OutputDirConflict { claimed_by, .. }) if claimed_by.ends_with("scan.01.png")
        ));
        assert!(entries[1].is_fatal());

        let report = std::fs::read_to_string(out.join("scan").join(crate::pipeline::REPORT_FILE_NAME)).unwrap();
        assert!(report.starts_with("Number of objects: 1\n"));
    }

    #[tokio::test]
    async fn no_detection_entries_keep_their_artifact_failures() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        let labels = dir.path().join("labels");
        std::fs::create_dir_all(&images).unwrap();
        std::fs::create_dir_all(&labels).unwrap();
        RgbImage::new(16, 16).save(images.join("empty.png")).unwrap();

        let out = dir.path().join("out");
        // A directory where the labeled overview should go.
        std::fs::create_dir_all(out.join("empty").join("empty_annotations.png")).unwrap();

        let config = AnalysisConfig {
            output_root: Some(out),
            ..Default::default()
        };
        let jobs = discover_jobs(&images, &labels, 1.0).unwrap();
        let entries = ParallelPipeline::new(config, Some(1)).run(jobs).await;

        let summary = entries[0].summary();
        assert_eq!(summary.status, EntryStatus::NoDetections);
        assert_eq!(summary.object_count, 0);
        assert_eq!(summary.failed_artifacts.len(), 1);
        assert!(summary.x_range.is_none());
    }
}
