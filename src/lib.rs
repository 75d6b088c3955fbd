// THEORY:
// This file is the main entry point for the `sem_sensor` library crate. It turns
// the per-image output of an external object detector into calibrated physical
// measurements for scanning-electron-microscope images.
//
// The public surface is deliberately small:
// - `pipeline::analyze_image` analyzes one image end to end.
// - `parallel_pipeline::ParallelPipeline` analyzes a directory of images.
// - `config::AnalysisConfig` carries every tunable, explicitly, into each call.
// - `error::AnalysisError` names every way an analysis can fail.
//
// The layers underneath (`core_modules`) stay usable on their own: reading label
// files, converting a record with a calibration, aggregating statistics, and
// drawing overlays are all plain functions over plain data.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;

pub use config::AnalysisConfig;
pub use error::{AnalysisError, Result};
