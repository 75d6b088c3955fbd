pub mod annotation_reader;
pub mod calibration;
pub mod detection;
pub mod histogram_plot;
pub mod renderer;
pub mod statistics;
pub mod utils;
