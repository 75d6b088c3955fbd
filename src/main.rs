use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use sem_sensor::parallel_pipeline::{self, ParallelPipeline};
use sem_sensor::pipeline::{self, ImageJob};
use sem_sensor::AnalysisConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sem_sensor")]
#[command(about = "Measure detected objects in SEM images in calibrated nanometers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a single image and its detector label file.
    Analyze {
        /// Source image.
        #[arg(long)]
        image: PathBuf,

        /// Detector label file (`class cx cy w h` per line).
        #[arg(long)]
        labels: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Analyze every image in a directory against a directory of label files.
    Batch {
        /// Directory of source images.
        #[arg(long)]
        images: PathBuf,

        /// Directory of `<image stem>.txt` label files.
        #[arg(long)]
        labels: PathBuf,

        /// Images analyzed at once (default: one per CPU).
        #[arg(long)]
        jobs: Option<usize>,

        /// Print a JSON summary of every image to stdout.
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Debug, Clone, Args)]
struct CommonArgs {
    /// Horizontal field of view of the image, in micrometers.
    #[arg(long, env = "SEM_SENSOR_FOV")]
    fov: f64,

    /// Root directory for per-image results (default: next to each image).
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Raster artifact extension, e.g. png or jpg.
    #[arg(long)]
    format: Option<String>,

    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl CommonArgs {
    fn load_config(&self) -> anyhow::Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_json_file(path)?,
            None => AnalysisConfig::default(),
        };
        if let Some(dir) = &self.output_dir {
            config.output_root = Some(dir.clone());
        }
        if let Some(format) = &self.format {
            config.artifact_extension = format.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze { image, labels, common } => {
            let config = common.load_config()?;
            let job = ImageJob {
                image_path: image,
                annotation_path: Some(labels),
                field_of_view_micrometers: common.fov,
            };
            let analysis = pipeline::analyze_image(&job, &config)
                .with_context(|| format!("analysis of {} failed", job.image_path.display()))?;
            match &analysis.report {
                Some(report) => print!("{}", report.to_text()),
                None => println!("No detections for {}", analysis.image_name),
            }
            println!("Results written to {}", analysis.output_dir.display());
            if !analysis.failed_artifacts.is_empty() {
                bail!("{} artifacts could not be written", analysis.failed_artifacts.len());
            }
        }
        Commands::Batch {
            images,
            labels,
            jobs,
            json,
            common,
        } => {
            let config = common.load_config()?;
            let image_jobs = parallel_pipeline::discover_jobs(&images, &labels, common.fov)
                .with_context(|| format!("cannot prepare batch from {}", images.display()))?;

            let entries = ParallelPipeline::new(config, jobs).run(image_jobs).await;

            if json {
                let summaries: Vec<_> = entries.iter().map(|entry| entry.summary()).collect();
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            }

            let fatal = entries.iter().filter(|entry| entry.is_fatal()).count();
            log::info!("batch finished: {} images, {fatal} failed", entries.len());
            if fatal > 0 {
                bail!("{fatal} of {} images failed", entries.len());
            }
        }
    }
    Ok(())
}
