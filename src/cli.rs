use crate::constants::DEFAULT_TILE_SIZE;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

const DEFAULT_TRAIN_STAC: &str =
    "s3://raster-vision-world-bank-challenge/FINAL/train_tier_1/catalog.json";
const DEFAULT_IMG_DIR: &str = "s3://raster-vision-world-bank-challenge/splits";
const DEFAULT_ROOT_URI: &str = "s3://raster-vision-world-bank-challenge/benchmark";

#[derive(Parser, Debug)]
#[command(name = "segbench")]
#[command(about = "Experiment assembly and batch tooling for a building-segmentation benchmark")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Number of threads for image-level parallelism (default: all available)
    #[arg(short, long, value_name = "N", global = true)]
    pub threads: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Split catalog scenes into compressed, coverage-filtered tiles
    Split {
        /// Training catalog URI
        #[arg(long, value_name = "URI", default_value = DEFAULT_TRAIN_STAC)]
        stac_uri: String,

        /// Destination prefix for split tiles
        #[arg(long, value_name = "URI", default_value = DEFAULT_IMG_DIR)]
        output_dir: String,

        /// Nominal tile size in pixels
        #[arg(long, value_name = "PIXELS", default_value_t = DEFAULT_TILE_SIZE)]
        tile_size: usize,

        /// Work directory for temporary tiles (default: system temp dir)
        #[arg(long, value_name = "DIR")]
        work_dir: Option<PathBuf>,

        /// Explicit source image URIs (bypasses the catalog roster)
        #[arg(long = "image-uri", value_name = "URI")]
        image_uris: Vec<String>,
    },

    /// Assemble the training experiment configuration
    TrainConfig {
        /// Experiment identifier
        #[arg(long, value_name = "ID")]
        experiment_id: String,

        /// Training catalog URI
        #[arg(long, value_name = "URI", default_value = DEFAULT_TRAIN_STAC)]
        stac_uri: String,

        /// Prefix holding the split tiles
        #[arg(long, value_name = "URI", default_value = DEFAULT_IMG_DIR)]
        img_dir: String,

        /// Root URI for experiment outputs
        #[arg(long, value_name = "URI", default_value = DEFAULT_ROOT_URI)]
        root_uri: String,

        /// Shrink the run for a pipeline smoke test
        #[arg(long)]
        test: bool,

        /// Where to write the configuration JSON (stdout when omitted)
        #[arg(long, value_name = "URI")]
        output: Option<String>,
    },

    /// Assemble the prediction experiment configuration
    PredictConfig {
        /// Experiment identifier
        #[arg(long, value_name = "ID")]
        experiment_id: String,

        /// Catalog of scenes to predict
        #[arg(long, value_name = "URI")]
        stac_uri: String,

        /// Root URI for experiment outputs
        #[arg(long, value_name = "URI", default_value = DEFAULT_ROOT_URI)]
        root_uri: String,

        /// Local directory the framework writes predictions into
        #[arg(long, value_name = "DIR", default_value = "/opt/data/predict")]
        predict_dir: String,

        /// Shrink the run for a pipeline smoke test
        #[arg(long)]
        test: bool,

        /// Where to write the configuration JSON (stdout when omitted)
        #[arg(long, value_name = "URI")]
        output: Option<String>,
    },

    /// Remap predicted rasters and upload them for submission
    Postprocess {
        /// Experiment identifier
        #[arg(long, value_name = "ID")]
        experiment_id: String,

        /// Root URI for experiment outputs
        #[arg(long, value_name = "URI", default_value = DEFAULT_ROOT_URI)]
        root_uri: String,

        /// Work directory for remapped rasters (default: system temp dir)
        #[arg(long, value_name = "DIR")]
        work_dir: Option<PathBuf>,

        /// Predicted raster files
        #[arg(value_name = "URI", required = true)]
        uris: Vec<String>,
    },
}
