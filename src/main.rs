use clap::Parser;
use env_logger::Env;
use log::info;

use segbench::cli::{Cli, Command};
use segbench::error::Result;
use segbench::experiment::{
    prediction_experiment, training_experiment, ExperimentConfig, PredictOptions, TrainOptions,
};
use segbench::postprocess::run_postprocess;
use segbench::split::{roster_image_uris, split_images, SplitOptions};
use segbench::storage::storage_for;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    info!("=== Segmentation Benchmark Tooling ===");

    // Set thread pool size if specified
    if let Some(n_threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build_global()
            .expect("Failed to build thread pool");
        info!("Using {} threads", n_threads);
    }

    match cli.command {
        Command::Split {
            stac_uri,
            output_dir,
            tile_size,
            work_dir,
            image_uris,
        } => {
            let uris = if image_uris.is_empty() {
                roster_image_uris(&stac_uri)
            } else {
                image_uris
            };
            info!("Splitting {} source images into {}", uris.len(), output_dir);

            let mut options = SplitOptions {
                tile_size,
                ..SplitOptions::default()
            };
            if let Some(dir) = work_dir {
                options.work_dir = dir;
            }
            split_images(&uris, &output_dir, &options)?;
        }

        Command::TrainConfig {
            experiment_id,
            stac_uri,
            img_dir,
            root_uri,
            test,
            output,
        } => {
            let storage = storage_for(&stac_uri);
            let config = training_experiment(
                &TrainOptions {
                    experiment_id,
                    stac_uri,
                    img_dir,
                    root_uri,
                    test,
                },
                storage.as_ref(),
            )?;
            emit_config(&config, output.as_deref())?;
        }

        Command::PredictConfig {
            experiment_id,
            stac_uri,
            root_uri,
            predict_dir,
            test,
            output,
        } => {
            let storage = storage_for(&stac_uri);
            let config = prediction_experiment(
                &PredictOptions {
                    experiment_id,
                    stac_uri,
                    root_uri,
                    predict_dir,
                    test,
                },
                storage.as_ref(),
            )?;
            emit_config(&config, output.as_deref())?;
        }

        Command::Postprocess {
            experiment_id,
            root_uri,
            work_dir,
            uris,
        } => {
            let work_dir = work_dir.unwrap_or_else(std::env::temp_dir);
            run_postprocess(&uris, &root_uri, &experiment_id, &work_dir)?;
        }
    }

    info!("=== Done! ===");
    Ok(())
}

fn emit_config(config: &ExperimentConfig, output: Option<&str>) -> Result<()> {
    let json = config.to_json()?;
    match output {
        Some(uri) => {
            storage_for(uri).write_text(uri, &json)?;
            info!("Wrote experiment configuration to {}", uri);
        }
        None => println!("{}", json),
    }
    Ok(())
}
