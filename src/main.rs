use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

use voc2yolo::{run, Args, PipelineConfig};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = PipelineConfig::from_args(&args);
    info!(
        "Starting dataset preparation in {}...",
        config.output_dir.display()
    );

    match run(&config) {
        Ok(summary) => {
            info!(
                "Wrote {} with {} class(es)",
                summary.manifest_path.display(),
                summary.classes.len()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to prepare dataset: {}", e);
            ExitCode::FAILURE
        }
    }
}
