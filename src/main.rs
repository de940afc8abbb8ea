mod app;
mod config;
mod dataset;
mod util;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{EngineConfig, PinRelease};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Payment network dataset (JSON).
    #[arg(long, default_value = "data/sample_network.json")]
    dataset: PathBuf,

    /// Engine tuning file (JSON). Missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the layout and particle seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Keep dragged nodes pinned where they are dropped.
    #[arg(long)]
    keep_pins: bool,
}

fn engine_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if args.keep_pins {
        config.pin_release = PinRelease::Keep;
    }
    Ok(config)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = match engine_config(&args) {
        Ok(config) => config,
        Err(error) => {
            error!("{error:#}");
            return ExitCode::FAILURE;
        }
    };
    info!(dataset = %args.dataset.display(), seed = config.seed, "starting payflow-network");

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    let dataset_path = args.dataset;
    let result = eframe::run_native(
        "payflow-network",
        options,
        Box::new(move |cc| Ok(Box::new(app::NetworkApp::new(cc, dataset_path, config)))),
    );

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "viewer exited with an error");
            ExitCode::FAILURE
        }
    }
}
