//! `train` binary: entry point for the offline fingerprint pipeline.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin train -- --config train.json --mode analyze
//! cargo run --bin train -- --data-dir data --models-dir models --mode fit
//! ```

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use wifi_ips_core::MemoryFingerprintStore;
use wifi_ips_train::config::TrainingConfig;
use wifi_ips_train::dataset::FingerprintDataset;
use wifi_ips_train::error::TrainResult;
use wifi_ips_train::knn::{KnnClassifier, KnnRegressor};
use wifi_ips_train::trainer::{Trainable, Trainer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Grid-search and report metrics on the test sessions.
    Analyze,
    /// Fit the deployed parameters and save the artifacts.
    Fit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Role {
    Position,
    Floor,
    All,
}

/// Command-line arguments for the training binary.
#[derive(Parser, Debug)]
#[command(
    name = "train",
    version,
    about = "WiFi fingerprint positioning: offline pipeline",
    long_about = None
)]
struct Args {
    /// Path to the JSON configuration file.
    ///
    /// If not provided, the default `TrainingConfig` is used.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the data directory from the config.
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Override the models directory from the config.
    #[arg(long, value_name = "DIR")]
    models_dir: Option<PathBuf>,

    /// What to run.
    #[arg(long, value_enum, default_value_t = Mode::Fit)]
    mode: Mode,

    /// Which estimator(s) to run.
    #[arg(long, value_enum, default_value_t = Role::All)]
    role: Role,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = Args::parse();

    let log_level_filter = args
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);

    tracing_subscriber::fmt()
        .with_max_level(log_level_filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    info!("WiFi IPS training pipeline v{}", wifi_ips_train::VERSION);

    let mut config = match args.config.as_deref() {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            match TrainingConfig::from_json(path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    error!("Failed to load configuration: {e}");
                    std::process::exit(1);
                }
            }
        }
        None => {
            info!("No configuration file provided, using defaults");
            TrainingConfig::default()
        }
    };

    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = args.models_dir {
        config.models_dir = dir;
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {e}");
        std::process::exit(1);
    }

    if config.num_workers > 0 {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(config.num_workers);
        if let Err(e) = pool.build_global() {
            warn!("Could not size the worker pool: {e}");
        }
    }

    info!("  data dir     : {}", config.data_dir.display());
    info!("  models dir   : {}", config.models_dir.display());
    info!("  position     : {} (prefix {})", config.position.params, config.position.prefix);
    info!("  floor        : {} (prefix {})", config.floor.params, config.floor.prefix);
    info!("  cv folds     : {}", config.cv_folds);

    let trainer = Trainer::new(config);
    if let Err(e) = run(&trainer, args.mode, args.role) {
        error!("Training run failed: {e}");
        std::process::exit(1);
    }
}

fn run(trainer: &Trainer, mode: Mode, role: Role) -> TrainResult<()> {
    let dataset = trainer.prepare()?;

    let store = MemoryFingerprintStore::new();
    let (written, failed) = dataset.persist(&store);
    if !failed.is_empty() {
        warn!("{} session batch(es) were not stored", failed.len());
    }
    info!("Stored {written} fingerprint rows");

    if matches!(role, Role::Position | Role::All) {
        run_role::<KnnRegressor>(trainer, &dataset, mode)?;
    }
    if matches!(role, Role::Floor | Role::All) {
        run_role::<KnnClassifier>(trainer, &dataset, mode)?;
    }
    Ok(())
}

fn run_role<E: Trainable>(
    trainer: &Trainer,
    dataset: &FingerprintDataset,
    mode: Mode,
) -> TrainResult<()> {
    match mode {
        Mode::Analyze => {
            let report = trainer.analyze::<E>(dataset)?;
            info!(
                "{}: best {} ({}), deployed {} ({})",
                report.role,
                report.search.best_params,
                report.best_metrics,
                report.deployed_params,
                report.deployed_metrics
            );
        }
        Mode::Fit => {
            let artifacts = trainer.fit::<E>(dataset)?;
            let manifest = artifacts.manifest();
            info!(
                "{}: fitted {} on {} samples x {} columns",
                manifest.role, manifest.params, manifest.n_samples, manifest.n_features
            );
        }
    }
    Ok(())
}
