//! CLI entry point for training, forecasting and configuration suggestions.

use anyhow::{Context, Result};
use atmo_learning::{
    AppConfig, ConfigHint, FeatureRow, PredictionLog, PredictionRecord, ProgressUpdate, SplitConfig,
    Trainer, TrainingConfig, forecast, suggest_config,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Weather model training, forecasting and cluster configuration suggestions",
    long_about = "Train weather models, forecast rain and temperature, and suggest cluster \
                  configurations from a profiling model.\n\n\
                  ENVIRONMENT VARIABLES (also read from .env):\n  \
                  ATMO_MODELS_DIR       Artifact store root (default: models)\n  \
                  ATMO_DATA_DIR         Dataset directory (default: data)\n  \
                  ATMO_PREDICTION_LOG   Prediction log (default: <data dir>/predictions.jsonl)\n\n\
                  EXAMPLES:\n  \
                  atmo train -i data/weather.csv\n  \
                  atmo forecast --features '{\"humidity\": 88, \"pressure_hpa\": 1002}'\n  \
                  atmo train-optimizer -i data/profiling.csv\n  \
                  atmo suggest --mem-gb 64"
)]
struct Args {
    /// Artifact store root (overrides ATMO_MODELS_DIR)
    #[arg(long, global = true)]
    models_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train the rain classifiers and temperature regressors
    Train {
        /// Weather CSV (default: <data dir>/weather.csv)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Seed for splitting and stochastic estimators
        #[arg(long)]
        seed: Option<u64>,

        /// Number of random forest trees
        #[arg(long)]
        rf_trees: Option<usize>,
    },

    /// Train the execution-time model used by `suggest`
    TrainOptimizer {
        /// Profiling CSV (default: <data dir>/profiling.csv)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Predict rain and temperature for one feature row
    Forecast {
        /// Feature row as a JSON object
        #[arg(short, long, default_value = "{}")]
        features: String,

        /// Do not append the prediction to the log
        #[arg(long)]
        no_record: bool,
    },

    /// Suggest the node/ppn configuration with the lowest predicted runtime
    Suggest {
        #[arg(long, default_value_t = ConfigHint::default().cpu_util)]
        cpu_util: f64,

        #[arg(long, default_value_t = ConfigHint::default().mem_gb)]
        mem_gb: f64,

        #[arg(long, default_value_t = ConfigHint::default().io_throughput_mb_s)]
        io_throughput_mb_s: f64,
    },
}

/// Initialize the tracing subscriber. Logs go to stderr; stdout carries JSON.
fn init_logging(level: &str, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn log_progress(update: ProgressUpdate) {
    info!(
        "[{}] {:.0}% {}",
        update.stage.as_str(),
        update.progress * 100.0,
        update.message
    );
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.quiet);

    let app = AppConfig::from_env();
    let models_dir = args.models_dir.clone().unwrap_or_else(|| app.models_dir.clone());

    match args.command {
        Command::Train {
            input,
            seed,
            rf_trees,
        } => {
            let input = input.unwrap_or_else(|| app.data_dir.join("weather.csv"));
            let mut builder = TrainingConfig::builder();
            if let Some(seed) = seed {
                let split = SplitConfig {
                    random_state: seed,
                    ..Default::default()
                };
                builder = builder.random_seed(seed).split(split);
            }
            if let Some(n) = rf_trees {
                builder = builder.rf_trees(n);
            }

            let trainer = Trainer::builder()
                .config(builder.build()?)
                .on_progress(log_progress)
                .build()?;
            let report = trainer
                .train(&input, &models_dir)
                .with_context(|| format!("training on {} failed", input.display()))?;
            print_json(&report)
        }

        Command::TrainOptimizer { input } => {
            let input = input.unwrap_or_else(|| app.data_dir.join("profiling.csv"));
            let report = Trainer::builder()
                .on_progress(log_progress)
                .build()?
                .train_optimizer(&input, &models_dir)
                .with_context(|| format!("optimizer training on {} failed", input.display()))?;
            print_json(&report)
        }

        Command::Forecast {
            features,
            no_record,
        } => {
            let row: FeatureRow =
                serde_json::from_str(&features).context("--features must be a JSON object")?;
            let result = forecast(&row, &models_dir)?;
            if !no_record {
                let mut log = PredictionLog::open(&app.prediction_log)?;
                log.append(&PredictionRecord::new(&row, &result)?)?;
                info!("Recorded prediction in {}", log.path().display());
            }
            print_json(&result)
        }

        Command::Suggest {
            cpu_util,
            mem_gb,
            io_throughput_mb_s,
        } => {
            let hint = ConfigHint {
                cpu_util,
                mem_gb,
                io_throughput_mb_s,
            };
            let suggestion = match suggest_config(&models_dir, &hint) {
                Err(e) if e.is_not_found() => {
                    return Err(anyhow::Error::new(e)
                        .context("no optimizer model; run `atmo train-optimizer` first"));
                }
                other => other?,
            };
            print_json(&suggestion)
        }
    }
}
