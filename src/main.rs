use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use hsi_classifier::data::loader::load_file;
use hsi_classifier::evaluation::{EvaluationReport, PredictionRecord};
use hsi_classifier::{export, pipeline, PipelineConfig};

/// Hyperspectral classification data pipeline.
///
/// `prepare` cleans and splits a raw pixel table into tensors for training;
/// `evaluate` scores the trained model's per-pixel predictions.
#[derive(Parser)]
#[command(name = "hsi-classifier")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean, split and export a raw pixel table
    ///
    /// Examples:
    ///   hsi-classifier prepare --input samples.csv --output prepared/
    ///   hsi-classifier prepare --input samples.parquet --output prepared/ --config run.json
    Prepare {
        /// Raw table (.csv, .parquet or .json)
        #[arg(short, long)]
        input: PathBuf,
        /// Directory receiving tensors, vocabulary and index files
        #[arg(short, long)]
        output: PathBuf,
        /// Pipeline configuration (JSON); defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Score per-pixel predictions for the test partition
    Evaluate {
        /// Directory written by `prepare`
        #[arg(short, long)]
        prepared: PathBuf,
        /// Predicted class codes (.csv with a `predicted` column, or .npy)
        #[arg(long)]
        predictions: PathBuf,
        /// Where to write the JSON report
        #[arg(short, long, default_value = "evaluation.json")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Commands::Prepare {
            input,
            output,
            config,
        } => run_prepare(input, output, config),
        Commands::Evaluate {
            prepared,
            predictions,
            output,
        } => run_evaluate(prepared, predictions, output),
    }
}

fn run_prepare(input: PathBuf, output: PathBuf, config: Option<PathBuf>) -> Result<()> {
    let config = match config {
        Some(path) => PipelineConfig::load_json(&path)?,
        None => PipelineConfig::default(),
    };

    let raw = load_file(&input, &config.data)
        .with_context(|| format!("loading {}", input.display()))?;
    let prepared = pipeline::prepare(raw, &config)?;
    export::write_prepared(&output, &prepared, &config)?;

    info!(
        "train {:?}, test {:?}, {} classes",
        prepared.tensors.features_train.shape(),
        prepared.tensors.features_test.shape(),
        prepared.vocabulary.num_classes()
    );
    Ok(())
}

fn run_evaluate(prepared: PathBuf, predictions: PathBuf, output: PathBuf) -> Result<()> {
    let vocabulary = export::read_vocabulary(&prepared)?;
    let index = export::read_test_index(&prepared, &vocabulary)?;
    let manifest = export::read_manifest(&prepared)?;
    export::check_manifest(&manifest, &vocabulary, &index).with_context(|| {
        format!("{} is not a consistent prepared directory", prepared.display())
    })?;
    let predicted = export::read_predictions(&predictions, vocabulary.num_classes())
        .with_context(|| format!("reading {}", predictions.display()))?;

    let records = PredictionRecord::align(
        index.iter().map(|row| (row.group_id, row.label_encoded)),
        &predicted,
    )?;
    let report = EvaluationReport::build(&records, &vocabulary)?;
    report.log_summary();

    export::write_json(&output, &report)?;
    info!("wrote report to {}", output.display());
    Ok(())
}
