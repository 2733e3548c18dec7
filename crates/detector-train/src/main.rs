//! Offline trainer for the currency authenticity model.
//!
//! Usage:
//!   currency-trainer --dataset ./dataset
//!   currency-trainer --dataset ./dataset --epochs 20 --batch-size 16
//!   currency-trainer --init-only
//!   currency-trainer --evaluate currency_auth_model --dataset ./dataset

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use detector_core::model::ModelConfig;
use detector_core::predict::MODEL_BASENAME;
use detector_core::train::{self, TrainingConfig};

#[derive(Parser)]
#[command(name = "currency-trainer")]
#[command(about = "Trains the currency authenticity CNN on a labeled dataset")]
struct Cli {
    /// Dataset root containing train/, valid/ and test/ splits
    #[arg(short, long, default_value = "dataset")]
    dataset: PathBuf,

    /// Base path for the saved model (`<base>.json` + `<base>.mpk`)
    #[arg(short, long, default_value = MODEL_BASENAME)]
    output: PathBuf,

    #[arg(long, default_value = "15")]
    epochs: usize,

    #[arg(long, default_value = "32")]
    batch_size: usize,

    #[arg(long, default_value = "0.001")]
    learning_rate: f64,

    /// Persist a freshly initialized model without training, so the
    /// inference path can be exercised before a real run
    #[arg(long)]
    init_only: bool,

    /// Evaluate a previously saved model on the test split instead of
    /// training
    #[arg(long, value_name = "MODEL_BASE")]
    evaluate: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if cli.init_only {
        eprintln!("[*] Initializing untrained model at {}...", cli.output.display());
        train::init_untrained(&ModelConfig::new(), &cli.output)?;
        eprintln!("[*] Model saved as {}", cli.output.display());
        return Ok(());
    }

    if let Some(base) = cli.evaluate {
        eprintln!("[*] Evaluating {} on the test split...", base.display());
        let accuracy = train::evaluate(&base, &cli.dataset, cli.batch_size)?;
        println!("Test accuracy: {accuracy:.4}");
        return Ok(());
    }

    let config = TrainingConfig::standard(ModelConfig::new())
        .with_epochs(cli.epochs)
        .with_batch_size(cli.batch_size)
        .with_learning_rate(cli.learning_rate);

    eprintln!(
        "[*] Training on {} for {} epochs (batch size {})...",
        cli.dataset.display(),
        config.epochs,
        config.batch_size
    );
    let summary = train::train(&cli.dataset, &config, &cli.output)?;

    eprintln!("[*] Trained on {} images", summary.trained_images);
    println!("Test accuracy: {:.4}", summary.test_accuracy);
    eprintln!("[*] Model saved as {}", cli.output.display());

    Ok(())
}
