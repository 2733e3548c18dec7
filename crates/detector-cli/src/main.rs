//! Currency authenticity checker CLI.
//!
//! Usage:
//!   currency-detector note.png
//!   currency-detector note.png --model models/currency_auth_model
//!
//! Prints exactly one JSON object to stdout: either
//! `{"is_real": <bool>, "confidence": <float>}` or `{"error": <string>}`.
//! Diagnostics go to stderr. Only a missing path argument exits nonzero;
//! prediction errors exit 0 and are distinguished by the JSON shape.

use std::path::PathBuf;

use clap::Parser;

use detector_core::predict::{Predictor, MODEL_BASENAME};

#[derive(Parser)]
#[command(name = "currency-detector")]
#[command(about = "CNN-based currency authenticity checker")]
struct Cli {
    /// Path to the currency image to classify
    image: Option<PathBuf>,

    /// Base path of the saved model (`<base>.json` + `<base>.mpk`)
    #[arg(short, long, default_value = MODEL_BASENAME)]
    model: PathBuf,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let Some(image) = cli.image else {
        println!("{}", serde_json::json!({"error": "No image path provided"}));
        std::process::exit(1);
    };

    eprintln!("[*] Loading model from {}...", cli.model.display());
    let predictor = Predictor::initialize(&cli.model);

    let outcome = predictor.predict(&image);
    println!("{}", outcome.to_json());
}
