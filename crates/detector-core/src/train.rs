//! Offline training of the classifier.
//!
//! One long-running batch job: shuffled, augmented, class-weighted batches
//! over the train split, validation after every epoch on the held-out
//! split, a final evaluation on the test split, then persistence of config
//! and weights. Gradient computation and optimizer state belong to burn.

use std::path::Path;

use anyhow::{Context, Result};
use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use burn::config::Config;
use burn::module::AutodiffModule;
use burn::nn::loss::{BinaryCrossEntropyLoss, BinaryCrossEntropyLossConfig};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::activation::sigmoid;
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Int, Tensor};
use rand::seq::SliceRandom;

use crate::dataset::{count_labels, BatchLoader, DatasetSplits, ImageBatch, LabeledImage};
use crate::model::{CurrencyNet, ModelConfig};
use crate::preprocess::Preprocessor;

/// Backend used for gradient-based training.
pub type TrainingBackend = Autodiff<NdArray<f32>>;

#[derive(Config)]
pub struct TrainingConfig {
    pub model: ModelConfig,
    pub optimizer: AdamConfig,
    #[config(default = 15)]
    pub epochs: usize,
    #[config(default = 32)]
    pub batch_size: usize,
    #[config(default = 1.0e-3)]
    pub learning_rate: f64,
    #[config(default = 42)]
    pub seed: u64,
}

impl TrainingConfig {
    /// Adam with default hyperparameters over the given architecture.
    pub fn standard(model: ModelConfig) -> Self {
        Self::new(model, AdamConfig::new())
    }
}

#[derive(Debug, Clone)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f32,
    pub train_accuracy: f32,
    pub valid_loss: f32,
    pub valid_accuracy: f32,
}

#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub epochs: Vec<EpochMetrics>,
    pub test_accuracy: f32,
    pub trained_images: usize,
}

/// Train a model on `dataset_root` and persist it at `output_base`.
pub fn train(
    dataset_root: &Path,
    config: &TrainingConfig,
    output_base: &Path,
) -> Result<TrainingSummary> {
    let splits = DatasetSplits::discover(dataset_root)?;
    let device = NdArrayDevice::default();
    TrainingBackend::seed(config.seed);

    let counts = count_labels(&splits.train);
    log::info!("Fake images: {}, Real images: {}", counts.fake, counts.real);
    let class_weights = counts.class_weights();
    match &class_weights {
        Some([fake_w, real_w]) => {
            log::info!("Class weights: fake={fake_w:.4}, real={real_w:.4}")
        }
        None => log::warn!("Could not calculate class weights"),
    }

    let loss_config = BinaryCrossEntropyLossConfig::new()
        .with_logits(true)
        .with_weights(class_weights.map(|w| w.to_vec()));
    let train_loss_fn = loss_config.init(&device);
    let eval_loss_fn = loss_config.init(&device);

    let preprocessor = Preprocessor::new(config.model.image_size as u32);
    let train_loader = BatchLoader::new(preprocessor.clone(), config.batch_size, true);
    let eval_loader = BatchLoader::new(preprocessor, config.batch_size, false);

    let mut model = config.model.init::<TrainingBackend>(&device);
    let mut optimizer = config.optimizer.init();
    let mut rng = rand::thread_rng();
    let mut train_items: Vec<LabeledImage> = splits.train.clone();
    let mut history = Vec::with_capacity(config.epochs);

    for epoch in 1..=config.epochs {
        train_items.shuffle(&mut rng);

        let mut epoch_loss = 0.0f32;
        let mut batches = 0usize;
        let mut correct = 0usize;
        let mut seen = 0usize;

        for ImageBatch { images, targets } in
            train_loader.batches::<TrainingBackend>(&train_items, &device)
        {
            let logits: Tensor<TrainingBackend, 1> = model.forward(images).squeeze(1);
            let loss = train_loss_fn.forward(logits.clone(), targets.clone());

            epoch_loss += loss.clone().into_scalar().elem::<f32>();
            batches += 1;
            correct += count_correct(logits, &targets);
            seen += targets.dims()[0];

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(config.learning_rate, model, grads);
        }

        let (valid_loss, valid_accuracy) =
            evaluate_split(&model.valid(), &eval_loss_fn, &eval_loader, &splits.valid, &device);

        let metrics = EpochMetrics {
            epoch,
            train_loss: epoch_loss / batches.max(1) as f32,
            train_accuracy: correct as f32 / seen.max(1) as f32,
            valid_loss,
            valid_accuracy,
        };
        log::info!(
            "epoch {}/{}: train_loss={:.4} train_acc={:.4} valid_loss={:.4} valid_acc={:.4}",
            metrics.epoch,
            config.epochs,
            metrics.train_loss,
            metrics.train_accuracy,
            metrics.valid_loss,
            metrics.valid_accuracy
        );
        history.push(metrics);
    }

    let trained = model.valid();
    let (_, test_accuracy) =
        evaluate_split(&trained, &eval_loss_fn, &eval_loader, &splits.test, &device);
    log::info!("Test accuracy: {test_accuracy:.4}");

    trained
        .save(&config.model, output_base)
        .with_context(|| format!("Failed to save model at {}", output_base.display()))?;

    Ok(TrainingSummary {
        epochs: history,
        test_accuracy,
        trained_images: splits.train.len(),
    })
}

/// Persist a freshly initialized, untrained model so the inference path can
/// be exercised end to end before a real training run.
pub fn init_untrained(config: &ModelConfig, output_base: &Path) -> Result<()> {
    let device = NdArrayDevice::default();
    config
        .init::<NdArray<f32>>(&device)
        .save(config, output_base)
}

/// Evaluate a saved model on the dataset's test split.
pub fn evaluate(model_base: &Path, dataset_root: &Path, batch_size: usize) -> Result<f32> {
    let device = NdArrayDevice::default();
    let (model, config) = CurrencyNet::<NdArray<f32>>::load(model_base, &device)?;
    let splits = DatasetSplits::discover(dataset_root)?;

    let loader = BatchLoader::new(
        Preprocessor::new(config.image_size as u32),
        batch_size,
        false,
    );
    let loss_fn = BinaryCrossEntropyLossConfig::new()
        .with_logits(true)
        .init(&device);

    let (_, accuracy) = evaluate_split(&model, &loss_fn, &loader, &splits.test, &device);
    Ok(accuracy)
}

fn evaluate_split<B: Backend>(
    model: &CurrencyNet<B>,
    loss_fn: &BinaryCrossEntropyLoss<B>,
    loader: &BatchLoader,
    items: &[LabeledImage],
    device: &B::Device,
) -> (f32, f32) {
    let mut total_loss = 0.0f32;
    let mut batches = 0usize;
    let mut correct = 0usize;
    let mut seen = 0usize;

    for ImageBatch { images, targets } in loader.batches::<B>(items, device) {
        let logits: Tensor<B, 1> = model.forward(images).squeeze(1);
        total_loss += loss_fn
            .forward(logits.clone(), targets.clone())
            .into_scalar()
            .elem::<f32>();
        batches += 1;
        correct += count_correct(logits, &targets);
        seen += targets.dims()[0];
    }

    if seen == 0 {
        return (0.0, 0.0);
    }
    (total_loss / batches as f32, correct as f32 / seen as f32)
}

fn count_correct<B: Backend>(logits: Tensor<B, 1>, targets: &Tensor<B, 1, Int>) -> usize {
    let predictions = sigmoid(logits).greater_elem(0.5).int();
    let agreed: i64 = predictions
        .equal(targets.clone())
        .int()
        .sum()
        .into_scalar()
        .elem();
    agreed as usize
}
