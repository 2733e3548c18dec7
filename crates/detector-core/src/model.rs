//! The convolutional classifier and its persistence.
//!
//! Architecture: four conv+maxpool stages (32/64/128/128 filters, 3×3
//! kernels, 2×2 pooling) into Dense(512) and a single sigmoid output. Values
//! near 1 mean "real", near 0 mean "fake".
//!
//! A saved model is a pair of files sharing one base path: `<base>.json`
//! holds the architecture config, `<base>.mpk` the weight record. Loading
//! requires both; the record format belongs to burn and is opaque here.

use std::path::Path;

use anyhow::Context;
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, Relu};
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use burn::tensor::activation::sigmoid;
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor, TensorData};
use ndarray::Array3;

use crate::error::{DetectorError, DetectorResult};

/// Extension of the weight-record file.
pub const WEIGHTS_EXT: &str = "mpk";
/// Extension of the architecture-config file.
pub const CONFIG_EXT: &str = "json";

type ModelRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// Architecture description. The single source of truth for the input
/// resolution: the preprocessor and the dense-layer width are both derived
/// from `image_size`, so the two cannot silently diverge.
#[derive(Config, Debug)]
pub struct ModelConfig {
    #[config(default = 128)]
    pub image_size: usize,
    #[config(default = 0.5)]
    pub dropout: f64,
    #[config(default = 512)]
    pub hidden_size: usize,
}

impl ModelConfig {
    /// Spatial size of one feature map after the four conv+pool stages.
    pub fn feature_map_size(&self) -> usize {
        let mut size = self.image_size;
        for _ in 0..4 {
            // 3×3 valid convolution then 2×2 pooling
            size = (size - 2) / 2;
        }
        size
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> CurrencyNet<B> {
        let spatial = self.feature_map_size();
        CurrencyNet {
            conv1: Conv2dConfig::new([3, 32], [3, 3]).init(device),
            conv2: Conv2dConfig::new([32, 64], [3, 3]).init(device),
            conv3: Conv2dConfig::new([64, 128], [3, 3]).init(device),
            conv4: Conv2dConfig::new([128, 128], [3, 3]).init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            dropout: DropoutConfig::new(self.dropout).init(),
            fc1: LinearConfig::new(128 * spatial * spatial, self.hidden_size).init(device),
            fc2: LinearConfig::new(self.hidden_size, 1).init(device),
            activation: Relu::new(),
        }
    }
}

/// Binary classifier over normalized currency images.
#[derive(Module, Debug)]
pub struct CurrencyNet<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    conv3: Conv2d<B>,
    conv4: Conv2d<B>,
    pool: MaxPool2d,
    dropout: Dropout,
    fc1: Linear<B>,
    fc2: Linear<B>,
    activation: Relu,
}

impl<B: Backend> CurrencyNet<B> {
    /// Raw logits, shape [batch, 1]. Training pairs this with the logits
    /// form of the binary cross-entropy loss for numeric stability.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.pool.forward(self.activation.forward(self.conv1.forward(images)));
        let x = self.pool.forward(self.activation.forward(self.conv2.forward(x)));
        let x = self.pool.forward(self.activation.forward(self.conv3.forward(x)));
        let x = self.pool.forward(self.activation.forward(self.conv4.forward(x)));
        let x: Tensor<B, 2> = x.flatten(1, 3);
        let x = self.dropout.forward(x);
        let x = self.activation.forward(self.fc1.forward(x));
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
    }

    /// Sigmoid probabilities in [0, 1], shape [batch].
    pub fn forward_probability(&self, images: Tensor<B, 4>) -> Tensor<B, 1> {
        sigmoid(self.forward(images).squeeze(1))
    }

    /// Probability for a single preprocessed image tensor of shape (3, S, S).
    ///
    /// Deterministic for fixed weights and input. The tensor shape must match
    /// the `image_size` this model was built with, which callers guarantee by
    /// constructing the preprocessor from the same config.
    pub fn predict(&self, tensor: &Array3<f32>, device: &B::Device) -> f64 {
        let (channels, height, width) = tensor.dim();
        let data = TensorData::new(
            tensor.iter().copied().collect::<Vec<f32>>(),
            [1, channels, height, width],
        );
        let input = Tensor::<B, 4>::from_data(data, device);
        let probability: f32 = self.forward_probability(input).into_scalar().elem();
        probability as f64
    }

    /// Persist config and weights at `<base>.json` / `<base>.mpk`.
    pub fn save(self, config: &ModelConfig, base: &Path) -> anyhow::Result<()> {
        config
            .save(base.with_extension(CONFIG_EXT))
            .with_context(|| format!("Failed to write model config {}", base.display()))?;
        self.save_file(base.to_path_buf(), &ModelRecorder::new())
            .with_context(|| format!("Failed to write model weights {}", base.display()))?;
        Ok(())
    }

    /// Load a saved model from its base path.
    ///
    /// Fails with `ModelLoad` when either file is missing or the record does
    /// not match the configured architecture.
    pub fn load(base: &Path, device: &B::Device) -> DetectorResult<(Self, ModelConfig)> {
        let weights = base.with_extension(WEIGHTS_EXT);
        if !weights.exists() {
            return Err(DetectorError::ModelLoad(format!(
                "Model file not found at {}",
                weights.display()
            )));
        }

        let config = ModelConfig::load(base.with_extension(CONFIG_EXT))
            .map_err(|e| DetectorError::ModelLoad(format!("Error loading model: {e}")))?;
        let record = ModelRecorder::new()
            .load(weights, device)
            .map_err(|e| DetectorError::ModelLoad(format!("Error loading model: {e}")))?;

        Ok((config.init(device).load_record(record), config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    // Small resolution keeps the conv stack cheap in tests; 48 collapses to
    // a 1×1 feature map.
    fn small_config() -> ModelConfig {
        ModelConfig::new().with_image_size(48)
    }

    fn fixed_input(size: usize) -> Array3<f32> {
        Array3::from_elem((3, size, size), 0.37)
    }

    #[test]
    fn feature_map_size_matches_conv_stack() {
        assert_eq!(ModelConfig::new().feature_map_size(), 6); // 128 input
        assert_eq!(small_config().feature_map_size(), 1);
    }

    #[test]
    fn forward_produces_one_logit_per_image() {
        let device = NdArrayDevice::default();
        let model = small_config().init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 48, 48], &device);
        let logits = model.forward(input);

        assert_eq!(logits.dims(), [2, 1]);
    }

    #[test]
    fn predict_returns_probability_in_unit_range() {
        let device = NdArrayDevice::default();
        let model = small_config().init::<TestBackend>(&device);

        let p = model.predict(&fixed_input(48), &device);

        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn save_then_load_round_trips_predictions() {
        let device = NdArrayDevice::default();
        let config = small_config();
        let model = config.init::<TestBackend>(&device);
        let input = fixed_input(48);

        let before = model.predict(&input, &device);

        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("currency_auth_model");
        model.save(&config, &base).unwrap();

        let (reloaded, loaded_config) =
            CurrencyNet::<TestBackend>::load(&base, &device).unwrap();
        let after = reloaded.predict(&input, &device);

        assert_eq!(loaded_config.image_size, 48);
        assert_eq!(before, after);
    }

    #[test]
    fn load_fails_for_missing_weights() {
        let device = NdArrayDevice::default();
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("no_such_model");

        let err = CurrencyNet::<TestBackend>::load(&base, &device).unwrap_err();

        assert!(matches!(err, DetectorError::ModelLoad(_)));
        assert!(err.to_string().contains("Model file not found"));
    }
}
