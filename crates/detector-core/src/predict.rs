//! The inference wrapper.
//!
//! A `Predictor` is built exactly once at process start: either the saved
//! model loads and every call runs real inference, or the load fails and the
//! process stays in simulation mode for its lifetime. The load failure is
//! logged to stderr and never surfaced to the caller.
//!
//! Each prediction call is a pure function of its inputs; the only side
//! effect is reading the image file.

use std::path::Path;

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::NdArray;
use rand::Rng;

use crate::error::{DetectorError, DetectorResult};
use crate::model::CurrencyNet;
use crate::preprocess::Preprocessor;
use crate::report::{verdict_from_probability, Outcome, Verdict};

/// CPU backend used for inference.
pub type InferenceBackend = NdArray<f32>;

/// Default base path of the saved model, relative to the working directory.
/// The actual files are `<base>.json` and `<base>.mpk`.
pub const MODEL_BASENAME: &str = "currency_auth_model";

/// Real inference over a loaded model.
pub struct NetworkPredictor {
    model: CurrencyNet<InferenceBackend>,
    preprocessor: Preprocessor,
    device: NdArrayDevice,
}

impl NetworkPredictor {
    pub fn load(model_base: &Path) -> DetectorResult<Self> {
        let device = NdArrayDevice::default();
        let (model, config) = CurrencyNet::load(model_base, &device)?;
        // The preprocessor inherits the resolution the model was trained on.
        let preprocessor = Preprocessor::new(config.image_size as u32);
        Ok(Self {
            model,
            preprocessor,
            device,
        })
    }

    fn probability(&self, image_path: &Path) -> DetectorResult<f64> {
        let tensor = self.preprocessor.tensor_from_path(image_path)?;
        Ok(self.model.predict(&tensor, &self.device))
    }
}

/// Fabricated verdicts for when no trained model is available.
///
/// Output is explicitly random, not a prediction: a uniform-random boolean
/// and a uniform-random confidence in [50, 95].
pub struct SimulatedPredictor;

impl SimulatedPredictor {
    pub fn verdict(&self) -> Verdict {
        let mut rng = rand::thread_rng();
        Verdict {
            is_real: rng.gen_bool(0.5),
            confidence: rng.gen_range(50.0..=95.0),
        }
    }
}

/// The per-process inference context, decided once at startup.
pub enum Predictor {
    Network(NetworkPredictor),
    Simulated(SimulatedPredictor),
}

impl Predictor {
    /// Load the model at `model_base`, falling back permanently to
    /// simulation mode when that fails.
    pub fn initialize(model_base: &Path) -> Self {
        match NetworkPredictor::load(model_base) {
            Ok(predictor) => {
                log::info!("Model loaded successfully");
                Predictor::Network(predictor)
            }
            Err(e) => {
                log::warn!("{e}. Using simulation mode.");
                Predictor::Simulated(SimulatedPredictor)
            }
        }
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self, Predictor::Simulated(_))
    }

    /// Classify one image file.
    ///
    /// Validation runs before the mode dispatch, so simulation mode still
    /// rejects missing or structurally invalid inputs. All failures are
    /// folded into the returned outcome; nothing unwinds.
    pub fn predict(&self, image_path: &Path) -> Outcome {
        if !image_path.exists() {
            return Outcome::failure(DetectorError::MissingFile);
        }
        if let Err(e) = Preprocessor::verify(image_path) {
            return Outcome::failure(e);
        }

        match self {
            Predictor::Network(predictor) => match predictor.probability(image_path) {
                Ok(probability) => Outcome::Verdict(verdict_from_probability(probability)),
                Err(e) => Outcome::failure(DetectorError::Prediction(e.to_string())),
            },
            Predictor::Simulated(simulated) => Outcome::Verdict(simulated.verdict()),
        }
    }
}
