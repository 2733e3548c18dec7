//! detector-core — shared library for currency authenticity detection.
//!
//! Provides image preprocessing, the convolutional classifier, offline
//! training, and the inference wrapper used by the CLI frontends.

pub mod augment;
pub mod dataset;
pub mod error;
pub mod model;
pub mod predict;
pub mod preprocess;
pub mod report;
pub mod train;

pub use error::{DetectorError, DetectorResult};
pub use predict::{Predictor, MODEL_BASENAME};
pub use report::{Outcome, Verdict};
