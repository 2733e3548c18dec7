//! Error types for the detection pipeline.

use thiserror::Error;

/// Detection result type
pub type DetectorResult<T> = Result<T, DetectorError>;

/// Failure modes of the inference pipeline.
///
/// Every per-call error is recovered into the JSON `{"error": ...}` payload;
/// none of these unwind past the prediction boundary.
#[derive(Debug, Error)]
pub enum DetectorError {
    /// The image path does not reference an existing file.
    #[error("Image file not found")]
    MissingFile,

    /// The file exists but is not a structurally valid image.
    #[error("Invalid image file: {0}")]
    InvalidImage(String),

    /// Decoding or resizing the image for the model failed.
    #[error("Error preprocessing image: {0}")]
    Preprocessing(String),

    /// The saved model could not be loaded. Non-fatal at startup: the
    /// caller falls back to simulation mode instead of surfacing this.
    #[error("{0}")]
    ModelLoad(String),

    /// Preprocessing or model evaluation failed during a prediction.
    #[error("Prediction failed: {0}")]
    Prediction(String),
}
