//! Prediction outcome types and the verdict mapping.

use serde::Serialize;

use crate::error::DetectorError;

/// A classification verdict with its derived confidence percentage.
///
/// `confidence` measures distance from the 0.5 decision boundary in percent,
/// not a calibrated probability: a raw probability of 0.9 reports 90%
/// confidence in "real", a probability of 0.2 reports 80% confidence in
/// "fake".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub is_real: bool,
    pub confidence: f64,
}

/// The discriminated result of one prediction call.
///
/// Serializes to exactly one of the two wire shapes:
/// `{"is_real": <bool>, "confidence": <float>}` or `{"error": <string>}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Verdict(Verdict),
    Failure { error: String },
}

impl Outcome {
    pub fn failure(err: DetectorError) -> Self {
        Outcome::Failure {
            error: err.to_string(),
        }
    }

    /// Render the outcome as a single compact JSON object.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| String::from(r#"{"error": "Failed to serialize result"}"#))
    }
}

/// Map a raw sigmoid probability to a verdict.
///
/// The model emits values close to 1 for the "real" class and close to 0 for
/// "fake" (label order fixed at training time).
pub fn verdict_from_probability(probability: f64) -> Verdict {
    let is_real = probability > 0.5;
    let confidence = if is_real {
        probability * 100.0
    } else {
        (1.0 - probability) * 100.0
    };
    Verdict {
        is_real,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_probability_maps_to_real() {
        let verdict = verdict_from_probability(0.9);
        assert!(verdict.is_real);
        assert!((verdict.confidence - 90.0).abs() < 1e-9);
    }

    #[test]
    fn low_probability_maps_to_fake() {
        let verdict = verdict_from_probability(0.2);
        assert!(!verdict.is_real);
        assert!((verdict.confidence - 80.0).abs() < 1e-9);
    }

    #[test]
    fn boundary_probability_is_fake() {
        // p > 0.5 strictly, so exactly 0.5 lands on the fake side
        let verdict = verdict_from_probability(0.5);
        assert!(!verdict.is_real);
        assert!((verdict.confidence - 50.0).abs() < 1e-9);
    }

    #[test]
    fn confidence_stays_in_percentage_range() {
        for i in 0..=100 {
            let p = i as f64 / 100.0;
            let verdict = verdict_from_probability(p);
            assert!(verdict.confidence >= 0.0 && verdict.confidence <= 100.0);
            assert_eq!(verdict.is_real, p > 0.5);
        }
    }

    #[test]
    fn confidence_is_monotonic_in_boundary_distance() {
        // Increasing |p - 0.5| never decreases the reported confidence.
        let mut last = 0.0;
        for i in 0..=50 {
            let distance = i as f64 / 100.0;
            let above = verdict_from_probability(0.5 + distance).confidence;
            let below = verdict_from_probability(0.5 - distance).confidence;
            assert!(above >= last);
            assert!(below >= last);
            last = above;
        }
    }

    #[test]
    fn verdict_serializes_to_success_shape() {
        let outcome = Outcome::Verdict(verdict_from_probability(0.9));
        let json: serde_json::Value = serde_json::from_str(&outcome.to_json()).unwrap();
        assert_eq!(json["is_real"], true);
        assert!((json["confidence"].as_f64().unwrap() - 90.0).abs() < 1e-9);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn failure_serializes_to_error_shape() {
        let outcome = Outcome::failure(DetectorError::MissingFile);
        let json: serde_json::Value = serde_json::from_str(&outcome.to_json()).unwrap();
        assert_eq!(json["error"], "Image file not found");
        assert!(json.get("is_real").is_none());
        assert!(json.get("confidence").is_none());
    }
}
