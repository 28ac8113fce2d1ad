use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

use super::pipeline::PriceModel;
use crate::data::HousingFeatures;

const BASE_PRICE: f64 = 50_000.0;
const PRICE_PER_SQUARE_FOOT: f64 = 150.0;
const PRICE_PER_BEDROOM: f64 = 20_000.0;
const PRICE_PER_BATHROOM: f64 = 15_000.0;

/// Hand-written estimate used whenever the model cannot answer. The zipcode
/// plays no part in it.
pub fn fallback_price(features: &HousingFeatures) -> f64 {
    BASE_PRICE
        + features.square_feet * PRICE_PER_SQUARE_FOOT
        + features.bedrooms * PRICE_PER_BEDROOM
        + features.bathrooms * PRICE_PER_BATHROOM
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionMode {
    Model,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    /// No model could be loaded.
    ModelUnavailable(String),
    /// A model is loaded but failed on this input.
    InferenceFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Estimate {
    Model(f64),
    Fallback { value: f64, reason: FallbackReason },
}

impl Estimate {
    pub fn fallback(features: &HousingFeatures, reason: FallbackReason) -> Self {
        Estimate::Fallback {
            value: fallback_price(features),
            reason,
        }
    }

    /// Asks `model` for a price and falls back on any error, panic or
    /// non-finite answer.
    pub fn from_model(model: &dyn PriceModel, features: &HousingFeatures) -> Self {
        let outcome = catch_unwind(AssertUnwindSafe(|| model.predict(features)));
        let reason = match outcome {
            Ok(Ok(value)) if value.is_finite() => return Estimate::Model(value),
            Ok(Ok(value)) => format!("model returned non-finite value {}", value),
            Ok(Err(e)) => e.to_string(),
            Err(_) => "model panicked".to_string(),
        };
        Self::fallback(features, FallbackReason::InferenceFailed(reason))
    }

    pub fn value(&self) -> f64 {
        match self {
            Estimate::Model(value) => *value,
            Estimate::Fallback { value, .. } => *value,
        }
    }

    pub fn mode(&self) -> PredictionMode {
        match self {
            Estimate::Model(_) => PredictionMode::Model,
            Estimate::Fallback { .. } => PredictionMode::Fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MLError;

    struct Fixed(f64);

    impl PriceModel for Fixed {
        fn predict(&self, _: &HousingFeatures) -> Result<f64, MLError> {
            Ok(self.0)
        }
    }

    struct Failing;

    impl PriceModel for Failing {
        fn predict(&self, _: &HousingFeatures) -> Result<f64, MLError> {
            Err(MLError::InferenceError("schema mismatch".into()))
        }
    }

    fn house() -> HousingFeatures {
        HousingFeatures {
            bedrooms: 3.0,
            bathrooms: 2.0,
            square_feet: 1600.0,
            zipcode: "23704".into(),
        }
    }

    #[test]
    fn fallback_formula_is_exact() {
        assert_eq!(fallback_price(&house()), 380_000.0);
        assert_eq!(fallback_price(&HousingFeatures::default()), 50_000.0);
    }

    #[test]
    fn fallback_ignores_zipcode() {
        let mut other = house();
        other.zipcode = "94110".into();
        assert_eq!(fallback_price(&house()), fallback_price(&other));
    }

    #[test]
    fn model_value_is_used_when_available() {
        let estimate = Estimate::from_model(&Fixed(123_456.0), &house());
        assert_eq!(estimate, Estimate::Model(123_456.0));
        assert_eq!(estimate.mode(), PredictionMode::Model);
    }

    #[test]
    fn model_error_falls_back_with_reason() {
        let estimate = Estimate::from_model(&Failing, &house());
        assert_eq!(estimate.value(), 380_000.0);
        assert_eq!(estimate.mode(), PredictionMode::Fallback);
        assert!(matches!(
            estimate,
            Estimate::Fallback {
                reason: FallbackReason::InferenceFailed(_),
                ..
            }
        ));
    }

    #[test]
    fn non_finite_model_output_falls_back() {
        let estimate = Estimate::from_model(&Fixed(f64::NAN), &house());
        assert_eq!(estimate.mode(), PredictionMode::Fallback);
        assert_eq!(estimate.value(), 380_000.0);
    }

    #[test]
    fn mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&PredictionMode::Model).unwrap(), "\"model\"");
        assert_eq!(serde_json::to_string(&PredictionMode::Fallback).unwrap(), "\"fallback\"");
    }
}
