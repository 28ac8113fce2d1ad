use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::data::HousingFeatures;
use crate::error::InputError;
use crate::ml::{fallback_price, Estimate, PredictionMode};

pub const BAD_INPUT_MESSAGE: &str = "Bad input types";

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Body of `POST /predict`.
///
/// Every field is optional. A field that is absent takes its default (0 for
/// numbers, empty for the zipcode); a field that is present, including an
/// explicit `null`, must coerce.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictRequest {
    #[serde(default, deserialize_with = "present")]
    pub bedrooms: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub bathrooms: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub square_feet: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub zipcode: Option<Value>,
}

impl PredictRequest {
    /// Anything that is not a JSON object reads as an empty request.
    pub fn from_body(body: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(body) {
            Ok(value @ Value::Object(_)) => serde_json::from_value(value).unwrap_or_default(),
            _ => Self::default(),
        }
    }

    /// Coerces the fields into features. Every number must be finite and the
    /// fallback estimate for them must be finite too, so any answer the
    /// service gives is a JSON number.
    pub fn validate(&self) -> Result<HousingFeatures, InputError> {
        let features = HousingFeatures {
            bedrooms: coerce_number("bedrooms", self.bedrooms.as_ref())?,
            bathrooms: coerce_number("bathrooms", self.bathrooms.as_ref())?,
            square_feet: coerce_number("square_feet", self.square_feet.as_ref())?,
            zipcode: coerce_text(self.zipcode.as_ref()),
        };
        if !fallback_price(&features).is_finite() {
            return Err(InputError::OutOfRange);
        }
        Ok(features)
    }
}

fn coerce_number(field: &'static str, value: Option<&Value>) -> Result<f64, InputError> {
    let value = match value {
        None => return Ok(0.0),
        Some(value) => value,
    };
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    };
    number
        .filter(|n| n.is_finite())
        .ok_or(InputError::NotNumeric(field))
}

fn coerce_text(value: Option<&Value>) -> String {
    match value {
        None => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) => "None".to_string(),
        Some(Value::Bool(true)) => "True".to_string(),
        Some(Value::Bool(false)) => "False".to_string(),
        Some(other) => other.to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    pub prediction: f64,
    pub mode: PredictionMode,
}

impl From<&Estimate> for PredictResponse {
    fn from(estimate: &Estimate) -> Self {
        Self {
            prediction: estimate.value(),
            mode: estimate.mode(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn bad_input() -> Self {
        Self {
            error: BAD_INPUT_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutesResponse {
    pub running_file: String,
    pub cwd: String,
    pub model_path: String,
    pub model_exists: bool,
    pub routes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<HousingFeatures, InputError> {
        PredictRequest::from_body(body.as_bytes()).validate()
    }

    #[test]
    fn full_request_coerces() {
        let features =
            parse(r#"{"bedrooms":3,"bathrooms":2.5,"square_feet":"1600","zipcode":"23704"}"#).unwrap();
        assert_eq!(
            features,
            HousingFeatures {
                bedrooms: 3.0,
                bathrooms: 2.5,
                square_feet: 1600.0,
                zipcode: "23704".into(),
            }
        );
    }

    #[test]
    fn missing_fields_default() {
        assert_eq!(parse("{}").unwrap(), HousingFeatures::default());
    }

    #[test]
    fn unparsable_or_non_object_body_is_empty() {
        assert_eq!(parse("").unwrap(), HousingFeatures::default());
        assert_eq!(parse("{not json").unwrap(), HousingFeatures::default());
        assert_eq!(parse("[1, 2]").unwrap(), HousingFeatures::default());
    }

    #[test]
    fn non_numeric_string_is_rejected() {
        assert_eq!(parse(r#"{"bedrooms":"abc"}"#), Err(InputError::NotNumeric("bedrooms")));
    }

    #[test]
    fn explicit_null_is_rejected() {
        assert_eq!(parse(r#"{"square_feet":null}"#), Err(InputError::NotNumeric("square_feet")));
    }

    #[test]
    fn booleans_and_padded_strings_coerce() {
        let features = parse(r#"{"bedrooms":true,"bathrooms":" 2 "}"#).unwrap();
        assert_eq!(features.bedrooms, 1.0);
        assert_eq!(features.bathrooms, 2.0);
    }

    #[test]
    fn numeric_zipcode_is_stringified() {
        assert_eq!(parse(r#"{"zipcode":23704}"#).unwrap().zipcode, "23704");
        assert_eq!(parse(r#"{"zipcode":" 23704 "}"#).unwrap().zipcode, " 23704 ");
    }

    #[test]
    fn null_and_boolean_zipcodes_use_python_spelling() {
        assert_eq!(parse(r#"{"zipcode":null}"#).unwrap().zipcode, "None");
        assert_eq!(parse(r#"{"zipcode":true}"#).unwrap().zipcode, "True");
        assert_eq!(parse(r#"{"zipcode":false}"#).unwrap().zipcode, "False");
    }

    #[test]
    fn non_finite_strings_are_rejected() {
        assert_eq!(parse(r#"{"bedrooms":"nan"}"#), Err(InputError::NotNumeric("bedrooms")));
        assert_eq!(parse(r#"{"bathrooms":"inf"}"#), Err(InputError::NotNumeric("bathrooms")));
        assert_eq!(parse(r#"{"square_feet":"-Infinity"}"#), Err(InputError::NotNumeric("square_feet")));
    }

    #[test]
    fn overflowing_estimate_is_rejected() {
        assert_eq!(parse(r#"{"square_feet":1e308}"#), Err(InputError::OutOfRange));
        assert!(parse(r#"{"square_feet":1e300}"#).is_ok());
    }

    #[test]
    fn response_shape() {
        let body = serde_json::to_value(PredictResponse::from(&Estimate::Model(1.5))).unwrap();
        assert_eq!(body, serde_json::json!({"prediction": 1.5, "mode": "model"}));
    }
}
