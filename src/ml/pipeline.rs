use std::fs;
use std::path::Path;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::models::{OneHotEncoder, SgdConfig, SgdRegressor};
use crate::data::{HousingFeatures, HousingRecord, CATEGORICAL_FEATURES, NUMERIC_FEATURES};
use crate::error::MLError;

/// Anything that can price a single house.
pub trait PriceModel: Send + Sync {
    fn predict(&self, features: &HousingFeatures) -> Result<f64, MLError>;
}

/// Fitted feature transform plus regressor, persisted as one artifact.
///
/// Numeric features pass through unchanged and are followed by the one-hot
/// indicators of the zipcode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HousingPipeline {
    pub numeric_features: Vec<String>,
    pub categorical_features: Vec<String>,
    pub encoder: OneHotEncoder,
    pub regressor: SgdRegressor,
}

impl HousingPipeline {
    pub fn fit(records: &[HousingRecord], config: &SgdConfig) -> Result<Self, MLError> {
        if records.is_empty() {
            return Err(MLError::TrainingError("no training rows".into()));
        }

        let encoder = OneHotEncoder::fit(records.iter().map(|r| r.zipcode.as_str()));
        let features: Vec<HousingFeatures> = records.iter().map(HousingRecord::features).collect();
        let x = design_matrix(&encoder, &features);
        let y = DVector::from_iterator(records.len(), records.iter().map(|r| r.price));

        debug!(
            "Fitting on {} rows, {} features ({} zipcode categories)",
            x.nrows(),
            x.ncols(),
            encoder.width()
        );
        let regressor = SgdRegressor::fit(config, &x, &y)?;

        Ok(Self {
            numeric_features: NUMERIC_FEATURES.iter().map(|s| s.to_string()).collect(),
            categorical_features: CATEGORICAL_FEATURES.iter().map(|s| s.to_string()).collect(),
            encoder,
            regressor,
        })
    }

    pub fn transform(&self, rows: &[HousingFeatures]) -> DMatrix<f64> {
        design_matrix(&self.encoder, rows)
    }

    pub fn predict_batch(&self, rows: &[HousingFeatures]) -> Result<DVector<f64>, MLError> {
        self.regressor.predict(&self.transform(rows))
    }

    pub fn to_json(&self) -> Result<String, MLError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, MLError> {
        let pipeline: Self = serde_json::from_str(json)
            .map_err(|e| MLError::ModelLoadError(format!("invalid model artifact: {}", e)))?;
        let expected = NUMERIC_FEATURES.len() + pipeline.encoder.width();
        if pipeline.regressor.n_features() != expected {
            return Err(MLError::ModelLoadError(format!(
                "artifact has {} coefficients for {} features",
                pipeline.regressor.n_features(),
                expected
            )));
        }
        Ok(pipeline)
    }

    pub fn save(&self, path: &Path) -> Result<(), MLError> {
        fs::write(path, self.to_json()?)?;
        info!("Saved model to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, MLError> {
        if !path.exists() {
            return Err(MLError::ModelNotFound(path.to_path_buf()));
        }
        let json = fs::read_to_string(path)
            .map_err(|e| MLError::ModelLoadError(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }
}

impl PriceModel for HousingPipeline {
    fn predict(&self, features: &HousingFeatures) -> Result<f64, MLError> {
        let preds = self.predict_batch(std::slice::from_ref(features))?;
        preds
            .get(0)
            .copied()
            .ok_or_else(|| MLError::InferenceError("empty prediction".into()))
    }
}

fn design_matrix(encoder: &OneHotEncoder, rows: &[HousingFeatures]) -> DMatrix<f64> {
    let numeric = NUMERIC_FEATURES.len();
    let mut x = DMatrix::zeros(rows.len(), numeric + encoder.width());
    for (i, row) in rows.iter().enumerate() {
        for (j, value) in row.numeric().into_iter().enumerate() {
            x[(i, j)] = value;
        }
        if let Some(cat) = encoder.position(&row.zipcode) {
            x[(i, numeric + cat)] = 1.0;
        }
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(price: f64, sqft: f64, zipcode: &str) -> HousingRecord {
        HousingRecord {
            price,
            bedrooms: 3.0,
            bathrooms: 2.0,
            square_feet: sqft,
            zipcode: zipcode.to_string(),
        }
    }

    fn fitted() -> HousingPipeline {
        let records: Vec<HousingRecord> = (0..30)
            .map(|i| {
                let sqft = 800.0 + 60.0 * i as f64;
                let zip = ["10001", "23704", "94110"][i % 3];
                let premium = if zip == "94110" { 80_000.0 } else { 0.0 };
                record(40_000.0 + 150.0 * sqft + premium, sqft, zip)
            })
            .collect();
        HousingPipeline::fit(&records, &SgdConfig::default()).unwrap()
    }

    #[test]
    fn design_matrix_layout() {
        let pipeline = fitted();
        let rows = vec![HousingFeatures {
            bedrooms: 3.0,
            bathrooms: 2.5,
            square_feet: 1600.0,
            zipcode: "23704".into(),
        }];
        let x = pipeline.transform(&rows);
        assert_eq!(x.ncols(), 6);
        let row: Vec<f64> = x.row(0).iter().copied().collect();
        assert_eq!(row, vec![3.0, 2.5, 1600.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn unknown_zipcode_still_predicts() {
        let pipeline = fitted();
        let features = HousingFeatures {
            bedrooms: 3.0,
            bathrooms: 2.0,
            square_feet: 1500.0,
            zipcode: "00000".into(),
        };
        assert!(pipeline.predict(&features).unwrap().is_finite());
    }

    #[test]
    fn json_artifact_reloads_identically() {
        let pipeline = fitted();
        let reloaded = HousingPipeline::from_json(&pipeline.to_json().unwrap()).unwrap();
        let features = HousingFeatures {
            bedrooms: 2.0,
            bathrooms: 1.0,
            square_feet: 1200.0,
            zipcode: "94110".into(),
        };
        assert_eq!(pipeline.predict(&features).unwrap(), reloaded.predict(&features).unwrap());
    }

    #[test]
    fn corrupt_artifact_is_a_load_error() {
        assert!(matches!(
            HousingPipeline::from_json("not json"),
            Err(MLError::ModelLoadError(_))
        ));
    }

    #[test]
    fn absent_artifact_is_model_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.joblib");
        match HousingPipeline::load(&path) {
            Err(MLError::ModelNotFound(p)) => assert_eq!(p, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
