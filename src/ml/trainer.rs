use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use super::models::SgdConfig;
use super::pipeline::HousingPipeline;
use crate::config::TrainingConfig;
use crate::data::{
    load_training_records, HousingFeatures, HousingRecord, CATEGORICAL_FEATURES, NUMERIC_FEATURES,
    TARGET,
};
use crate::error::MLError;

/// Training provenance written next to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub features_num: Vec<String>,
    pub features_cat: Vec<String>,
    pub target: String,
    pub rows: usize,
    pub mae: f64,
    pub rmse: f64,
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub metadata: Metadata,
    pub model_path: PathBuf,
    pub metadata_path: PathBuf,
    pub epochs: usize,
}

/// Shuffles with a fixed seed and holds out `ceil(test_size * n)` items.
/// Returns `(train, test)`.
pub fn train_test_split<T: Clone>(
    items: &[T],
    test_size: f64,
    seed: u64,
) -> Result<(Vec<T>, Vec<T>), MLError> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(MLError::TrainingError(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }
    let n = items.len();
    let n_test = (test_size * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(MLError::TrainingError(format!(
            "cannot split {} rows with test_size {}",
            n, test_size
        )));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));

    let test = order[..n_test].iter().map(|&i| items[i].clone()).collect();
    let train = order[n_test..].iter().map(|&i| items[i].clone()).collect();
    Ok((train, test))
}

pub fn mean_absolute_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).abs())
        .collect::<Vec<f64>>()
        .mean()
}

pub fn root_mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .collect::<Vec<f64>>()
        .mean()
        .sqrt()
}

/// Splits, fits and scores. Metrics are informational and never reject a fit.
pub fn fit_and_evaluate(
    records: &[HousingRecord],
    config: &TrainingConfig,
) -> Result<(HousingPipeline, Metadata), MLError> {
    if records.is_empty() {
        return Err(MLError::TrainingError("dataset has no rows".into()));
    }
    let (train, test) = train_test_split(records, config.test_size, config.seed)?;
    info!("Training on {} rows, evaluating on {}", train.len(), test.len());

    let pipeline = HousingPipeline::fit(&train, &SgdConfig::from(config))?;

    let test_features: Vec<HousingFeatures> = test.iter().map(HousingRecord::features).collect();
    let preds = pipeline.predict_batch(&test_features)?;
    let y_pred: Vec<f64> = preds.iter().copied().collect();
    let y_true: Vec<f64> = test.iter().map(|r| r.price).collect();

    let metadata = Metadata {
        features_num: NUMERIC_FEATURES.iter().map(|s| s.to_string()).collect(),
        features_cat: CATEGORICAL_FEATURES.iter().map(|s| s.to_string()).collect(),
        target: TARGET.to_string(),
        rows: records.len(),
        mae: mean_absolute_error(&y_true, &y_pred),
        rmse: root_mean_squared_error(&y_true, &y_pred),
    };
    Ok((pipeline, metadata))
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    Ok(())
}

/// Writes `contents` to a temporary file beside `path`.
fn stage(path: &Path, contents: &str) -> Result<NamedTempFile> {
    ensure_parent(path)?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temporary file in {}", dir.display()))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("staging {}", path.display()))?;
    Ok(file)
}

/// Moves both staged artifacts into place. If the metadata cannot be moved the
/// previous model file is put back.
fn commit(
    model: NamedTempFile,
    model_path: &Path,
    metadata: NamedTempFile,
    metadata_path: &Path,
) -> Result<()> {
    let previous_model = fs::read(model_path).ok();
    model
        .persist(model_path)
        .with_context(|| format!("writing model to {}", model_path.display()))?;

    if let Err(e) = metadata.persist(metadata_path) {
        let restored = match previous_model {
            Some(bytes) => fs::write(model_path, bytes),
            None => fs::remove_file(model_path),
        };
        if let Err(restore) = restored {
            warn!("Could not restore {}: {}", model_path.display(), restore);
        }
        return Err(e.error)
            .with_context(|| format!("writing metadata to {}", metadata_path.display()));
    }
    Ok(())
}

/// Reads `raw_path`, fits the pipeline and writes the model and metadata
/// artifacts. Both artifacts are staged before either is moved into place, so
/// a failing run leaves previous artifacts in place.
pub fn train(raw_path: &Path, config: &TrainingConfig) -> Result<TrainingReport> {
    info!("Loading training data from {}", raw_path.display());
    let records = load_training_records(raw_path)
        .with_context(|| format!("loading training data from {}", raw_path.display()))?;

    let (pipeline, metadata) = fit_and_evaluate(&records, config)?;

    let model_json = pipeline.to_json()?;
    let metadata_json = serde_json::to_string_pretty(&metadata)?;

    let staged_model = stage(&config.model_path, &model_json)?;
    let staged_metadata = stage(&config.metadata_path, &metadata_json)?;
    commit(staged_model, &config.model_path, staged_metadata, &config.metadata_path)?;

    info!("Saved: {}", config.model_path.display());
    info!("Saved: {}", config.metadata_path.display());
    info!("MAE: {}", metadata.mae);
    info!("RMSE: {}", metadata.rmse);

    Ok(TrainingReport {
        metadata,
        model_path: config.model_path.clone(),
        metadata_path: config.metadata_path.clone(),
        epochs: pipeline.regressor.n_iter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_sizes_follow_ceiling_rule() {
        let items: Vec<usize> = (0..11).collect();
        let (train, test) = train_test_split(&items, 0.2, 42).unwrap();
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 8);

        let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, items);
    }

    #[test]
    fn split_is_reproducible_for_a_seed() {
        let items: Vec<usize> = (0..50).collect();
        assert_eq!(
            train_test_split(&items, 0.2, 42).unwrap(),
            train_test_split(&items, 0.2, 42).unwrap()
        );
        assert_ne!(
            train_test_split(&items, 0.2, 42).unwrap(),
            train_test_split(&items, 0.2, 7).unwrap()
        );
    }

    #[test]
    fn split_rejects_too_few_rows() {
        assert!(train_test_split(&[1.0], 0.2, 42).is_err());
        assert!(train_test_split::<f64>(&[], 0.2, 42).is_err());
        assert!(train_test_split(&[1.0, 2.0], 0.2, 42).is_ok());
    }

    #[test]
    fn error_metrics() {
        let y_true = [100.0, 200.0, 300.0, 400.0];
        let y_pred = [110.0, 190.0, 330.0, 400.0];
        assert!((mean_absolute_error(&y_true, &y_pred) - 12.5).abs() < 1e-9);
        let expected_rmse = ((100.0 + 100.0 + 900.0) / 4.0_f64).sqrt();
        assert!((root_mean_squared_error(&y_true, &y_pred) - expected_rmse).abs() < 1e-9);
    }

    #[test]
    fn empty_dataset_is_rejected() {
        assert!(fit_and_evaluate(&[], &TrainingConfig::default()).is_err());
    }
}
