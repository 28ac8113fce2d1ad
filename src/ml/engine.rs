use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::pipeline::{HousingPipeline, PriceModel};
use super::predictor::{Estimate, FallbackReason};
use crate::data::HousingFeatures;
use crate::error::MLError;

type Loader = Arc<dyn Fn(&Path) -> Result<Arc<dyn PriceModel>, MLError> + Send + Sync>;

fn load_pipeline(path: &Path) -> Result<Arc<dyn PriceModel>, MLError> {
    let pipeline = HousingPipeline::load(path)?;
    info!(
        "Loaded model from {} ({} zipcode categories)",
        path.display(),
        pipeline.encoder.width()
    );
    Ok(Arc::new(pipeline))
}

/// Owns the model used by the prediction service.
///
/// The artifact is read on the first call that needs it and cached for the
/// life of the engine. Concurrent first callers share a single load. A failed
/// load leaves the engine unloaded, so the next call tries again; once loaded
/// the model is never reloaded, even if the file changes.
pub struct PredictionEngine {
    model_path: PathBuf,
    model: OnceCell<Arc<dyn PriceModel>>,
    loader: Loader,
}

impl PredictionEngine {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            model: OnceCell::new(),
            loader: Arc::new(load_pipeline),
        }
    }

    /// Engine that starts out loaded with `model`; `model_path` is only reported.
    pub fn with_model(model_path: impl Into<PathBuf>, model: Arc<dyn PriceModel>) -> Self {
        Self {
            model_path: model_path.into(),
            model: OnceCell::new_with(Some(model)),
            loader: Arc::new(load_pipeline),
        }
    }

    /// Unloaded engine that reads its model through `loader` instead of the
    /// artifact format.
    pub fn with_loader<F>(model_path: impl Into<PathBuf>, loader: F) -> Self
    where
        F: Fn(&Path) -> Result<Arc<dyn PriceModel>, MLError> + Send + Sync + 'static,
    {
        Self {
            model_path: model_path.into(),
            model: OnceCell::new(),
            loader: Arc::new(loader),
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn model_exists(&self) -> bool {
        self.model_path.exists()
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    pub async fn ensure_loaded(&self) -> Result<Arc<dyn PriceModel>, MLError> {
        let model = self
            .model
            .get_or_try_init(|| async {
                let path = self.model_path.clone();
                let loader = Arc::clone(&self.loader);
                let model = tokio::task::spawn_blocking(move || loader(&path))
                    .await
                    .map_err(|e| MLError::ModelLoadError(e.to_string()))??;
                Ok::<Arc<dyn PriceModel>, MLError>(model)
            })
            .await?;
        Ok(model.clone())
    }

    pub async fn estimate(&self, features: &HousingFeatures) -> Estimate {
        let estimate = match self.ensure_loaded().await {
            Ok(model) => Estimate::from_model(model.as_ref(), features),
            Err(e) => Estimate::fallback(features, FallbackReason::ModelUnavailable(e.to_string())),
        };

        match &estimate {
            Estimate::Fallback {
                reason: FallbackReason::ModelUnavailable(why),
                ..
            } => debug!("No model available, using fallback: {}", why),
            Estimate::Fallback {
                reason: FallbackReason::InferenceFailed(why),
                ..
            } => warn!("Model inference failed, using fallback: {}", why),
            Estimate::Model(_) => {}
        }
        estimate
    }
}
