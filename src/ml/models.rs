use std::collections::BTreeSet;

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::TrainingConfig;
use crate::error::MLError;

const DLOSS_CLIP: f64 = 1e12;

/// One-hot encoding of a single categorical column.
///
/// Categories are the sorted distinct training values. A value that was never
/// seen during fitting encodes as all zeros instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    categories: Vec<String>,
}

impl OneHotEncoder {
    pub fn fit<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let categories: BTreeSet<&str> = values.into_iter().collect();
        Self {
            categories: categories.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn width(&self) -> usize {
        self.categories.len()
    }

    /// Index of the active indicator, `None` for unknown categories.
    pub fn position(&self, value: &str) -> Option<usize> {
        self.categories
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
    }

    pub fn encode(&self, value: &str) -> Vec<f64> {
        let mut out = vec![0.0; self.width()];
        if let Some(idx) = self.position(value) {
            out[idx] = 1.0;
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SgdConfig {
    pub eta0: f64,
    /// Exponent of the inverse-scaling learning rate `eta0 / t^power_t`.
    pub power_t: f64,
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub n_iter_no_change: usize,
    pub seed: u64,
}

impl Default for SgdConfig {
    fn default() -> Self {
        Self::from(&TrainingConfig::default())
    }
}

impl From<&TrainingConfig> for SgdConfig {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            eta0: config.eta0,
            power_t: config.power_t,
            alpha: config.alpha,
            max_iter: config.max_iter,
            tol: config.tol,
            n_iter_no_change: config.n_iter_no_change,
            seed: config.seed,
        }
    }
}

/// Column centering and scaling used while fitting.
#[derive(Debug, Clone)]
struct Standardizer {
    means: DVector<f64>,
    scales: DVector<f64>,
}

impl Standardizer {
    fn fit(x: &DMatrix<f64>) -> Self {
        let means = DVector::from_fn(x.ncols(), |j, _| x.column(j).mean());
        let scales = DVector::from_fn(x.ncols(), |j, _| {
            let sd = x.column(j).variance().sqrt();
            if sd > f64::EPSILON { sd } else { 1.0 }
        });
        Self { means, scales }
    }

    fn transform(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| (x[(i, j)] - self.means[j]) / self.scales[j])
    }
}

/// Linear regressor fit by stochastic gradient descent on squared error with
/// an L2 penalty and an inverse-scaling learning rate.
///
/// Inputs and target are standardized during fitting and the learned weights
/// are mapped back, so `coefficients` and `intercept` apply to raw features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SgdRegressor {
    pub coefficients: DVector<f64>,
    pub intercept: f64,
    pub n_iter: usize,
}

impl SgdRegressor {
    pub fn fit(config: &SgdConfig, x: &DMatrix<f64>, y: &DVector<f64>) -> Result<Self, MLError> {
        let n = x.nrows();
        let p = x.ncols();
        if n == 0 {
            return Err(MLError::TrainingError("empty training set".into()));
        }
        if y.len() != n {
            return Err(MLError::TrainingError(format!(
                "dimension mismatch: {} rows but {} targets",
                n,
                y.len()
            )));
        }

        let x_scaler = Standardizer::fit(x);
        let z = x_scaler.transform(x);
        let y_mean = y.mean();
        let y_scale = match y.variance().sqrt() {
            sd if sd > f64::EPSILON => sd,
            _ => 1.0,
        };
        let t_y = y.map(|v| (v - y_mean) / y_scale);

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut indices: Vec<usize> = (0..n).collect();
        let mut w = DVector::<f64>::zeros(p);
        let mut b = 0.0;
        let mut t = 1.0_f64;
        let mut best_loss = f64::INFINITY;
        let mut no_improvement = 0usize;
        let mut n_iter = 0usize;

        for epoch in 0..config.max_iter {
            indices.shuffle(&mut rng);
            let mut sumloss = 0.0;

            for &i in &indices {
                let xi = z.row(i);
                let pred = xi.iter().zip(w.iter()).map(|(a, c)| a * c).sum::<f64>() + b;
                let err = pred - t_y[i];
                sumloss += 0.5 * err * err;

                let eta = config.eta0 / t.powf(config.power_t);
                let update = -eta * err.clamp(-DLOSS_CLIP, DLOSS_CLIP);

                w *= (1.0 - eta * config.alpha).max(0.0);
                for (wj, xj) in w.iter_mut().zip(xi.iter()) {
                    *wj += update * xj;
                }
                b += update;
                t += 1.0;
            }

            n_iter = epoch + 1;
            if !sumloss.is_finite() || !b.is_finite() || w.iter().any(|v| !v.is_finite()) {
                return Err(MLError::TrainingError(format!(
                    "floating-point overflow at epoch {}",
                    n_iter
                )));
            }

            if sumloss > best_loss - config.tol * n as f64 {
                no_improvement += 1;
            } else {
                no_improvement = 0;
            }
            if sumloss < best_loss {
                best_loss = sumloss;
            }
            if no_improvement >= config.n_iter_no_change {
                debug!("SGD converged after {} epochs (loss {:.6})", n_iter, sumloss / n as f64);
                break;
            }
        }

        if n_iter == config.max_iter {
            warn!("SGD reached the iteration cap ({}) without converging", config.max_iter);
        }

        let coefficients = DVector::from_fn(p, |j, _| y_scale * w[j] / x_scaler.scales[j]);
        let shift: f64 = (0..p).map(|j| w[j] * x_scaler.means[j] / x_scaler.scales[j]).sum();
        let intercept = y_mean + y_scale * (b - shift);

        Ok(Self {
            coefficients,
            intercept,
            n_iter,
        })
    }

    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    pub fn predict(&self, x: &DMatrix<f64>) -> Result<DVector<f64>, MLError> {
        if x.ncols() != self.n_features() {
            return Err(MLError::InferenceError(format!(
                "expected {} features, got {}",
                self.n_features(),
                x.ncols()
            )));
        }
        Ok(x * &self.coefficients + DVector::from_element(x.nrows(), self.intercept))
    }
}
