use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const MODEL_PATH_ENV: &str = "MODEL_PATH";
pub const PORT_ENV: &str = "PORT";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub training: TrainingConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DataConfig {
    pub raw_path: PathBuf,
    pub cleaned_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub model_path: PathBuf,
    pub metadata_path: PathBuf,
    /// Fraction of rows held out for evaluation.
    pub test_size: f64,
    pub seed: u64,
    pub max_iter: usize,
    pub tol: f64,
    pub eta0: f64,
    pub power_t: f64,
    /// L2 penalty strength.
    pub alpha: f64,
    pub n_iter_no_change: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            raw_path: PathBuf::from("data/raw.csv"),
            cleaned_path: PathBuf::from("data/cleaned.csv"),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/model.joblib"),
            metadata_path: PathBuf::from("models/metadata.json"),
            test_size: 0.2,
            seed: 42,
            max_iter: 2000,
            tol: 1e-3,
            eta0: 0.01,
            power_t: 0.25,
            alpha: 0.0001,
            n_iter_no_change: 5,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            model_path: PathBuf::from("models/model.joblib"),
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Reads `path` when it exists, otherwise starts from defaults, then applies
    /// `MODEL_PATH` and `PORT` from the environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            Self::from_file(path)?
        } else {
            debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model_path) = lookup(MODEL_PATH_ENV) {
            self.server.model_path = PathBuf::from(model_path);
        }
        if let Some(port) = lookup(PORT_ENV) {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("invalid {} value {:?}", PORT_ENV, port))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fixed_paths() {
        let config = Config::default();
        assert_eq!(config.data.raw_path, PathBuf::from("data/raw.csv"));
        assert_eq!(config.data.cleaned_path, PathBuf::from("data/cleaned.csv"));
        assert_eq!(config.training.model_path, PathBuf::from("models/model.joblib"));
        assert_eq!(config.training.metadata_path, PathBuf::from("models/metadata.json"));
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.training.seed, 42);
    }

    #[test]
    fn env_overrides_model_path_and_port() {
        let mut config = Config::default();
        config
            .apply_env_overrides(|key| match key {
                MODEL_PATH_ENV => Some("/srv/model.joblib".to_string()),
                PORT_ENV => Some("8081".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.server.model_path, PathBuf::from("/srv/model.joblib"));
        assert_eq!(config.server.port, 8081);
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut config = Config::default();
        let result = config.apply_env_overrides(|key| {
            (key == PORT_ENV).then(|| "not-a-port".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9000

            [training]
            max_iter = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.training.max_iter, 50);
        assert_eq!(config.training.tol, 1e-3);
    }
}
