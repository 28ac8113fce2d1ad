use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing required columns: {missing:?}. Present columns: {present:?}")]
    MissingColumns {
        missing: Vec<String>,
        present: Vec<String>,
    },

    #[error("Row {row}: missing field '{field}'")]
    MissingField {
        row: usize,
        field: String,
    },

    #[error("Row {row}: invalid value {value:?} for '{field}'")]
    InvalidValue {
        row: usize,
        field: String,
        value: String,
    },

    #[error("Dataset is empty: {0}")]
    EmptyDataset(String),
}

#[derive(Error, Debug)]
pub enum MLError {
    #[error("Model not found at: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("Model loading failed: {0}")]
    ModelLoadError(String),

    #[error("Inference failed: {0}")]
    InferenceError(String),

    #[error("Training failed: {0}")]
    TrainingError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("field '{0}' cannot be read as a number")]
    NotNumeric(&'static str),

    #[error("inputs are too large to price")]
    OutOfRange,
}
