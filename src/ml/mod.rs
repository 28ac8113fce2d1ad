pub mod engine;
pub mod models;
pub mod pipeline;
pub mod predictor;
pub mod trainer;

pub use engine::PredictionEngine;
pub use models::{OneHotEncoder, SgdConfig, SgdRegressor};
pub use pipeline::{HousingPipeline, PriceModel};
pub use predictor::{fallback_price, Estimate, FallbackReason, PredictionMode};
pub use trainer::{train, Metadata, TrainingReport};
