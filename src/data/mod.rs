pub mod cleaner;
pub mod loader;
pub mod record;

pub use cleaner::clean;
pub use loader::load_training_records;
pub use record::{
    HousingFeatures, HousingRecord, CATEGORICAL_FEATURES, NUMERIC_FEATURES, REQUIRED_COLUMNS, TARGET,
};
