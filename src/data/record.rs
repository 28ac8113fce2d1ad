use serde::{Deserialize, Serialize};

pub const TARGET: &str = "price";
pub const NUMERIC_FEATURES: [&str; 3] = ["bedrooms", "bathrooms", "square_feet"];
pub const CATEGORICAL_FEATURES: [&str; 1] = ["zipcode"];

/// Canonical column order of a cleaned dataset.
pub const REQUIRED_COLUMNS: [&str; 5] = ["price", "bedrooms", "bathrooms", "square_feet", "zipcode"];

/// One house as seen by the model: everything except the price.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HousingFeatures {
    pub bedrooms: f64,
    pub bathrooms: f64,
    pub square_feet: f64,
    pub zipcode: String,
}

impl HousingFeatures {
    pub fn numeric(&self) -> [f64; 3] {
        [self.bedrooms, self.bathrooms, self.square_feet]
    }
}

/// One row of a training or cleaned dataset. Field order matches `REQUIRED_COLUMNS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HousingRecord {
    pub price: f64,
    pub bedrooms: f64,
    pub bathrooms: f64,
    pub square_feet: f64,
    pub zipcode: String,
}

impl HousingRecord {
    pub fn features(&self) -> HousingFeatures {
        HousingFeatures {
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            square_feet: self.square_feet,
            zipcode: self.zipcode.clone(),
        }
    }
}
