use std::path::Path;

use csv::StringRecord;
use tracing::debug;

use super::record::HousingRecord;
use crate::error::DataError;

/// Header-keyed view of one CSV row.
struct RowView<'a> {
    row: usize,
    headers: &'a StringRecord,
    record: &'a StringRecord,
}

impl RowView<'_> {
    fn field(&self, name: &str) -> Result<&str, DataError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .and_then(|idx| self.record.get(idx))
            .ok_or_else(|| DataError::MissingField {
                row: self.row,
                field: name.to_string(),
            })
    }

    fn float(&self, name: &str) -> Result<f64, DataError> {
        let raw = self.field(name)?;
        raw.trim().parse::<f64>().map_err(|_| DataError::InvalidValue {
            row: self.row,
            field: name.to_string(),
            value: raw.to_string(),
        })
    }
}

/// Strict reader used for training: every row must carry all five fields and
/// every numeric field must parse. The first bad row aborts the whole load.
pub fn load_training_records(path: &Path) -> Result<Vec<HousingRecord>, DataError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result?;
        let view = RowView {
            row: idx + 1,
            headers: &headers,
            record: &record,
        };
        records.push(HousingRecord {
            price: view.float("price")?,
            bedrooms: view.float("bedrooms")?,
            bathrooms: view.float("bathrooms")?,
            square_feet: view.float("square_feet")?,
            zipcode: view.field("zipcode")?.trim().to_string(),
        });
    }

    debug!("Loaded {} training rows from {}", records.len(), path.display());
    Ok(records)
}
