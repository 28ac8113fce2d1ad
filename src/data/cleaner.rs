use std::fs;
use std::path::Path;

use csv::StringRecord;
use statrs::statistics::{Data, Median};
use tracing::{debug, info};

use super::record::{HousingRecord, REQUIRED_COLUMNS};
use crate::error::DataError;

/// Alternate spellings mapped onto canonical names, applied in order.
const COLUMN_ALIASES: [(&str, &str); 6] = [
    ("saleprice", "price"),
    ("beds", "bedrooms"),
    ("baths", "bathrooms"),
    ("sqft", "square_feet"),
    ("sq_ft", "square_feet"),
    ("zip", "zipcode"),
];

/// Cell contents read as "no value".
const MISSING_MARKERS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const SQUARE_FEET_BOUNDS: (f64, f64) = (200.0, 10_000.0);
const PRICE_BOUNDS: (f64, f64) = (10_000.0, 3_000_000.0);

/// Positions of the five required columns in the raw header, in `REQUIRED_COLUMNS` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    indices: [usize; 5],
}

impl ColumnMap {
    pub fn price(&self) -> usize {
        self.indices[0]
    }

    /// Bedrooms, bathrooms, square feet.
    pub fn numeric(&self) -> [usize; 3] {
        [self.indices[1], self.indices[2], self.indices[3]]
    }

    pub fn zipcode(&self) -> usize {
        self.indices[4]
    }
}

pub fn normalize_headers(headers: &StringRecord) -> Vec<String> {
    headers.iter().map(|h| h.trim().to_lowercase()).collect()
}

/// Applies the alias table to normalized header names and locates every
/// required column.
pub fn resolve_columns(headers: &[String]) -> Result<ColumnMap, DataError> {
    let mut names = headers.to_vec();

    for (alias, canonical) in COLUMN_ALIASES {
        if names.iter().any(|n| n == canonical) {
            continue;
        }
        for name in names.iter_mut().filter(|n| n.as_str() == alias) {
            debug!("Renaming column '{}' to '{}'", alias, canonical);
            *name = canonical.to_string();
        }
    }

    let mut indices = [0usize; 5];
    let mut missing = Vec::new();
    for (slot, column) in indices.iter_mut().zip(REQUIRED_COLUMNS) {
        match names.iter().position(|n| n == column) {
            Some(idx) => *slot = idx,
            None => missing.push(column.to_string()),
        }
    }

    if !missing.is_empty() {
        return Err(DataError::MissingColumns {
            missing,
            present: names,
        });
    }

    Ok(ColumnMap { indices })
}

fn is_missing(cell: &str) -> bool {
    MISSING_MARKERS.contains(&cell.trim())
}

/// Numeric coercion where anything unparsable becomes missing.
fn coerce_numeric(cell: Option<&str>) -> Option<f64> {
    let cell = cell?;
    if is_missing(cell) {
        return None;
    }
    cell.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}

fn median(values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    Data::new(values).median()
}

struct PartialRow {
    price: f64,
    numeric: [Option<f64>; 3],
    zipcode: String,
}

/// Cleans raw rows against a resolved header.
///
/// Rows without a price are dropped, missing or non-numeric feature values are
/// replaced by the column median, zipcodes are trimmed and rows outside the
/// square footage and price bounds are discarded. A price that is present but
/// not numeric is an error.
pub fn clean_rows<I>(headers: &[String], rows: I) -> Result<Vec<HousingRecord>, DataError>
where
    I: IntoIterator<Item = StringRecord>,
{
    let columns = resolve_columns(headers)?;
    let numeric_cols = columns.numeric();

    let mut kept = Vec::new();
    for (idx, row) in rows.into_iter().enumerate() {
        let price_cell = row.get(columns.price()).unwrap_or("");
        if is_missing(price_cell) {
            continue;
        }
        let price = price_cell
            .trim()
            .parse::<f64>()
            .map_err(|_| DataError::InvalidValue {
                row: idx + 1,
                field: "price".to_string(),
                value: price_cell.to_string(),
            })?;

        kept.push(PartialRow {
            price,
            numeric: numeric_cols.map(|col| coerce_numeric(row.get(col))),
            zipcode: row.get(columns.zipcode()).unwrap_or("").trim().to_string(),
        });
    }

    let medians: Vec<f64> = (0..numeric_cols.len())
        .map(|col| median(kept.iter().filter_map(|r| r.numeric[col]).collect()))
        .collect();
    debug!("Feature medians (bedrooms, bathrooms, square_feet): {:?}", medians);

    let total = kept.len();
    let records: Vec<HousingRecord> = kept
        .into_iter()
        .map(|row| {
            let [bedrooms, bathrooms, square_feet] =
                [0, 1, 2].map(|c| row.numeric[c].unwrap_or(medians[c]));
            HousingRecord {
                price: row.price,
                bedrooms,
                bathrooms,
                square_feet,
                zipcode: row.zipcode,
            }
        })
        .filter(within_bounds)
        .collect();

    debug!("Outlier filter removed {} of {} rows", total - records.len(), total);
    Ok(records)
}

fn within_bounds(record: &HousingRecord) -> bool {
    let (sqft_lo, sqft_hi) = SQUARE_FEET_BOUNDS;
    let (price_lo, price_hi) = PRICE_BOUNDS;
    record.square_feet > sqft_lo
        && record.square_feet < sqft_hi
        && record.price > price_lo
        && record.price < price_hi
}

pub fn write_records(path: &Path, records: &[HousingRecord]) -> Result<(), DataError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    // An empty result still gets a header row.
    if records.is_empty() {
        writer.write_record(REQUIRED_COLUMNS)?;
    }
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads `raw_path`, cleans it and overwrites `cleaned_path` with the result.
/// Nothing is written when cleaning fails.
pub fn clean(raw_path: &Path, cleaned_path: &Path) -> Result<Vec<HousingRecord>, DataError> {
    info!("Cleaning dataset {}", raw_path.display());

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(raw_path)?;
    let headers = normalize_headers(reader.headers()?);
    let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
    let raw_count = rows.len();

    let records = clean_rows(&headers, rows)?;
    write_records(cleaned_path, &records)?;

    info!(
        "Saved cleaned dataset to {} ({} of {} rows kept)",
        cleaned_path.display(),
        records.len(),
        raw_count
    );
    Ok(records)
}
