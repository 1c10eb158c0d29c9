//! CSV input.

use crate::error::Result;
use bestiary_domain::Record;
use bestiary_extractor::RecordExtractor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read all rows of a headerless CSV file; rows may differ in length.
pub fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(String::from).collect());
    }

    debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Read and merge records from several CSV files, in order.
///
/// Each file starts without a category.
pub fn load_records(paths: &[PathBuf], delimiter: char) -> Result<Vec<Record>> {
    let extractor = RecordExtractor::new().with_delimiter(delimiter);

    let mut records = Vec::new();
    for path in paths {
        let rows = read_rows(path)?;
        records.extend(extractor.extract(&rows));
    }
    Ok(records)
}
