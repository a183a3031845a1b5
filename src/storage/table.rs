//! Consolidated CSV encoding.
//!
//! Header is exactly [`COLUMNS`]; one row per shop, UTF-8, comma separated.

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{COLUMNS, Dataset, ShopRecord};

/// Encode a dataset as CSV bytes in its current row order.
pub fn encode(dataset: &Dataset) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(COLUMNS)?;
    for shop in dataset {
        writer.write_record(&shop.to_row())?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::Io(e.into_error()))
}

/// Decode CSV bytes produced by [`encode`] (or any file carrying the same
/// columns, in any order).
///
/// Rows without a key or with unparsable coordinates are skipped with a
/// warning; a missing column or broken CSV structure fails the whole file.
pub fn decode(bytes: &[u8], origin: &Path) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| AppError::snapshot(origin, e))?
        .clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
    };

    let mut indices = [0usize; COLUMNS.len()];
    for (slot, name) in indices.iter_mut().zip(COLUMNS) {
        *slot = position(name)
            .ok_or_else(|| AppError::snapshot(origin, format!("missing column '{name}'")))?;
    }

    let mut shops = Vec::new();
    let mut skipped = 0usize;
    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(|e| AppError::snapshot(origin, e))?;
        let cells = indices.map(|i| row.get(i).unwrap_or(""));
        match ShopRecord::from_row(cells) {
            Ok(shop) => shops.push(shop),
            Err(e) => {
                skipped += 1;
                log::warn!("{}: skipping row {}: {}", origin.display(), line + 2, e);
            }
        }
    }

    if skipped > 0 {
        log::warn!(
            "{}: {} unusable rows skipped, {} loaded",
            origin.display(),
            skipped,
            shops.len()
        );
    }

    Ok(Dataset::from_records(shops))
}

/// Read a dataset file. A missing file is `Ok(None)`.
pub async fn read_dataset(path: &Path) -> Result<Option<Dataset>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => decode(&bytes, path).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::snapshot(path, e)),
    }
}
