use std::path::Path;

use crate::error::AppError;
use crate::types::AddressRecord;

/// Reads the first column of a headed CSV file, skipping blank cells.
///
/// Rows may have any number of fields. A header whose first column is not
/// `address` is accepted with a warning.
#[tracing::instrument]
pub fn load_addresses(path: &Path) -> Result<Vec<AddressRecord>, AppError> {
    if !path.exists() {
        return Err(AppError::ResourceNotFound(path.to_path_buf()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::None)
        .from_path(path)?;

    let header = reader.headers()?.get(0).unwrap_or_default().trim().to_string();
    if !header.is_empty() && !header.eq_ignore_ascii_case("address") {
        tracing::warn!(column = %header, "First column is not named 'address', using it anyway");
    }

    let mut addresses = Vec::new();
    let mut skipped = 0usize;
    for row in reader.records() {
        let row = row?;
        match row.get(0) {
            Some(text) if !text.trim().is_empty() => {
                addresses.push(AddressRecord::new(addresses.len(), text));
            }
            _ => skipped += 1,
        }
    }

    tracing::info!(loaded = addresses.len(), skipped, "Addresses loaded");
    Ok(addresses)
}
