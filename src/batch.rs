use crate::error::AppError;
use crate::types::{AddressRecord, Batch};

/// Splits `addresses` into contiguous batches of at most `size` records.
///
/// Order is preserved and only the final batch may be shorter than `size`.
pub fn partition(addresses: Vec<AddressRecord>, size: usize) -> Result<Vec<Batch>, AppError> {
    if size == 0 {
        return Err(AppError::InvalidConfiguration(
            "batch size must be a positive integer".to_string(),
        ));
    }

    let mut batches = Vec::with_capacity(addresses.len().div_ceil(size));
    let mut records = addresses.into_iter().peekable();
    while records.peek().is_some() {
        let chunk: Vec<_> = records.by_ref().take(size).collect();
        batches.push(Batch {
            index: batches.len(),
            records: chunk,
        });
    }
    Ok(batches)
}
