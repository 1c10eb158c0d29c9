//! Batch sizing for model calls

use bestiary_domain::Record;

/// Smallest batch size used for retry rounds
pub const RETRY_BATCH_FLOOR: usize = 10;

/// Split records into consecutive batches of `size` (the last may be shorter)
///
/// A size of zero is treated as one.
pub fn chunk_records(records: &[Record], size: usize) -> Vec<&[Record]> {
    records.chunks(size.max(1)).collect()
}

/// Batch size for retry rounds: half the initial size, but never below 10
///
/// Smaller batches reduce the chance of another partial or garbled reply.
/// Note that an initial size below the floor grows to the floor on retry.
pub fn retry_batch_size(batch_size: usize) -> usize {
    RETRY_BATCH_FLOOR.max(batch_size / 2)
}
